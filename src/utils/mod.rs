pub mod hash;
pub mod template;
pub mod validation;
