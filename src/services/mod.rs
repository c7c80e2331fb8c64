pub mod metadata;
pub mod mover;
pub mod platform;
pub mod provisioner;
pub mod storage;
pub mod upload_service;
