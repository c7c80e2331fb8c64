use crate::api::error::UploadError;
use crate::models::{Platform, Role, UploadRequest};
use std::path::Path;

const IOS_REQUIRED_FIELDS: &[&str] = &["bundleid", "icon", "version", "title", "location"];
const ANDROID_REQUIRED_FIELDS: &[&str] = &["icon", "version", "title", "location"];

pub const FILE_IOS_IPA: &str = "ipa";
pub const FILE_ANDROID_APK: &str = "apk";

/// Fields that must be present, as a file part or metadata key, for a full upload.
pub fn required_fields(platform: Platform) -> &'static [&'static str] {
    match platform {
        Platform::Ios => IOS_REQUIRED_FIELDS,
        Platform::Android => ANDROID_REQUIRED_FIELDS,
    }
}

/// Works out the target platform from the build file and checks the request
/// carries everything that platform's metadata needs.
///
/// The representative build is `adhoc`, then `store`, then `variant`. A
/// `variant` part means a thinned upload against an existing location, so
/// field validation is skipped for it.
pub fn detect_platform(request: &UploadRequest) -> Result<Platform, UploadError> {
    let build = [Role::Adhoc, Role::Store, Role::Variant]
        .into_iter()
        .find_map(|role| request.file(role))
        .ok_or(UploadError::MissingBuildFile)?;

    let extension = Path::new(&build.file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();

    let platform = match extension {
        FILE_IOS_IPA => Platform::Ios,
        FILE_ANDROID_APK => Platform::Android,
        other => return Err(UploadError::UnknownPlatform(format!(".{}", other))),
    };

    if request.has(Role::Variant) {
        return Ok(platform);
    }

    let missing: Vec<String> = required_fields(platform)
        .iter()
        .filter(|field| {
            let as_part = Role::from_field_name(field).is_some_and(|role| request.has(role));
            !as_part && !request.metadata.contains(field)
        })
        .map(|field| field.to_string())
        .collect();

    if !missing.is_empty() {
        return Err(UploadError::MissingRequiredFields(missing));
    }

    Ok(platform)
}
