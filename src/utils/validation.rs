use crate::api::error::UploadError;
use regex::Regex;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

static DISALLOWED_LOCATION_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_.]+").expect("valid location pattern"));

static DISALLOWED_NESTED_LOCATION_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_./]+").expect("valid location pattern"));

static DISALLOWED_NAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^0-9a-zA-Z.]").expect("valid name pattern"));

/// Turns a free-text location into a path segment.
///
/// A trailing run of disallowed characters is dropped, every other run
/// collapses to a single `.`. With `nested` set, `/` is kept so locations can
/// group builds in subdirectories. The result is stable under re-sanitizing.
pub fn sanitize_location(location: &str, nested: bool) -> String {
    let pattern = if nested {
        &*DISALLOWED_NESTED_LOCATION_CHARS
    } else {
        &*DISALLOWED_LOCATION_CHARS
    };

    let trimmed = match pattern.find_iter(location).last() {
        Some(m) if m.end() == location.len() => &location[..m.start()],
        _ => location,
    };

    pattern.replace_all(trimmed, ".").into_owned()
}

/// Joins a sanitized location onto the base directory, rejecting anything
/// that could escape it or name the base directory itself.
pub fn resolve_location(base_directory: &Path, location: &str) -> Result<PathBuf, UploadError> {
    if location.trim().is_empty() {
        return Err(UploadError::InvalidLocation);
    }

    let relative = Path::new(location);
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
        || location.split('/').any(|segment| segment == ".");
    if escapes {
        tracing::warn!("Path traversal attempt detected: {}", location);
        return Err(UploadError::InvalidLocation);
    }

    let path = base_directory.join(relative);
    if path.to_string_lossy().contains("..") {
        tracing::warn!("Path traversal attempt detected: {}", location);
        return Err(UploadError::InvalidLocation);
    }

    Ok(path)
}

/// Replaces every character outside `[0-9a-zA-Z.]` with `_`.
pub fn sanitize_name(name: &str) -> String {
    DISALLOWED_NAME_CHARS.replace_all(name, "_").into_owned()
}

/// Sanitized name that is safe to use as the last component of a path.
pub fn stored_name(name: &str) -> Result<String, UploadError> {
    let sanitized = sanitize_name(name);
    if sanitized.chars().all(|c| c == '.') {
        return Err(UploadError::InvalidFileName(name.to_string()));
    }
    Ok(sanitized)
}
