use crate::utils::hash::calculate_hash;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Configuration for the upload and distribution service
#[derive(Debug, Clone)]
pub struct DistributionConfig {
    /// Address the HTTP server listens on (default: 127.0.0.1:3000)
    pub bind_addr: SocketAddr,

    /// Directory holding one subdirectory per app location (default: ./public/apps)
    pub base_directory: PathBuf,

    /// Public URL prefix for download links, always ends with `/`
    pub base_url: String,

    /// Where multipart file parts are spooled before being moved into place.
    /// Should live on the same volume as `base_directory` so moves are renames.
    pub staging_directory: PathBuf,

    /// Basic auth username, compared verbatim
    pub auth_username: String,

    /// Hex encoded SHA-256 of the basic auth password
    pub auth_password_hash: String,

    /// Realm sent in the `WWW-Authenticate` challenge
    pub realm: String,

    /// Maximum request body size in bytes (default: 1 GB)
    pub max_upload_size: usize,

    /// Keep `/` in locations so builds can be grouped in nested directories
    pub nested_locations: bool,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        let base_directory = PathBuf::from("./public/apps");
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            staging_directory: base_directory.join(".incoming"),
            base_directory,
            base_url: "http://localhost:3000/".to_string(),
            auth_username: "uploader".to_string(),
            auth_password_hash: calculate_hash(b"changeme"),
            realm: "App Distribution".to_string(),
            max_upload_size: 1024 * 1024 * 1024, // 1 GB
            nested_locations: false,
        }
    }
}

impl DistributionConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        let base_directory = env::var("APPS_BASE_DIR")
            .map(PathBuf::from)
            .unwrap_or(default.base_directory);

        Self {
            bind_addr: env::var("BIND_ADDR")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.bind_addr),

            staging_directory: env::var("UPLOAD_STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| base_directory.join(".incoming")),

            base_directory,

            base_url: normalize_base_url(
                &env::var("APPS_BASE_URL").unwrap_or(default.base_url),
            ),

            auth_username: env::var("UPLOAD_AUTH_USERNAME").unwrap_or(default.auth_username),

            auth_password_hash: env::var("UPLOAD_AUTH_HASH")
                .map(|v| v.trim().to_lowercase())
                .unwrap_or(default.auth_password_hash),

            realm: env::var("UPLOAD_REALM").unwrap_or(default.realm),

            max_upload_size: env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_upload_size),

            nested_locations: env::var("NESTED_LOCATIONS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(default.nested_locations),
        }
    }

    /// Create config for local development (everything under ./public, relaxed limits)
    pub fn development() -> Self {
        Self {
            max_upload_size: 2 * 1024 * 1024 * 1024,
            ..Self::default()
        }
    }

    /// Create config for production: credentials and URLs must come from the environment
    pub fn production() -> Self {
        Self {
            max_upload_size: 512 * 1024 * 1024,
            ..Self::from_env()
        }
    }

    /// Config rooted at an arbitrary directory, used by tests and tooling
    pub fn with_base_directory(base_directory: impl Into<PathBuf>, base_url: &str) -> Self {
        let base_directory = base_directory.into();
        Self {
            staging_directory: base_directory.join(".incoming"),
            base_directory,
            base_url: normalize_base_url(base_url),
            ..Self::default()
        }
    }
}

fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    }
}
