use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Status carried in the JSON body of a rejected upload.
pub const UPLOAD_UNAUTHORISED: u16 = 401;
/// Status carried in the JSON body of any failed upload.
pub const UPLOAD_FAILED: u16 = 505;

/// Failures raised inside the upload pipeline.
///
/// None of these are distinguished on the wire; they all become the generic
/// failure body with the message below.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Unknown app type '{0}'")]
    UnknownPlatform(String),

    #[error("No build file was provided")]
    MissingBuildFile,

    #[error("Required fields were not provided - {}", .0.join(", "))]
    MissingRequiredFields(Vec<String>),

    #[error("Invalid path provided")]
    InvalidLocation,

    #[error("Invalid file name '{0}'")]
    InvalidFileName(String),

    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("{message}")]
    DirectoryCreationFailure {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Unable to receive upload: {0}")]
    Staging(String),

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unauthorized")]
    Unauthorized { realm: String },

    #[error(transparent)]
    Upload(#[from] UploadError),
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        AppError::Upload(self).into_response()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Unauthorized { realm } => {
                let body = Json(json!({
                    "status": UPLOAD_UNAUTHORISED,
                    "message": "Unauthorized",
                }));
                let mut response = (StatusCode::UNAUTHORIZED, body).into_response();
                let challenge = HeaderValue::from_str(&format!("Basic realm=\"{}\"", realm))
                    .unwrap_or_else(|_| HeaderValue::from_static("Basic"));
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, challenge);
                response
            }
            AppError::Upload(e) => {
                match &e {
                    UploadError::DirectoryCreationFailure { source, .. } => {
                        tracing::error!("Upload failed: {}: {:?}", e, source)
                    }
                    UploadError::Storage(source) => {
                        tracing::error!("Upload failed: {:?}", source)
                    }
                    _ => tracing::warn!("Upload rejected: {}", e),
                }

                let body = Json(json!({
                    "status": UPLOAD_FAILED,
                    "message": e.to_string(),
                }));
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
        }
    }
}
