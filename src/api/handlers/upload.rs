use crate::AppState;
use crate::api::error::{AppError, UploadError};
use crate::models::{FilePart, Role, UploadMetadata, UploadRequest, UploadResponse};
use axum::{
    Json,
    extract::{Multipart, State, multipart::Field},
};
use futures::TryStreamExt;
use std::path::Path;
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;

/// Streams one file part into a temp file in the staging directory.
///
/// The returned `TempPath` deletes the staged file when dropped unless it has
/// been moved away first.
async fn stage_field(field: Field<'_>, staging: &Path) -> Result<(FilePart, TempPath), UploadError> {
    let file_name = field.file_name().unwrap_or_default().to_string();

    let temp = tempfile::Builder::new()
        .prefix("upload-")
        .tempfile_in(staging)
        .map_err(|e| UploadError::Staging(e.to_string()))?;
    let (std_file, temp_path) = temp.into_parts();
    let mut file = tokio::fs::File::from_std(std_file);

    let body = field.map_err(std::io::Error::other);
    let mut reader = StreamReader::new(body);
    let size = tokio::io::copy(&mut reader, &mut file)
        .await
        .map_err(|e| UploadError::Staging(e.to_string()))?;
    file.flush()
        .await
        .map_err(|e| UploadError::Staging(e.to_string()))?;

    let part = FilePart {
        file_name,
        staged_path: temp_path.to_path_buf(),
        size,
    };
    Ok((part, temp_path))
}

#[utoipa::path(
    post,
    path = "/upload",
    request_body(
        content = String,
        description = "Multipart form: `metadata` JSON plus optional adhoc, store, variant, icon, symbols and releasenotes files",
        content_type = "multipart/form-data"
    ),
    responses(
        (status = 200, description = "Artifacts published, keyed by role", body = UploadResponse),
        (status = 401, description = "Missing or invalid credentials"),
        (status = 500, description = "Upload failed, body carries status 505 and a message")
    ),
    security(
        ("basic" = [])
    ),
    tag = "upload"
)]
pub async fn receive_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let staging = &state.config.staging_directory;
    state
        .fs
        .create_dir_all(staging)
        .await
        .map_err(|e| UploadError::Staging(e.to_string()))?;

    let mut metadata = None;
    let mut request = UploadRequest::default();
    // Held until the pipeline finishes so unmoved parts are cleaned up.
    let mut staged = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::Staging(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == "metadata" {
            let text = field
                .text()
                .await
                .map_err(|e| UploadError::Staging(e.to_string()))?;
            metadata = Some(
                UploadMetadata::parse(&text)
                    .map_err(|e| UploadError::InvalidMetadata(e.to_string()))?,
            );
        } else if let Some(role) = Role::from_field_name(&name) {
            let (part, guard) = stage_field(field, staging).await?;
            tracing::debug!(
                "Staged {} '{}' ({} bytes) at {}",
                role,
                part.file_name,
                part.size,
                part.staged_path.display()
            );
            request.files.insert(role, part);
            staged.push(guard);
        } else {
            tracing::debug!("Ignoring unexpected form field '{}'", name);
        }
    }

    request.metadata = metadata
        .ok_or_else(|| UploadError::InvalidMetadata("metadata field is missing".to_string()))?;

    let response = state.upload_service.receive(request).await?;
    drop(staged);

    Ok(Json(response))
}
