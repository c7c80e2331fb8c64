use crate::api::error::UploadError;
use crate::services::storage::{EntryKind, FileSystem};
use std::path::Path;
use std::sync::Arc;

pub const STORE_DIR: &str = "store";
pub const SYMBOLS_DIR: &str = "symbols";
pub const THINNED_DIR: &str = "thinned";

/// Creates location directories and clears out the previous build on a fresh upload.
#[derive(Clone)]
pub struct DirectoryProvisioner {
    fs: Arc<dyn FileSystem>,
}

impl DirectoryProvisioner {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    /// Creates `path` and any missing parents. Check-then-create is not atomic;
    /// a concurrent creator simply wins.
    pub async fn ensure(&self, path: &Path, failure_message: &str) -> Result<(), UploadError> {
        let exists = self
            .fs
            .exists_dir(path)
            .await
            .map_err(|source| UploadError::DirectoryCreationFailure {
                message: failure_message.to_string(),
                source,
            })?;
        if exists {
            return Ok(());
        }

        tracing::debug!("Creating directory {}", path.display());
        self.fs
            .create_dir_all(path)
            .await
            .map_err(|source| UploadError::DirectoryCreationFailure {
                message: failure_message.to_string(),
                source,
            })
    }

    /// Removes every regular file directly under `path` plus the whole `store`
    /// subdirectory. Other subdirectories such as `thinned` and `symbols` stay.
    pub async fn reset(&self, path: &Path) -> Result<(), UploadError> {
        let entries = self.fs.list(path).await?;
        let mut removed = 0usize;

        for entry in entries {
            let target = path.join(&entry.name);
            match entry.kind {
                EntryKind::File => self.fs.remove_file(&target).await?,
                EntryKind::Directory if entry.name == STORE_DIR => {
                    self.fs.remove_dir_all(&target).await?
                }
                EntryKind::Directory => continue,
            }
            removed += 1;
        }

        if removed > 0 {
            tracing::info!("Cleared {} previous entries from {}", removed, path.display());
        }
        Ok(())
    }
}
