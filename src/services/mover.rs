use crate::api::error::UploadError;
use crate::models::{FilePart, Role, UploadRequest, UploadResponse};
use crate::services::provisioner::{DirectoryProvisioner, STORE_DIR, SYMBOLS_DIR, THINNED_DIR};
use crate::services::storage::FileSystem;
use crate::utils::validation::stored_name;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Where a role's file lands inside the location directory, and whether its
/// URL is reported back.
struct Placement {
    role: Role,
    subdirectory: Option<&'static str>,
    published: bool,
}

/// Placement order. Icon and release notes land at the root but are not reported.
const PLACEMENTS: &[Placement] = &[
    Placement {
        role: Role::Icon,
        subdirectory: None,
        published: false,
    },
    Placement {
        role: Role::Adhoc,
        subdirectory: None,
        published: true,
    },
    Placement {
        role: Role::Store,
        subdirectory: Some(STORE_DIR),
        published: true,
    },
    Placement {
        role: Role::Releasenotes,
        subdirectory: None,
        published: false,
    },
    Placement {
        role: Role::Symbols,
        subdirectory: Some(SYMBOLS_DIR),
        published: true,
    },
    Placement {
        role: Role::Variant,
        subdirectory: Some(THINNED_DIR),
        published: true,
    },
];

/// Public download URL for an artifact stored under a location.
pub fn public_url(base_url: &str, location: &str, subdirectory: Option<&str>, name: &str) -> String {
    match subdirectory {
        Some(dir) => format!("{}apps/{}/{}/{}", base_url, location, dir, name),
        None => format!("{}apps/{}/{}", base_url, location, name),
    }
}

/// Moves staged parts into a location directory and reports their public URLs.
///
/// Each move is a single rename, but the set of moves is not transactional:
/// if one fails, the ones before it stay in place.
#[derive(Clone)]
pub struct ArtifactMover {
    fs: Arc<dyn FileSystem>,
    provisioner: DirectoryProvisioner,
    base_url: String,
}

impl ArtifactMover {
    pub fn new(fs: Arc<dyn FileSystem>, base_url: impl Into<String>) -> Self {
        Self {
            provisioner: DirectoryProvisioner::new(fs.clone()),
            fs,
            base_url: base_url.into(),
        }
    }

    pub async fn move_files(
        &self,
        request: &UploadRequest,
        target: &Path,
        location: &str,
    ) -> Result<UploadResponse, UploadError> {
        let mut published = BTreeMap::new();

        for placement in PLACEMENTS {
            let Some(part) = request.file(placement.role) else {
                continue;
            };

            let directory = match placement.subdirectory {
                Some(dir) => {
                    let path = target.join(dir);
                    self.provisioner
                        .ensure(&path, &format!("Unable to create {} directory", dir))
                        .await?;
                    path
                }
                None => target.to_path_buf(),
            };

            let name = self.place(part, &directory).await?;
            tracing::info!(
                "Placed {} ({} bytes) as {}",
                placement.role,
                part.size,
                directory.join(&name).display()
            );

            if placement.published {
                published.insert(
                    placement.role,
                    public_url(&self.base_url, location, placement.subdirectory, &name),
                );
            }
        }

        Ok(UploadResponse(published))
    }

    async fn place(&self, part: &FilePart, directory: &Path) -> Result<String, UploadError> {
        let name = stored_name(&part.file_name)?;
        self.fs.rename(&part.staged_path, &directory.join(&name)).await?;
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UploadMetadata;
    use crate::services::storage::MemoryFileSystem;

    const BASE_URL: &str = "https://dist.example.com/";

    fn staged(fs: &MemoryFileSystem, role: Role, name: &str) -> FilePart {
        let staged_path = format!("/staging/{}", role);
        fs.insert_file(staged_path.clone(), name.as_bytes().to_vec());
        FilePart {
            file_name: name.to_string(),
            staged_path: staged_path.into(),
            size: name.len() as u64,
        }
    }

    #[test]
    fn test_public_url() {
        assert_eq!(
            public_url(BASE_URL, "myapp.v1", None, "a.ipa"),
            "https://dist.example.com/apps/myapp.v1/a.ipa"
        );
        assert_eq!(
            public_url(BASE_URL, "myapp.v1", Some("store"), "a.ipa"),
            "https://dist.example.com/apps/myapp.v1/store/a.ipa"
        );
    }

    #[tokio::test]
    async fn test_every_role_lands_in_place() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.create_dir_all(Path::new("/apps/demo")).await.unwrap();

        let request = UploadRequest::new(UploadMetadata::default())
            .with_file(Role::Icon, staged(&fs, Role::Icon, "App Icon.png"))
            .with_file(Role::Adhoc, staged(&fs, Role::Adhoc, "Demo build!!.ipa"))
            .with_file(Role::Store, staged(&fs, Role::Store, "Demo-store.ipa"))
            .with_file(Role::Releasenotes, staged(&fs, Role::Releasenotes, "notes.html"))
            .with_file(Role::Symbols, staged(&fs, Role::Symbols, "Demo.dSYM.zip"))
            .with_file(Role::Variant, staged(&fs, Role::Variant, "Demo-iPad.ipa"));

        let mover = ArtifactMover::new(fs.clone(), BASE_URL);
        let response = mover
            .move_files(&request, Path::new("/apps/demo"), "demo")
            .await
            .unwrap();

        assert!(fs.is_file("/apps/demo/App_Icon.png"));
        assert!(fs.is_file("/apps/demo/Demo_build__.ipa"));
        assert!(fs.is_file("/apps/demo/store/Demo_store.ipa"));
        assert!(fs.is_file("/apps/demo/notes.html"));
        assert!(fs.is_file("/apps/demo/symbols/Demo.dSYM.zip"));
        assert!(fs.is_file("/apps/demo/thinned/Demo_iPad.ipa"));

        assert_eq!(response.0.len(), 4);
        assert_eq!(
            response.get(Role::Adhoc),
            Some("https://dist.example.com/apps/demo/Demo_build__.ipa")
        );
        assert_eq!(
            response.get(Role::Store),
            Some("https://dist.example.com/apps/demo/store/Demo_store.ipa")
        );
        assert_eq!(
            response.get(Role::Symbols),
            Some("https://dist.example.com/apps/demo/symbols/Demo.dSYM.zip")
        );
        assert_eq!(
            response.get(Role::Variant),
            Some("https://dist.example.com/apps/demo/thinned/Demo_iPad.ipa")
        );
        assert_eq!(response.get(Role::Icon), None);
        assert_eq!(response.get(Role::Releasenotes), None);
    }

    #[tokio::test]
    async fn test_failure_leaves_earlier_moves_in_place() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.create_dir_all(Path::new("/apps/demo")).await.unwrap();

        let request = UploadRequest::new(UploadMetadata::default())
            .with_file(Role::Adhoc, staged(&fs, Role::Adhoc, "a.apk"))
            .with_file(
                Role::Store,
                FilePart {
                    file_name: "s.apk".into(),
                    staged_path: "/staging/missing".into(),
                    size: 0,
                },
            );

        let mover = ArtifactMover::new(fs.clone(), BASE_URL);
        let err = mover
            .move_files(&request, Path::new("/apps/demo"), "demo")
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::Storage(_)));
        assert!(fs.is_file("/apps/demo/a.apk"));
    }

    #[tokio::test]
    async fn test_dot_only_name_rejected() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.create_dir_all(Path::new("/apps/demo")).await.unwrap();

        let request = UploadRequest::new(UploadMetadata::default())
            .with_file(Role::Releasenotes, staged(&fs, Role::Releasenotes, ".."));

        let err = ArtifactMover::new(fs.clone(), BASE_URL)
            .move_files(&request, Path::new("/apps/demo"), "demo")
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::InvalidFileName(_)));
    }
}
