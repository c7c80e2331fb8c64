use crate::api::error::UploadError;
use crate::config::DistributionConfig;
use crate::models::{Role, UploadRequest, UploadResponse};
use crate::services::metadata::MetadataRenderer;
use crate::services::mover::ArtifactMover;
use crate::services::platform::detect_platform;
use crate::services::provisioner::{DirectoryProvisioner, SYMBOLS_DIR, THINNED_DIR};
use crate::services::storage::FileSystem;
use crate::utils::validation::{resolve_location, sanitize_location, stored_name};
use std::path::PathBuf;
use std::sync::Arc;

/// Which path through the pipeline a request takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    /// Debug symbols for an already published build, sent separately to stay
    /// under request size limits.
    SymbolsOnly,
    /// A thinned package appended to an existing location.
    Variant,
    /// A complete build that replaces whatever the location held.
    Full,
}

impl UploadKind {
    pub fn classify(request: &UploadRequest) -> Self {
        if request.metadata.location().is_some()
            && request.has(Role::Symbols)
            && !request.has_build()
        {
            UploadKind::SymbolsOnly
        } else if request.has(Role::Variant) {
            UploadKind::Variant
        } else {
            UploadKind::Full
        }
    }
}

/// Runs one upload request from metadata to placed files.
///
/// This is the only place pipeline failures are handled: errors bubble up
/// unchanged and nothing already reset or moved is rolled back.
pub struct UploadService {
    config: DistributionConfig,
    provisioner: DirectoryProvisioner,
    renderer: MetadataRenderer,
    mover: ArtifactMover,
}

impl UploadService {
    pub fn new(config: DistributionConfig, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            provisioner: DirectoryProvisioner::new(fs.clone()),
            renderer: MetadataRenderer::new(fs.clone()),
            mover: ArtifactMover::new(fs, config.base_url.clone()),
            config,
        }
    }

    pub fn config(&self) -> &DistributionConfig {
        &self.config
    }

    /// Sanitized location and the directory it resolves to.
    fn target(&self, request: &UploadRequest) -> Result<(String, PathBuf), UploadError> {
        let raw = request
            .metadata
            .location()
            .ok_or(UploadError::InvalidLocation)?;
        let location = sanitize_location(raw, self.config.nested_locations);
        let path = resolve_location(&self.config.base_directory, &location)?;

        let staging = &self.config.staging_directory;
        if path.starts_with(staging) || staging.starts_with(&path) {
            tracing::warn!("Location '{}' overlaps the staging directory", location);
            return Err(UploadError::InvalidLocation);
        }
        Ok((location, path))
    }

    pub async fn receive(&self, request: UploadRequest) -> Result<UploadResponse, UploadError> {
        let kind = UploadKind::classify(&request);
        tracing::info!(
            "Receiving {:?} upload with parts [{}]",
            kind,
            request
                .files
                .keys()
                .map(Role::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        );

        match kind {
            UploadKind::SymbolsOnly => self.receive_symbols(&request).await,
            UploadKind::Variant => self.receive_variant(&request).await,
            UploadKind::Full => self.receive_full(&request).await,
        }
    }

    async fn receive_symbols(&self, request: &UploadRequest) -> Result<UploadResponse, UploadError> {
        let (location, target) = self.target(request)?;
        self.provisioner
            .ensure(&target.join(SYMBOLS_DIR), "Unable to create symbols directory")
            .await?;
        self.mover.move_files(request, &target, &location).await
    }

    async fn receive_variant(&self, request: &UploadRequest) -> Result<UploadResponse, UploadError> {
        let platform = detect_platform(request)?;
        let (location, target) = self.target(request)?;
        tracing::debug!("Thinned {} package for {}", platform, location);

        self.provisioner
            .ensure(&target.join(THINNED_DIR), "Unable to create thinned directory")
            .await?;
        self.mover.move_files(request, &target, &location).await
    }

    async fn receive_full(&self, request: &UploadRequest) -> Result<UploadResponse, UploadError> {
        let platform = detect_platform(request)?;
        let (location, target) = self.target(request)?;
        tracing::info!("Publishing {} build to {}", platform, location);

        self.provisioner
            .ensure(&target, "Unable to create target directory")
            .await?;
        self.provisioner.reset(&target).await?;

        let icon_name = request
            .file(Role::Icon)
            .map(|icon| stored_name(&icon.file_name))
            .transpose()?;
        self.renderer
            .write(&target, platform, &request.metadata, icon_name.as_deref())
            .await?;

        self.mover.move_files(request, &target, &location).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FilePart, UploadMetadata};
    use crate::services::storage::MemoryFileSystem;
    use std::path::Path;

    fn service(fs: &Arc<MemoryFileSystem>) -> UploadService {
        let config = DistributionConfig::with_base_directory("/srv/apps", "https://dist.example.com/");
        UploadService::new(config, fs.clone())
    }

    fn staged(fs: &MemoryFileSystem, role: Role, name: &str) -> FilePart {
        let staged_path = format!("/srv/apps/.incoming/{}", role);
        fs.insert_file(staged_path.clone(), b"payload".to_vec());
        FilePart {
            file_name: name.to_string(),
            staged_path: staged_path.into(),
            size: 7,
        }
    }

    fn metadata(raw: &str) -> UploadMetadata {
        UploadMetadata::parse(raw).unwrap()
    }

    #[test]
    fn test_classify() {
        let part = FilePart {
            file_name: "x".into(),
            staged_path: "/x".into(),
            size: 0,
        };
        let located = metadata(r#"{"location":"demo"}"#);

        let symbols = UploadRequest::new(located.clone()).with_file(Role::Symbols, part.clone());
        assert_eq!(UploadKind::classify(&symbols), UploadKind::SymbolsOnly);

        let unlocated = UploadRequest::new(UploadMetadata::default()).with_file(Role::Symbols, part.clone());
        assert_eq!(UploadKind::classify(&unlocated), UploadKind::Full);

        let symbols_with_build = symbols.clone().with_file(Role::Adhoc, part.clone());
        assert_eq!(UploadKind::classify(&symbols_with_build), UploadKind::Full);

        let variant = UploadRequest::new(located.clone()).with_file(Role::Variant, part.clone());
        assert_eq!(UploadKind::classify(&variant), UploadKind::Variant);

        let full = UploadRequest::new(located).with_file(Role::Store, part);
        assert_eq!(UploadKind::classify(&full), UploadKind::Full);
    }

    #[tokio::test]
    async fn test_full_upload_end_to_end() {
        let fs = Arc::new(MemoryFileSystem::new());
        let request = UploadRequest::new(metadata(
            r#"{"location":"myapp/v1","title":"Demo","version":"1.0","bundleid":"com.x.demo"}"#,
        ))
        .with_file(Role::Adhoc, staged(&fs, Role::Adhoc, "Demo build!!.ipa"))
        .with_file(Role::Icon, staged(&fs, Role::Icon, "Icon.png"));

        let response = service(&fs).receive(request).await.unwrap();

        assert_eq!(
            response.get(Role::Adhoc),
            Some("https://dist.example.com/apps/myapp.v1/Demo_build__.ipa")
        );
        assert!(fs.is_file("/srv/apps/myapp.v1/Demo_build__.ipa"));
        assert!(fs.is_file("/srv/apps/myapp.v1/Icon.png"));
        assert!(fs.is_file("/srv/apps/myapp.v1/private"));
        let plist = String::from_utf8(fs.read("/srv/apps/myapp.v1/app.plist").unwrap()).unwrap();
        assert!(plist.contains("<string>com.x.demo</string>"));
        assert!(plist.contains("<string>Icon.png</string>"));
    }

    #[tokio::test]
    async fn test_full_upload_replaces_previous_build() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.insert_file("/srv/apps/demo/Old.apk", b"old".to_vec());
        fs.insert_file("/srv/apps/demo/store/Old.apk", b"old".to_vec());
        fs.insert_file("/srv/apps/demo/symbols/mapping.txt", b"old".to_vec());

        let request = UploadRequest::new(metadata(r#"{"location":"demo","title":"Demo","version":"2"}"#))
            .with_file(Role::Store, staged(&fs, Role::Store, "New.apk"))
            .with_file(Role::Icon, staged(&fs, Role::Icon, "icon.png"));

        let response = service(&fs).receive(request).await.unwrap();

        assert!(!fs.is_file("/srv/apps/demo/Old.apk"));
        assert!(!fs.is_file("/srv/apps/demo/store/Old.apk"));
        assert!(fs.is_file("/srv/apps/demo/store/New.apk"));
        assert!(fs.is_file("/srv/apps/demo/symbols/mapping.txt"));
        assert!(fs.is_file("/srv/apps/demo/android.json"));
        assert_eq!(
            response.get(Role::Store),
            Some("https://dist.example.com/apps/demo/store/New.apk")
        );
    }

    #[tokio::test]
    async fn test_symbols_only_skips_reset_and_metadata() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.insert_file("/srv/apps/demo/Demo.ipa", b"build".to_vec());
        fs.insert_file("/srv/apps/demo/app.plist", b"<plist/>".to_vec());

        let request = UploadRequest::new(metadata(r#"{"location":"demo"}"#))
            .with_file(Role::Symbols, staged(&fs, Role::Symbols, "Demo.app.dSYM.zip"));

        let response = service(&fs).receive(request).await.unwrap();

        assert_eq!(response.0.len(), 1);
        assert_eq!(
            response.get(Role::Symbols),
            Some("https://dist.example.com/apps/demo/symbols/Demo.app.dSYM.zip")
        );
        assert!(fs.is_file("/srv/apps/demo/Demo.ipa"));
        assert_eq!(fs.read("/srv/apps/demo/app.plist").unwrap(), b"<plist/>");
        assert!(!fs.is_file("/srv/apps/demo/private"));
    }

    #[tokio::test]
    async fn test_variant_upload_appends() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.insert_file("/srv/apps/demo/Demo.ipa", b"build".to_vec());
        fs.insert_file("/srv/apps/demo/app.plist", b"<plist/>".to_vec());

        let request = UploadRequest::new(metadata(r#"{"location":"demo"}"#))
            .with_file(Role::Variant, staged(&fs, Role::Variant, "Demo-iPhone.ipa"));

        let response = service(&fs).receive(request).await.unwrap();

        assert_eq!(
            response.get(Role::Variant),
            Some("https://dist.example.com/apps/demo/thinned/Demo_iPhone.ipa")
        );
        assert!(fs.is_file("/srv/apps/demo/Demo.ipa"));
        assert_eq!(fs.read("/srv/apps/demo/app.plist").unwrap(), b"<plist/>");
    }

    #[tokio::test]
    async fn test_missing_fields_fail_before_io() {
        let fs = Arc::new(MemoryFileSystem::new());
        let request = UploadRequest::new(metadata(r#"{"location":"demo","title":"Demo","version":"1"}"#))
            .with_file(Role::Adhoc, staged(&fs, Role::Adhoc, "Demo.ipa"))
            .with_file(Role::Icon, staged(&fs, Role::Icon, "icon.png"));

        let err = service(&fs).receive(request).await.unwrap_err();
        assert!(matches!(err, UploadError::MissingRequiredFields(ref f) if f == &["bundleid"]));
        assert!(!fs.is_dir("/srv/apps/demo"));
    }

    #[tokio::test]
    async fn test_traversal_location_rejected() {
        let fs = Arc::new(MemoryFileSystem::new());
        let request = UploadRequest::new(metadata(r#"{"location":"../../etc","title":"x","version":"1"}"#))
            .with_file(Role::Adhoc, staged(&fs, Role::Adhoc, "x.apk"))
            .with_file(Role::Icon, staged(&fs, Role::Icon, "i.png"));

        let err = service(&fs).receive(request).await.unwrap_err();
        assert!(matches!(err, UploadError::InvalidLocation));
        assert!(!fs.is_dir(Path::new("/srv/etc")));
    }

    #[tokio::test]
    async fn test_staging_location_rejected() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.insert_file("/srv/apps/.incoming/upload-other", b"in flight".to_vec());

        for location in [".incoming", ".incoming!!"] {
            let raw = format!(r#"{{"location":"{}","title":"x","version":"1"}}"#, location);
            let request = UploadRequest::new(metadata(&raw))
                .with_file(Role::Adhoc, staged(&fs, Role::Adhoc, "x.apk"))
                .with_file(Role::Icon, staged(&fs, Role::Icon, "i.png"));

            let err = service(&fs).receive(request).await.unwrap_err();
            assert!(matches!(err, UploadError::InvalidLocation), "{}", location);
        }
        assert!(fs.is_file("/srv/apps/.incoming/upload-other"));
        assert!(fs.is_file("/srv/apps/.incoming/adhoc"));
    }

    #[tokio::test]
    async fn test_base_directory_location_rejected() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.insert_file("/srv/apps/store/Other.apk", b"someone else".to_vec());

        let request = UploadRequest::new(metadata(r#"{"location":".","title":"x","version":"1"}"#))
            .with_file(Role::Adhoc, staged(&fs, Role::Adhoc, "x.apk"))
            .with_file(Role::Icon, staged(&fs, Role::Icon, "i.png"));

        let err = service(&fs).receive(request).await.unwrap_err();
        assert!(matches!(err, UploadError::InvalidLocation));
        assert!(fs.is_file("/srv/apps/store/Other.apk"));
        assert!(!fs.is_file("/srv/apps/android.json"));
    }
}
