use crate::api::error::UploadError;
use crate::models::{Platform, UploadMetadata, Variant};
use crate::services::provisioner::THINNED_DIR;
use crate::services::storage::FileSystem;
use crate::utils::template::{Escape, Template};
use crate::utils::validation::sanitize_name;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const IOS_TEMPLATE: &str = include_str!("../../templates/app.plist");
const ANDROID_TEMPLATE: &str = include_str!("../../templates/android.json");
const THINNED_TEMPLATE: &str = include_str!("../../templates/thinned_app.template");

/// Marker file the catalog reads to tell provisioned entries from public ones.
pub const PRIVATE_MARKER: &str = "private";

fn template_for(platform: Platform) -> Template {
    match platform {
        Platform::Ios => Template::new(IOS_TEMPLATE, Escape::Xml),
        Platform::Android => Template::new(ANDROID_TEMPLATE, Escape::Json),
    }
}

/// Builds the `thinned-assets` block: one package dict per variant, in order.
fn thinned_assets(variants: &[Variant]) -> Template {
    let mut block = Template::empty();
    block.append_raw("<key>thinned-assets</key>\n<array>\n");

    let mut variant_template = Template::new(THINNED_TEMPLATE, Escape::Xml);
    let mut device_types = Template::new("\t\t<string>{{type}}</string>\n", Escape::Xml);

    for variant in variants {
        let mut types = Template::empty();
        for device_type in &variant.device_types {
            device_types.replace("type", device_type);
            types.append(&device_types);
            device_types.reset();
        }

        variant_template
            .replace("variant-package", &sanitize_name(&variant.package))
            .replace("thinned-folder", THINNED_DIR)
            .replace_block("variants", &types);
        block.append(&variant_template);
        variant_template.reset();
    }

    block.append_raw("</array>");
    block
}

/// Renders the installer metadata document for a full upload.
///
/// `icon_name` is the stored name of the uploaded icon and overrides any
/// `icon` key in the metadata. Variants are only rendered for iOS.
pub fn render_metadata(
    platform: Platform,
    metadata: &UploadMetadata,
    icon_name: Option<&str>,
) -> String {
    let mut template = template_for(platform);

    for (key, value) in metadata.scalars() {
        template.replace(key, &value);
    }
    if let Some(icon) = icon_name {
        template.replace("icon", icon);
    }

    match (platform, metadata.variants()) {
        (Platform::Ios, Some(variants)) => {
            tracing::debug!("Rendering {} thinned variants", variants.len());
            template.replace_block("thinned-assets", &thinned_assets(&variants));
        }
        _ => {
            template.replace("thinned-assets", "");
        }
    }

    template.render()
}

/// Writes the rendered metadata and the `private` marker into a location directory.
#[derive(Clone)]
pub struct MetadataRenderer {
    fs: Arc<dyn FileSystem>,
}

impl MetadataRenderer {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    pub async fn write(
        &self,
        target: &Path,
        platform: Platform,
        metadata: &UploadMetadata,
        icon_name: Option<&str>,
    ) -> Result<PathBuf, UploadError> {
        let document = render_metadata(platform, metadata, icon_name);
        let path = target.join(platform.metadata_file());

        self.fs.write(&path, document.as_bytes()).await?;
        self.fs.write(&target.join(PRIVATE_MARKER), &[]).await?;

        tracing::info!("Wrote {} metadata to {}", platform, path.display());
        Ok(path)
    }
}
