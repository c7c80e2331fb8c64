use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use utoipa::ToSchema;

/// Fixed role names a multipart file part can be submitted under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Adhoc,
    Store,
    Variant,
    Icon,
    Symbols,
    Releasenotes,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Adhoc,
        Role::Store,
        Role::Variant,
        Role::Icon,
        Role::Symbols,
        Role::Releasenotes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Adhoc => "adhoc",
            Role::Store => "store",
            Role::Variant => "variant",
            Role::Icon => "icon",
            Role::Symbols => "symbols",
            Role::Releasenotes => "releasenotes",
        }
    }

    pub fn from_field_name(name: &str) -> Option<Role> {
        Role::ALL.into_iter().find(|role| role.as_str() == name)
    }

    /// Roles that carry an installable build.
    pub fn is_build(&self) -> bool {
        matches!(self, Role::Adhoc | Role::Store | Role::Variant)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Ios,
    Android,
}

impl Platform {
    /// Filename the installer metadata is written under inside the location directory.
    pub fn metadata_file(&self) -> &'static str {
        match self {
            Platform::Ios => "app.plist",
            Platform::Android => "android.json",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Ios => f.write_str("iOS"),
            Platform::Android => f.write_str("Android"),
        }
    }
}

/// An uploaded part already spooled to the staging area.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub file_name: String,
    pub staged_path: PathBuf,
    pub size: u64,
}

/// The JSON sidecar submitted in the `metadata` form field.
///
/// Keys keep their submission order, which is what orders the variant blocks
/// in the rendered manifest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadMetadata(Map<String, Value>);

impl UploadMetadata {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Map<String, Value>>(raw).map(Self)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.get(key).is_some_and(|v| !v.is_null())
    }

    pub fn location(&self) -> Option<&str> {
        self.0.get("location").and_then(Value::as_str)
    }

    /// Scalar fields rendered as text. Arrays, objects and nulls are skipped.
    pub fn scalars(&self) -> impl Iterator<Item = (&str, String)> {
        self.0.iter().filter_map(|(key, value)| {
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some((key.as_str(), text))
        })
    }

    /// Thinned variants in submission order. Non-string device types are dropped.
    pub fn variants(&self) -> Option<Vec<Variant>> {
        let variants = self.0.get("variants")?.as_object()?;
        Some(
            variants
                .iter()
                .map(|(package, device_types)| Variant {
                    package: package.clone(),
                    device_types: device_types
                        .as_array()
                        .map(|types| {
                            types
                                .iter()
                                .filter_map(|t| t.as_str().map(str::to_string))
                                .collect()
                        })
                        .unwrap_or_default(),
                })
                .collect(),
        )
    }
}

/// A thinned package and the device types it targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub package: String,
    pub device_types: Vec<String>,
}

/// One upload request: decoded metadata plus the file parts keyed by role.
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    pub metadata: UploadMetadata,
    pub files: BTreeMap<Role, FilePart>,
}

impl UploadRequest {
    pub fn new(metadata: UploadMetadata) -> Self {
        Self {
            metadata,
            files: BTreeMap::new(),
        }
    }

    pub fn with_file(mut self, role: Role, part: FilePart) -> Self {
        self.files.insert(role, part);
        self
    }

    pub fn file(&self, role: Role) -> Option<&FilePart> {
        self.files.get(&role)
    }

    pub fn has(&self, role: Role) -> bool {
        self.files.contains_key(&role)
    }

    pub fn has_build(&self) -> bool {
        self.files.keys().any(Role::is_build)
    }
}

/// Role to public URL for every artifact that was published.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(transparent)]
pub struct UploadResponse(#[schema(value_type = Object)] pub BTreeMap<Role, String>);

impl UploadResponse {
    pub fn get(&self, role: Role) -> Option<&str> {
        self.0.get(&role).map(String::as_str)
    }
}
