use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

/// The filesystem operations the upload pipeline is allowed to perform.
#[async_trait]
pub trait FileSystem: Send + Sync {
    async fn exists_dir(&self, path: &Path) -> Result<bool>;
    async fn create_dir_all(&self, path: &Path) -> Result<()>;
    /// Direct children of `path`, files and directories only.
    async fn list(&self, path: &Path) -> Result<Vec<DirEntry>>;
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;
    async fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;
    async fn remove_file(&self, path: &Path) -> Result<()>;
    async fn remove_dir_all(&self, path: &Path) -> Result<()>;
}

/// Local disk, through `tokio::fs`.
#[derive(Debug, Default, Clone)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn exists_dir(&self, path: &Path) -> Result<bool> {
        match tokio::fs::metadata(path).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        let mut builder = tokio::fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(0o1777);
        builder
            .create(path)
            .await
            .with_context(|| format!("create_dir_all {}", path.display()))
    }

    async fn list(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(path)
            .await
            .with_context(|| format!("read_dir {}", path.display()))?;

        while let Some(entry) = dir.next_entry().await? {
            let file_type = entry.file_type().await?;
            let kind = if file_type.is_file() {
                EntryKind::File
            } else if file_type.is_dir() {
                EntryKind::Directory
            } else {
                continue;
            };
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                kind,
            });
        }

        Ok(entries)
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        match tokio::fs::rename(from, to).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::CrossesDevices => {
                // Staging area on another volume: copy, then drop the source.
                tracing::debug!(
                    "rename across devices, copying {} -> {}",
                    from.display(),
                    to.display()
                );
                tokio::fs::copy(from, to)
                    .await
                    .with_context(|| format!("copy {} -> {}", from.display(), to.display()))?;
                tokio::fs::remove_file(from).await?;
                Ok(())
            }
            Err(e) => Err(anyhow!(e).context(format!(
                "rename {} -> {}",
                from.display(),
                to.display()
            ))),
        }
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        tokio::fs::write(path, contents)
            .await
            .with_context(|| format!("write {}", path.display()))
    }

    async fn remove_file(&self, path: &Path) -> Result<()> {
        tokio::fs::remove_file(path)
            .await
            .with_context(|| format!("remove_file {}", path.display()))
    }

    async fn remove_dir_all(&self, path: &Path) -> Result<()> {
        tokio::fs::remove_dir_all(path)
            .await
            .with_context(|| format!("remove_dir_all {}", path.display()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Directory,
    File(Vec<u8>),
}

/// In-memory filesystem for exercising the pipeline without touching disk.
///
/// Paths are stored verbatim, so callers should use the same base path
/// consistently. `create_dir_all` registers every ancestor.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    nodes: Mutex<BTreeMap<PathBuf, Node>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Places a file (and its parent directories) directly, as if it had been
    /// staged by the upload handler.
    pub fn insert_file(&self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) {
        let path = path.into();
        let mut nodes = self.nodes.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(parent) = path.parent() {
            for ancestor in parent.ancestors() {
                nodes.entry(ancestor.to_path_buf()).or_insert(Node::Directory);
            }
        }
        nodes.insert(path, Node::File(contents.into()));
    }

    pub fn read(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        match self.lock().get(path.as_ref()) {
            Some(Node::File(contents)) => Some(contents.clone()),
            _ => None,
        }
    }

    pub fn is_file(&self, path: impl AsRef<Path>) -> bool {
        matches!(self.lock().get(path.as_ref()), Some(Node::File(_)))
    }

    pub fn is_dir(&self, path: impl AsRef<Path>) -> bool {
        matches!(self.lock().get(path.as_ref()), Some(Node::Directory))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<PathBuf, Node>> {
        self.nodes.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl FileSystem for MemoryFileSystem {
    async fn exists_dir(&self, path: &Path) -> Result<bool> {
        Ok(self.is_dir(path))
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        let mut nodes = self.lock();
        for ancestor in path.ancestors() {
            if let Some(Node::File(_)) = nodes.get(ancestor) {
                return Err(anyhow!("{} is a file", ancestor.display()));
            }
        }
        for ancestor in path.ancestors() {
            nodes.entry(ancestor.to_path_buf()).or_insert(Node::Directory);
        }
        Ok(())
    }

    async fn list(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let nodes = self.lock();
        if !matches!(nodes.get(path), Some(Node::Directory)) {
            return Err(anyhow!("{} is not a directory", path.display()));
        }
        Ok(nodes
            .iter()
            .filter(|(candidate, _)| candidate.parent() == Some(path))
            .filter_map(|(candidate, node)| {
                let name = candidate.file_name()?.to_string_lossy().into_owned();
                let kind = match node {
                    Node::Directory => EntryKind::Directory,
                    Node::File(_) => EntryKind::File,
                };
                Some(DirEntry { name, kind })
            })
            .collect())
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let mut nodes = self.lock();
        let parent_exists = to
            .parent()
            .is_none_or(|parent| matches!(nodes.get(parent), Some(Node::Directory)));
        if !parent_exists {
            return Err(anyhow!("{} has no parent directory", to.display()));
        }
        match nodes.remove(from) {
            Some(Node::File(contents)) => {
                nodes.insert(to.to_path_buf(), Node::File(contents));
                Ok(())
            }
            Some(other) => {
                nodes.insert(from.to_path_buf(), other);
                Err(anyhow!("{} is not a file", from.display()))
            }
            None => Err(anyhow!("{} does not exist", from.display())),
        }
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let mut nodes = self.lock();
        let parent_exists = path
            .parent()
            .is_none_or(|parent| matches!(nodes.get(parent), Some(Node::Directory)));
        if !parent_exists {
            return Err(anyhow!("{} has no parent directory", path.display()));
        }
        nodes.insert(path.to_path_buf(), Node::File(contents.to_vec()));
        Ok(())
    }

    async fn remove_file(&self, path: &Path) -> Result<()> {
        let mut nodes = self.lock();
        match nodes.remove(path) {
            Some(Node::File(_)) => Ok(()),
            Some(other) => {
                nodes.insert(path.to_path_buf(), other);
                Err(anyhow!("{} is not a file", path.display()))
            }
            None => Err(anyhow!("{} does not exist", path.display())),
        }
    }

    async fn remove_dir_all(&self, path: &Path) -> Result<()> {
        let mut nodes = self.lock();
        if !matches!(nodes.get(path), Some(Node::Directory)) {
            return Err(anyhow!("{} is not a directory", path.display()));
        }
        nodes.retain(|candidate, _| !candidate.starts_with(path));
        Ok(())
    }
}
