//! Directory-backed local store.

use crate::config::sources::WORKSPACE_CONFIG_FILE;
use crate::content::FileContent;
use crate::error::StoreError;
use crate::store::LocalStore;
use crate::types::RepoPath;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Directory names never enumerated as store content.
pub const DEFAULT_EXCLUDED_DIRS: &[&str] = &[".git"];

/// File names never enumerated as store content. The workspace config may
/// hold the access token, so it must never reach the remote.
pub const DEFAULT_EXCLUDED_FILES: &[&str] = &[WORKSPACE_CONFIG_FILE];

/// Local store rooted at a filesystem directory.
pub struct FsLocalStore {
    root: PathBuf,
    excluded_dirs: HashSet<String>,
    excluded_files: HashSet<String>,
}

impl FsLocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_exclusions(
            root,
            DEFAULT_EXCLUDED_DIRS.iter().copied(),
            DEFAULT_EXCLUDED_FILES.iter().copied(),
        )
    }

    /// Store that skips the given directory and file names at any depth.
    pub fn with_exclusions<D, F, S>(root: impl Into<PathBuf>, dirs: D, files: F) -> Self
    where
        D: IntoIterator<Item = S>,
        F: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            root: root.into(),
            excluded_dirs: dirs.into_iter().map(Into::into).collect(),
            excluded_files: files.into_iter().map(Into::into).collect(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a store path to a filesystem path under the root.
    ///
    /// Absolute paths and `..` segments are rejected.
    fn resolve(&self, path: &str) -> Result<PathBuf, StoreError> {
        if path.is_empty() {
            return Err(StoreError::InvalidPath(path.to_string()));
        }
        let relative = Path::new(path);
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => return Err(StoreError::InvalidPath(path.to_string())),
            }
        }
        Ok(self.root.join(relative))
    }

    fn to_store_path(&self, full: &Path) -> Option<RepoPath> {
        let relative = full.strip_prefix(&self.root).ok()?;
        let mut segments = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(name) => segments.push(name.to_str()?.to_string()),
                _ => return None,
            }
        }
        Some(segments.join("/"))
    }
}

#[async_trait]
impl LocalStore for FsLocalStore {
    async fn list_files(&self) -> Result<Vec<RepoPath>, StoreError> {
        let root = self.root.clone();
        let excluded = self.excluded_dirs.clone();
        let excluded_files = self.excluded_files.clone();
        let entries = tokio::task::spawn_blocking(move || {
            let mut files = Vec::new();
            let walker = WalkDir::new(&root)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|entry| {
                    entry.depth() == 0
                        || !entry.file_type().is_dir()
                        || entry
                            .file_name()
                            .to_str()
                            .map(|name| !excluded.contains(name))
                            .unwrap_or(true)
                });
            for entry in walker {
                let entry = entry.map_err(|e| {
                    let path = e
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| root.display().to_string());
                    StoreError::io(path, std::io::Error::other(e.to_string()))
                })?;
                let skipped = entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| excluded_files.contains(name));
                if entry.file_type().is_file() && !skipped {
                    files.push(entry.into_path());
                }
            }
            Ok::<_, StoreError>(files)
        })
        .await
        .map_err(|e| StoreError::io(self.root.display().to_string(), std::io::Error::other(e)))??;

        let mut paths = Vec::with_capacity(entries.len());
        for full in entries {
            match self.to_store_path(&full) {
                Some(path) => paths.push(path),
                None => tracing::warn!("Skipping non UTF-8 path in local store: {:?}", full),
            }
        }
        Ok(paths)
    }

    async fn read_text(&self, path: &str) -> Result<String, StoreError> {
        let bytes = self.read_binary(path).await?;
        String::from_utf8(bytes).map_err(|_| StoreError::NotUtf8(path.to_string()))
    }

    async fn read_binary(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        let full = self.resolve(path)?;
        tokio::fs::read(&full).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound(path.to_string())
            } else {
                StoreError::io(path, e)
            }
        })
    }

    async fn write(&self, path: &str, content: &FileContent) -> Result<(), StoreError> {
        let full = self.resolve(path)?;
        tokio::fs::write(&full, content.as_bytes())
            .await
            .map_err(|e| StoreError::io(path, e))
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        let full = self.resolve(path)?;
        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    async fn create_dir_all(&self, path: &str) -> Result<(), StoreError> {
        let full = self.resolve(path)?;
        tokio::fs::create_dir_all(&full)
            .await
            .map_err(|e| StoreError::io(path, e))
    }

    async fn exists(&self, path: &str) -> Result<bool, StoreError> {
        let full = self.resolve(path)?;
        tokio::fs::try_exists(&full)
            .await
            .map_err(|e| StoreError::io(path, e))
    }
}
