//! Local Content Store
//!
//! The local side of a sync: a set of files addressed by slash-separated
//! relative paths. The engine only needs enumerate, read, write, delete and
//! directory creation, so any backing store can plug in behind [`LocalStore`].

pub mod fs;

use crate::content::{FileContent, TextExtensions};
use crate::error::StoreError;
use crate::types::RepoPath;
use async_trait::async_trait;

pub use fs::FsLocalStore;

/// Local content store interface
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Enumerate every file path in the store.
    async fn list_files(&self) -> Result<Vec<RepoPath>, StoreError>;

    async fn read_text(&self, path: &str) -> Result<String, StoreError>;

    async fn read_binary(&self, path: &str) -> Result<Vec<u8>, StoreError>;

    /// Create the file or replace its content.
    async fn write(&self, path: &str, content: &FileContent) -> Result<(), StoreError>;

    /// Delete a file. Deleting a missing file is not an error.
    async fn delete(&self, path: &str) -> Result<(), StoreError>;

    /// Create a directory and any missing ancestors.
    async fn create_dir_all(&self, path: &str) -> Result<(), StoreError>;

    async fn exists(&self, path: &str) -> Result<bool, StoreError>;
}

/// Read a file as text or bytes according to the extension allow-list.
pub async fn read_content(
    store: &dyn LocalStore,
    path: &str,
    text_extensions: &TextExtensions,
) -> Result<FileContent, StoreError> {
    if text_extensions.is_text(path) {
        store.read_text(path).await.map(FileContent::Text)
    } else {
        store.read_binary(path).await.map(FileContent::Binary)
    }
}

/// Parent directory of a store path, if it has one.
pub fn parent_dir(path: &str) -> Option<&str> {
    path.rfind('/').map(|idx| &path[..idx]).filter(|p| !p.is_empty())
}
