//! Remote Repository
//!
//! The remote side of a sync: a Git object store reached over an API.
//! [`RemoteRepository`] exposes the object and ref operations the engine needs;
//! transport and authentication stay inside the implementation.

pub mod github;
pub mod memory;

use crate::error::RemoteError;
use crate::types::{ObjectId, RepoPath};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use github::GitHubRemote;
pub use memory::MemoryRemote;

/// File mode used for every blob the engine writes.
pub const BLOB_MODE: &str = "100644";

/// Object type of a tree listing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    Blob,
    Tree,
    Commit,
    #[serde(other)]
    Other,
}

/// One entry of a recursive tree listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeListingEntry {
    pub path: RepoPath,
    #[serde(rename = "type")]
    pub object_type: ObjectType,
    #[serde(default)]
    pub sha: Option<ObjectId>,
}

impl TreeListingEntry {
    pub fn blob(path: impl Into<RepoPath>, sha: impl Into<ObjectId>) -> Self {
        Self {
            path: path.into(),
            object_type: ObjectType::Blob,
            sha: Some(sha.into()),
        }
    }
}

/// What a new tree entry points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEntryObject {
    /// UTF-8 content the remote turns into a blob while building the tree
    Inline(String),
    /// Previously uploaded blob
    Blob(ObjectId),
    /// Null object id: remove the path from the base tree
    Delete,
}

/// Entry passed to [`RemoteRepository::create_tree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTreeEntry {
    pub path: RepoPath,
    pub mode: String,
    pub object: TreeEntryObject,
}

impl NewTreeEntry {
    pub fn inline(path: impl Into<RepoPath>, content: impl Into<String>) -> Self {
        Self::with_object(path, TreeEntryObject::Inline(content.into()))
    }

    pub fn blob(path: impl Into<RepoPath>, sha: impl Into<ObjectId>) -> Self {
        Self::with_object(path, TreeEntryObject::Blob(sha.into()))
    }

    pub fn delete(path: impl Into<RepoPath>) -> Self {
        Self::with_object(path, TreeEntryObject::Delete)
    }

    fn with_object(path: impl Into<RepoPath>, object: TreeEntryObject) -> Self {
        Self {
            path: path.into(),
            mode: BLOB_MODE.to_string(),
            object,
        }
    }
}

/// Encoding of content passed to [`RemoteRepository::create_blob`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlobEncoding {
    #[serde(rename = "utf-8")]
    Utf8,
    #[serde(rename = "base64")]
    Base64,
}

/// Remote version-control API.
///
/// Implementations are scoped to one repository; branch names are passed
/// per call.
#[async_trait]
pub trait RemoteRepository: Send + Sync {
    /// Confirm the repository exists and the credentials are accepted.
    async fn check_repository(&self) -> Result<(), RemoteError>;

    /// Commit the branch points at, or `None` when the branch or the whole
    /// repository is empty.
    async fn head_commit(&self, branch: &str) -> Result<Option<ObjectId>, RemoteError>;

    /// Tree id of a commit.
    async fn commit_tree(&self, commit: &str) -> Result<ObjectId, RemoteError>;

    /// Recursive listing of a tree.
    async fn list_tree(&self, tree: &str) -> Result<Vec<TreeListingEntry>, RemoteError>;

    /// Base64 content of a blob.
    async fn get_blob(&self, blob: &str) -> Result<String, RemoteError>;

    async fn create_blob(
        &self,
        content: &str,
        encoding: BlobEncoding,
    ) -> Result<ObjectId, RemoteError>;

    /// Create a tree from `entries` layered onto `base_tree`.
    async fn create_tree(
        &self,
        entries: &[NewTreeEntry],
        base_tree: Option<&str>,
    ) -> Result<ObjectId, RemoteError>;

    async fn create_commit(
        &self,
        tree: &str,
        parent: Option<&str>,
        message: &str,
    ) -> Result<ObjectId, RemoteError>;

    /// Create `refs/heads/<branch>` pointing at `commit`.
    async fn create_ref(&self, branch: &str, commit: &str) -> Result<(), RemoteError>;

    /// Move `refs/heads/<branch>` to `commit`. Never forced: fails when the
    /// move is not a fast-forward.
    async fn update_ref(&self, branch: &str, commit: &str) -> Result<(), RemoteError>;

    /// Create the first commit of an empty branch holding a single file.
    async fn create_initial_commit(
        &self,
        branch: &str,
        path: &str,
        content: &str,
        message: &str,
    ) -> Result<(), RemoteError>;
}

/// Recursive listing of the tree a commit points at.
pub async fn list_commit_tree(
    remote: &dyn RemoteRepository,
    commit: &str,
) -> Result<Vec<TreeListingEntry>, RemoteError> {
    let tree = remote.commit_tree(commit).await?;
    remote.list_tree(&tree).await
}
