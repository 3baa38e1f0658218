//! Three-way file state
//!
//! Collects, for every path, the blob id in the base snapshot, in the local
//! store and at the remote head. The three sources are gathered concurrently
//! and merged into one path-keyed map; each source only ever writes its own
//! field.

use crate::content::{FileContent, TextExtensions};
use crate::error::SyncError;
use crate::remote::{list_commit_tree, ObjectType, RemoteRepository};
use crate::store::{read_content, LocalStore};
use crate::types::{ObjectId, RepoPath};
use futures::future::try_join_all;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Where a blob id was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSource {
    Base,
    Local,
    Remote,
}

/// Knowledge about one path across the three snapshots.
///
/// `None` means the path does not exist in that snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileState {
    pub base_id: Option<ObjectId>,
    pub local_id: Option<ObjectId>,
    pub remote_id: Option<ObjectId>,
    /// Local content, kept so push does not read the file again
    pub content: Option<FileContent>,
}

impl FileState {
    pub fn new(
        base_id: Option<&str>,
        local_id: Option<&str>,
        remote_id: Option<&str>,
    ) -> Self {
        Self {
            base_id: base_id.map(str::to_string),
            local_id: local_id.map(str::to_string),
            remote_id: remote_id.map(str::to_string),
            content: None,
        }
    }
}

/// Path-keyed map of [`FileState`], ordered by path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileStates {
    states: BTreeMap<RepoPath, FileState>,
}

impl FileStates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a blob id seen by `source`, creating the entry on first use.
    pub fn record(
        &mut self,
        path: &str,
        source: FileSource,
        id: ObjectId,
        content: Option<FileContent>,
    ) {
        let state = self.states.entry(path.to_string()).or_default();
        let slot = match source {
            FileSource::Base => &mut state.base_id,
            FileSource::Local => &mut state.local_id,
            FileSource::Remote => &mut state.remote_id,
        };
        if let Some(previous) = slot.as_ref() {
            warn!(
                path,
                source = ?source,
                previous = %previous,
                "Path reported twice by the same source; keeping the latest id"
            );
        }
        *slot = Some(id);
        if source == FileSource::Local && content.is_some() {
            state.content = content;
        }
    }

    pub fn insert(&mut self, path: impl Into<RepoPath>, state: FileState) {
        self.states.insert(path.into(), state);
    }

    pub fn get(&self, path: &str) -> Option<&FileState> {
        self.states.get(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RepoPath, &FileState)> {
        self.states.iter()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl FromIterator<(RepoPath, FileState)> for FileStates {
    fn from_iter<T: IntoIterator<Item = (RepoPath, FileState)>>(iter: T) -> Self {
        Self {
            states: iter.into_iter().collect(),
        }
    }
}

/// Mutex-guarded [`FileStates`] shared by the concurrent collection tasks.
#[derive(Default)]
struct SharedFileStates {
    inner: Mutex<FileStates>,
}

impl SharedFileStates {
    fn record(&self, path: &str, source: FileSource, id: ObjectId, content: Option<FileContent>) {
        self.inner.lock().record(path, source, id, content);
    }

    fn into_inner(self) -> FileStates {
        self.inner.into_inner()
    }
}

/// Builds [`FileStates`] from the local store and two remote commits.
pub struct StateBuilder<'a> {
    store: &'a dyn LocalStore,
    remote: &'a dyn RemoteRepository,
    text_extensions: &'a TextExtensions,
}

impl<'a> StateBuilder<'a> {
    pub fn new(
        store: &'a dyn LocalStore,
        remote: &'a dyn RemoteRepository,
        text_extensions: &'a TextExtensions,
    ) -> Self {
        Self {
            store,
            remote,
            text_extensions,
        }
    }

    /// Scan the local store and fetch the base and remote trees concurrently.
    ///
    /// All three must finish before the map is returned. Any failure, local or
    /// remote, fails the whole build: a partial map would misclassify paths.
    pub async fn build(
        &self,
        base_commit: Option<&str>,
        remote_commit: Option<&str>,
    ) -> Result<FileStates, SyncError> {
        let shared = SharedFileStates::default();

        tokio::try_join!(
            self.scan_local(&shared),
            self.load_tree(&shared, base_commit, FileSource::Base),
            self.load_tree(&shared, remote_commit, FileSource::Remote),
        )?;

        let states = shared.into_inner();
        info!(
            paths = states.len(),
            base = base_commit.unwrap_or("-"),
            remote = remote_commit.unwrap_or("-"),
            "Built file states"
        );
        Ok(states)
    }

    async fn scan_local(&self, shared: &SharedFileStates) -> Result<(), SyncError> {
        let paths = self.store.list_files().await?;
        debug!(count = paths.len(), "Hashing local files");

        try_join_all(paths.iter().map(|path| async move {
            let content = read_content(self.store, path, self.text_extensions).await?;
            let id = content.blob_id();
            shared.record(path, FileSource::Local, id, Some(content));
            Ok::<(), SyncError>(())
        }))
        .await?;
        Ok(())
    }

    async fn load_tree(
        &self,
        shared: &SharedFileStates,
        commit: Option<&str>,
        source: FileSource,
    ) -> Result<(), SyncError> {
        let Some(commit) = commit else {
            return Ok(());
        };
        let listing = list_commit_tree(self.remote, commit).await?;
        let mut blobs = 0usize;
        for entry in listing {
            if entry.object_type != ObjectType::Blob {
                continue;
            }
            if let Some(sha) = entry.sha {
                shared.record(&entry.path, source, sha, None);
                blobs += 1;
            }
        }
        debug!(commit, source = ?source, blobs, "Loaded remote tree");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{RemoteError, RemoteErrorKind};
    use crate::hash::compute_blob_id;
    use crate::remote::memory::RemoteOp;
    use crate::remote::MemoryRemote;
    use crate::store::FsLocalStore;
    use tempfile::TempDir;

    #[test]
    fn test_record_keeps_sources_separate() {
        let mut states = FileStates::new();
        states.record("a.md", FileSource::Base, "b".to_string(), None);
        states.record(
            "a.md",
            FileSource::Local,
            "l".to_string(),
            Some(FileContent::Text("x".to_string())),
        );
        states.record("a.md", FileSource::Remote, "r".to_string(), None);

        let state = states.get("a.md").unwrap();
        assert_eq!(state.base_id.as_deref(), Some("b"));
        assert_eq!(state.local_id.as_deref(), Some("l"));
        assert_eq!(state.remote_id.as_deref(), Some("r"));
        assert_eq!(state.content, Some(FileContent::Text("x".to_string())));
    }

    #[tokio::test]
    async fn test_build_merges_three_sources() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("img")).unwrap();
        std::fs::write(temp.path().join("shared.md"), "same").unwrap();
        std::fs::write(temp.path().join("img/pic.png"), [1u8, 2, 3]).unwrap();

        let remote = MemoryRemote::new();
        let base = remote.seed_commit("main", &[("shared.md", b"same"), ("gone.md", b"old")], "base");
        let head = remote.seed_commit("main", &[("shared.md", b"same"), ("new.md", b"n")], "head");

        let store = FsLocalStore::new(temp.path());
        let exts = TextExtensions::default();
        let states = StateBuilder::new(&store, &remote, &exts)
            .build(Some(&base), Some(&head))
            .await
            .unwrap();

        let same = compute_blob_id(b"same");
        assert_eq!(
            states.get("shared.md").map(|s| (&s.base_id, &s.local_id, &s.remote_id)),
            Some((&Some(same.clone()), &Some(same.clone()), &Some(same)))
        );

        let pic = states.get("img/pic.png").unwrap();
        assert_eq!(pic.local_id, Some(compute_blob_id(&[1, 2, 3])));
        assert_eq!(pic.content, Some(FileContent::Binary(vec![1, 2, 3])));
        assert!(pic.base_id.is_none() && pic.remote_id.is_none());

        let gone = states.get("gone.md").unwrap();
        assert!(gone.base_id.is_some() && gone.local_id.is_none() && gone.remote_id.is_none());

        assert!(states.get("new.md").unwrap().remote_id.is_some());
        // directories from the tree listing never become entries
        assert!(states.get("img").is_none());
        assert_eq!(states.len(), 4);
    }

    #[tokio::test]
    async fn test_build_without_commits_is_local_only() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.md"), "a").unwrap();
        let remote = MemoryRemote::new();
        let store = FsLocalStore::new(temp.path());
        let exts = TextExtensions::default();

        let states = StateBuilder::new(&store, &remote, &exts)
            .build(None, None)
            .await
            .unwrap();
        assert_eq!(states.len(), 1);
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn test_remote_failure_is_fatal() {
        let temp = TempDir::new().unwrap();
        let remote = MemoryRemote::new();
        let head = remote.seed_commit("main", &[("a.md", b"a")], "head");
        remote.fail_on(RemoteOp::ListTree, RemoteError::network("reset"));

        let store = FsLocalStore::new(temp.path());
        let exts = TextExtensions::default();
        let err = StateBuilder::new(&store, &remote, &exts)
            .build(None, Some(&head))
            .await
            .unwrap_err();
        assert_eq!(err.remote_kind(), Some(RemoteErrorKind::Network));
    }

    #[tokio::test]
    async fn test_unreadable_local_text_is_fatal() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("bad.md"), [0xffu8]).unwrap();
        let remote = MemoryRemote::new();
        let store = FsLocalStore::new(temp.path());
        let exts = TextExtensions::default();

        let result = StateBuilder::new(&store, &remote, &exts).build(None, None).await;
        assert!(matches!(result, Err(SyncError::Store(_))));
    }
}
