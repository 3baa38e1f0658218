//! In-memory [`RemoteRepository`]
//!
//! Keeps blobs, trees, commits and refs in process. Blob ids match Git; tree
//! and commit ids are SHA-1 digests over a simplified encoding, which is enough
//! for identity but not byte-compatible with Git. Failure injection and ref
//! propagation lag make it usable as a deterministic stand-in for a hosted
//! remote in tests and dry runs.

use crate::error::RemoteError;
use crate::hash::compute_blob_id;
use crate::remote::{
    BlobEncoding, NewTreeEntry, ObjectType, RemoteRepository, TreeEntryObject, TreeListingEntry,
};
use crate::types::{ObjectId, RepoPath};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use parking_lot::Mutex;
use sha1::{Digest, Sha1};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Remote operations, used for call recording and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    CheckRepository,
    HeadCommit,
    CommitTree,
    ListTree,
    GetBlob,
    CreateBlob,
    CreateTree,
    CreateCommit,
    CreateRef,
    UpdateRef,
    CreateInitialCommit,
}

#[derive(Debug, Clone)]
struct CommitRecord {
    tree: ObjectId,
    parent: Option<ObjectId>,
    message: String,
}

#[derive(Debug, Clone)]
struct StaleHead {
    reported: Option<ObjectId>,
    remaining: usize,
}

#[derive(Default)]
struct MemoryState {
    blobs: HashMap<ObjectId, Vec<u8>>,
    trees: HashMap<ObjectId, BTreeMap<RepoPath, ObjectId>>,
    commits: HashMap<ObjectId, CommitRecord>,
    refs: HashMap<String, ObjectId>,
    stale_heads: HashMap<String, StaleHead>,
    failures: HashMap<RemoteOp, RemoteError>,
    calls: Vec<RemoteOp>,
    ref_lag: usize,
    commit_counter: u64,
}

impl MemoryState {
    fn enter(&mut self, op: RemoteOp) -> Result<(), RemoteError> {
        self.calls.push(op);
        match self.failures.get(&op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn store_blob(&mut self, bytes: Vec<u8>) -> ObjectId {
        let id = compute_blob_id(&bytes);
        self.blobs.insert(id.clone(), bytes);
        id
    }

    fn store_tree(&mut self, entries: BTreeMap<RepoPath, ObjectId>) -> ObjectId {
        let mut hasher = Sha1::new();
        hasher.update(b"tree\0");
        for (path, id) in &entries {
            hasher.update(path.as_bytes());
            hasher.update(b"\0");
            hasher.update(id.as_bytes());
            hasher.update(b"\n");
        }
        let id = hex::encode(hasher.finalize());
        self.trees.insert(id.clone(), entries);
        id
    }

    fn store_commit(&mut self, tree: ObjectId, parent: Option<ObjectId>, message: &str) -> ObjectId {
        self.commit_counter += 1;
        let mut hasher = Sha1::new();
        hasher.update(b"commit\0");
        hasher.update(tree.as_bytes());
        hasher.update(parent.as_deref().unwrap_or("").as_bytes());
        hasher.update(message.as_bytes());
        hasher.update(self.commit_counter.to_be_bytes());
        let id = hex::encode(hasher.finalize());
        self.commits.insert(
            id.clone(),
            CommitRecord {
                tree,
                parent,
                message: message.to_string(),
            },
        );
        id
    }

    fn move_ref(&mut self, branch: &str, commit: ObjectId) {
        let previous = self.refs.insert(branch.to_string(), commit);
        if self.ref_lag > 0 {
            self.stale_heads.insert(
                branch.to_string(),
                StaleHead {
                    reported: previous,
                    remaining: self.ref_lag,
                },
            );
        }
    }

    fn is_ancestor(&self, ancestor: &str, mut commit: Option<ObjectId>) -> bool {
        while let Some(id) = commit {
            if id == ancestor {
                return true;
            }
            commit = self.commits.get(&id).and_then(|c| c.parent.clone());
        }
        false
    }

    fn tree_of(&self, commit: &str) -> Result<&BTreeMap<RepoPath, ObjectId>, RemoteError> {
        let record = self
            .commits
            .get(commit)
            .ok_or_else(|| RemoteError::not_found(format!("No commit {}", commit)))?;
        self.trees
            .get(&record.tree)
            .ok_or_else(|| RemoteError::not_found(format!("No tree {}", record.tree)))
    }
}

/// In-memory remote repository.
#[derive(Default)]
pub struct MemoryRemote {
    state: Mutex<MemoryState>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call of `op` fail with `error` until cleared.
    pub fn fail_on(&self, op: RemoteOp, error: RemoteError) {
        self.state.lock().failures.insert(op, error);
    }

    pub fn clear_failures(&self) {
        self.state.lock().failures.clear();
    }

    /// After each ref move, report the previous head for `polls` reads.
    pub fn set_ref_lag(&self, polls: usize) {
        self.state.lock().ref_lag = polls;
    }

    /// Operations called so far, in order.
    pub fn calls(&self) -> Vec<RemoteOp> {
        self.state.lock().calls.clone()
    }

    pub fn call_count(&self, op: RemoteOp) -> usize {
        self.state.lock().calls.iter().filter(|c| **c == op).count()
    }

    /// Commit a full snapshot of `files` on top of the branch head, as another
    /// client pushing would.
    pub fn seed_commit(&self, branch: &str, files: &[(&str, &[u8])], message: &str) -> ObjectId {
        let mut state = self.state.lock();
        let mut entries = BTreeMap::new();
        for (path, bytes) in files {
            let id = state.store_blob(bytes.to_vec());
            entries.insert(path.to_string(), id);
        }
        let tree = state.store_tree(entries);
        let parent = state.refs.get(branch).cloned();
        let commit = state.store_commit(tree, parent, message);
        state.refs.insert(branch.to_string(), commit.clone());
        commit
    }

    /// Current head without lag or failure injection.
    pub fn branch_head(&self, branch: &str) -> Option<ObjectId> {
        self.state.lock().refs.get(branch).cloned()
    }

    /// Files of a commit's tree with their content.
    pub fn files_at(&self, commit: &str) -> Option<BTreeMap<RepoPath, Vec<u8>>> {
        let state = self.state.lock();
        let tree = state.tree_of(commit).ok()?;
        Some(
            tree.iter()
                .filter_map(|(path, id)| state.blobs.get(id).map(|b| (path.clone(), b.clone())))
                .collect(),
        )
    }

    pub fn commit_parent(&self, commit: &str) -> Option<ObjectId> {
        self.state
            .lock()
            .commits
            .get(commit)
            .and_then(|c| c.parent.clone())
    }

    pub fn commit_message(&self, commit: &str) -> Option<String> {
        self.state
            .lock()
            .commits
            .get(commit)
            .map(|c| c.message.clone())
    }
}

#[async_trait]
impl RemoteRepository for MemoryRemote {
    async fn check_repository(&self) -> Result<(), RemoteError> {
        self.state.lock().enter(RemoteOp::CheckRepository)
    }

    async fn head_commit(&self, branch: &str) -> Result<Option<ObjectId>, RemoteError> {
        let mut state = self.state.lock();
        state.enter(RemoteOp::HeadCommit)?;
        if let Some(stale) = state.stale_heads.get_mut(branch) {
            if stale.remaining > 0 {
                stale.remaining -= 1;
                return Ok(stale.reported.clone());
            }
        }
        Ok(state.refs.get(branch).cloned())
    }

    async fn commit_tree(&self, commit: &str) -> Result<ObjectId, RemoteError> {
        let mut state = self.state.lock();
        state.enter(RemoteOp::CommitTree)?;
        state
            .commits
            .get(commit)
            .map(|c| c.tree.clone())
            .ok_or_else(|| RemoteError::not_found(format!("No commit {}", commit)))
    }

    async fn list_tree(&self, tree: &str) -> Result<Vec<TreeListingEntry>, RemoteError> {
        let mut state = self.state.lock();
        state.enter(RemoteOp::ListTree)?;
        let entries = state
            .trees
            .get(tree)
            .ok_or_else(|| RemoteError::not_found(format!("No tree {}", tree)))?;

        let mut dirs = BTreeSet::new();
        let mut listing = Vec::new();
        for (path, id) in entries {
            let mut prefix = path.as_str();
            while let Some(idx) = prefix.rfind('/') {
                prefix = &prefix[..idx];
                dirs.insert(prefix.to_string());
            }
            listing.push(TreeListingEntry::blob(path.clone(), id.clone()));
        }
        listing.extend(dirs.into_iter().map(|dir| TreeListingEntry {
            path: dir,
            object_type: ObjectType::Tree,
            sha: None,
        }));
        Ok(listing)
    }

    async fn get_blob(&self, blob: &str) -> Result<String, RemoteError> {
        let mut state = self.state.lock();
        state.enter(RemoteOp::GetBlob)?;
        let bytes = state
            .blobs
            .get(blob)
            .ok_or_else(|| RemoteError::not_found(format!("No blob {}", blob)))?;
        // Hosted remotes wrap base64 at 60 columns
        let encoded = BASE64.encode(bytes);
        let wrapped: Vec<String> = encoded
            .as_bytes()
            .chunks(60)
            .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
            .collect();
        Ok(wrapped.join("\n"))
    }

    async fn create_blob(
        &self,
        content: &str,
        encoding: BlobEncoding,
    ) -> Result<ObjectId, RemoteError> {
        let mut state = self.state.lock();
        state.enter(RemoteOp::CreateBlob)?;
        let bytes = match encoding {
            BlobEncoding::Utf8 => content.as_bytes().to_vec(),
            BlobEncoding::Base64 => BASE64
                .decode(content.as_bytes())
                .map_err(|e| RemoteError::other(format!("Invalid base64 blob: {}", e)))?,
        };
        Ok(state.store_blob(bytes))
    }

    async fn create_tree(
        &self,
        entries: &[NewTreeEntry],
        base_tree: Option<&str>,
    ) -> Result<ObjectId, RemoteError> {
        let mut state = self.state.lock();
        state.enter(RemoteOp::CreateTree)?;
        let mut tree = match base_tree {
            Some(base) => state
                .trees
                .get(base)
                .cloned()
                .ok_or_else(|| RemoteError::from_status(422, format!("Invalid base tree {}", base)))?,
            None => BTreeMap::new(),
        };
        for entry in entries {
            match &entry.object {
                TreeEntryObject::Inline(content) => {
                    let id = state.store_blob(content.as_bytes().to_vec());
                    tree.insert(entry.path.clone(), id);
                }
                TreeEntryObject::Blob(id) => {
                    if !state.blobs.contains_key(id) {
                        return Err(RemoteError::from_status(
                            422,
                            format!("Unknown blob {} for {}", id, entry.path),
                        ));
                    }
                    tree.insert(entry.path.clone(), id.clone());
                }
                TreeEntryObject::Delete => {
                    tree.remove(&entry.path);
                }
            }
        }
        Ok(state.store_tree(tree))
    }

    async fn create_commit(
        &self,
        tree: &str,
        parent: Option<&str>,
        message: &str,
    ) -> Result<ObjectId, RemoteError> {
        let mut state = self.state.lock();
        state.enter(RemoteOp::CreateCommit)?;
        if !state.trees.contains_key(tree) {
            return Err(RemoteError::from_status(422, format!("Unknown tree {}", tree)));
        }
        if let Some(parent) = parent {
            if !state.commits.contains_key(parent) {
                return Err(RemoteError::from_status(
                    422,
                    format!("Unknown parent {}", parent),
                ));
            }
        }
        Ok(state.store_commit(tree.to_string(), parent.map(str::to_string), message))
    }

    async fn create_ref(&self, branch: &str, commit: &str) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        state.enter(RemoteOp::CreateRef)?;
        if state.refs.contains_key(branch) {
            return Err(RemoteError::from_status(
                422,
                format!("Reference refs/heads/{} already exists", branch),
            ));
        }
        if !state.commits.contains_key(commit) {
            return Err(RemoteError::from_status(422, format!("Unknown commit {}", commit)));
        }
        state.move_ref(branch, commit.to_string());
        Ok(())
    }

    async fn update_ref(&self, branch: &str, commit: &str) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        state.enter(RemoteOp::UpdateRef)?;
        let current = state.refs.get(branch).cloned().ok_or_else(|| {
            RemoteError::from_status(422, format!("Reference refs/heads/{} does not exist", branch))
        })?;
        if !state.is_ancestor(&current, Some(commit.to_string())) {
            return Err(RemoteError::from_status(422, "Update is not a fast forward"));
        }
        state.move_ref(branch, commit.to_string());
        Ok(())
    }

    async fn create_initial_commit(
        &self,
        branch: &str,
        path: &str,
        content: &str,
        message: &str,
    ) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        state.enter(RemoteOp::CreateInitialCommit)?;
        if state.refs.contains_key(branch) {
            return Err(RemoteError::from_status(
                422,
                format!("Branch {} already has commits", branch),
            ));
        }
        let blob = state.store_blob(content.as_bytes().to_vec());
        let tree = state.store_tree(BTreeMap::from([(path.to_string(), blob)]));
        let commit = state.store_commit(tree, None, message);
        state.refs.insert(branch.to_string(), commit);
        Ok(())
    }
}
