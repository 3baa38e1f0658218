//! Publish local changes as a new commit on the remote branch.

use crate::content::{FileContent, TextExtensions};
use crate::diff::DiffResult;
use crate::error::{StoreError, SyncError};
use crate::remote::{BlobEncoding, NewTreeEntry, RemoteRepository};
use crate::state::FileStates;
use crate::store::{read_content, LocalStore};
use crate::sync::ref_wait::{wait_for_ref, RefWaitPolicy};
use crate::types::{ObjectId, RepoPath};
use futures::future::try_join_all;
use tracing::{debug, info, warn};

/// Builds a tree from push actions, commits it and moves the branch.
pub struct PushExecutor<'a> {
    store: &'a dyn LocalStore,
    remote: &'a dyn RemoteRepository,
    text_extensions: &'a TextExtensions,
    commit_message: &'a str,
    ref_wait: &'a RefWaitPolicy,
}

impl<'a> PushExecutor<'a> {
    pub fn new(
        store: &'a dyn LocalStore,
        remote: &'a dyn RemoteRepository,
        text_extensions: &'a TextExtensions,
        commit_message: &'a str,
        ref_wait: &'a RefWaitPolicy,
    ) -> Self {
        Self {
            store,
            remote,
            text_extensions,
            commit_message,
            ref_wait,
        }
    }

    /// Push new, updated and deleted paths on top of `remote_head`.
    ///
    /// The branch is updated without force, so history that moved since
    /// `remote_head` was read makes the push fail instead of being overwritten.
    /// Returns the new commit id once the branch reports it.
    pub async fn push(
        &self,
        diff: &DiffResult,
        states: &FileStates,
        remote_head: Option<&str>,
        branch: &str,
    ) -> Result<ObjectId, SyncError> {
        let mut entries = self.upload_entries(diff, states).await?;
        entries.extend(diff.push_delete.iter().map(NewTreeEntry::delete));

        if entries.is_empty() {
            if let Some(head) = remote_head {
                info!(branch, "Nothing left to push");
                return Ok(head.to_string());
            }
        }

        let base_tree = match remote_head {
            Some(head) => Some(self.remote.commit_tree(head).await?),
            None => None,
        };
        let tree = self
            .remote
            .create_tree(&entries, base_tree.as_deref())
            .await?;
        let commit = self
            .remote
            .create_commit(&tree, remote_head, self.commit_message)
            .await?;
        debug!(commit = %commit, tree = %tree, entries = entries.len(), "Created commit");

        match remote_head {
            Some(_) => self.remote.update_ref(branch, &commit).await?,
            None => self.remote.create_ref(branch, &commit).await?,
        }
        wait_for_ref(self.remote, branch, &commit, self.ref_wait).await?;

        info!(
            branch,
            commit = %commit,
            new = diff.push_new.len(),
            updated = diff.push_update.len(),
            deleted = diff.push_delete.len(),
            "Push complete"
        );
        Ok(commit)
    }

    /// Tree entries for new and updated paths. Text goes inline; binary content
    /// is uploaded as a blob first and referenced by id.
    async fn upload_entries(
        &self,
        diff: &DiffResult,
        states: &FileStates,
    ) -> Result<Vec<NewTreeEntry>, SyncError> {
        let paths = diff.push_new.iter().chain(diff.push_update.iter());
        let entries = try_join_all(paths.map(|path| self.entry_for(path, states))).await?;
        Ok(entries.into_iter().flatten().collect())
    }

    async fn entry_for(
        &self,
        path: &RepoPath,
        states: &FileStates,
    ) -> Result<Option<NewTreeEntry>, SyncError> {
        let cached = states.get(path).and_then(|s| s.content.clone());
        let content = match cached {
            Some(content) => content,
            None => match read_content(self.store, path, self.text_extensions).await {
                Ok(content) => content,
                Err(StoreError::NotFound(_)) => {
                    warn!(path = %path, "Local file disappeared before push; skipping");
                    return Ok(None);
                }
                Err(err) => return Err(err.into()),
            },
        };

        let entry = match content {
            FileContent::Text(text) => NewTreeEntry::inline(path.as_str(), text),
            FileContent::Binary(_) => {
                let sha = self
                    .remote
                    .create_blob(&content.to_base64(), BlobEncoding::Base64)
                    .await?;
                debug!(path = %path, sha = %sha, "Uploaded binary blob");
                NewTreeEntry::blob(path.as_str(), sha)
            }
        };
        Ok(Some(entry))
    }
}
