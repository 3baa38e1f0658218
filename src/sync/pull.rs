//! Apply remote-side changes to the local store.

use crate::content::{FileContent, TextExtensions};
use crate::diff::DiffResult;
use crate::error::SyncError;
use crate::remote::RemoteRepository;
use crate::state::FileStates;
use crate::store::{parent_dir, LocalStore};
use crate::types::RepoPath;
use futures::future::try_join_all;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Outcome of a pull phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullReport {
    pub created: Vec<RepoPath>,
    pub updated: Vec<RepoPath>,
    pub deleted: Vec<RepoPath>,
    /// Paths left alone: no remote id, or an update target that vanished locally
    pub skipped: Vec<RepoPath>,
}

impl PullReport {
    pub fn applied(&self) -> usize {
        self.created.len() + self.updated.len() + self.deleted.len()
    }
}

/// Pulls new, updated and deleted files from the remote.
pub struct PullExecutor<'a> {
    store: &'a dyn LocalStore,
    remote: &'a dyn RemoteRepository,
    text_extensions: &'a TextExtensions,
}

impl<'a> PullExecutor<'a> {
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

    /// Fetch every needed blob first, then write new files, overwrite updated
    /// ones and delete removed ones, in that order.
    ///
    /// A failed fetch aborts before anything is written. A failed write aborts
    /// the rest of the phase; files already written stay.
    pub async fn pull(
        &self,
        diff: &DiffResult,
        states: &FileStates,
    ) -> Result<PullReport, SyncError> {
        let mut report = PullReport::default();
        let mut fetched = self
            .fetch_remote_files(diff.pull_new.iter().chain(diff.pull_update.iter()), states, &mut report)
            .await?;

        for path in &diff.pull_new {
            let Some(content) = fetched.remove(path.as_str()) else {
                continue;
            };
            if let Some(parent) = parent_dir(path) {
                self.store.create_dir_all(parent).await?;
            }
            self.store.write(path, &content).await?;
            debug!(path = %path, "Created local file from remote");
            report.created.push(path.clone());
        }

        for path in &diff.pull_update {
            let Some(content) = fetched.remove(path.as_str()) else {
                continue;
            };
            if !self.store.exists(path).await? {
                warn!(path = %path, "Local file disappeared before update; skipping");
                report.skipped.push(path.clone());
                continue;
            }
            self.store.write(path, &content).await?;
            debug!(path = %path, "Updated local file from remote");
            report.updated.push(path.clone());
        }

        for path in &diff.pull_delete {
            self.store.delete(path).await?;
            debug!(path = %path, "Deleted local file removed on remote");
            report.deleted.push(path.clone());
        }

        info!(
            created = report.created.len(),
            updated = report.updated.len(),
            deleted = report.deleted.len(),
            skipped = report.skipped.len(),
            "Pull complete"
        );
        Ok(report)
    }

    async fn fetch_remote_files<'p>(
        &self,
        paths: impl Iterator<Item = &'p RepoPath>,
        states: &FileStates,
        report: &mut PullReport,
    ) -> Result<HashMap<&'p str, FileContent>, SyncError> {
        let mut wanted = Vec::new();
        for path in paths {
            match states.get(path).and_then(|s| s.remote_id.as_deref()) {
                Some(sha) => wanted.push((path.as_str(), sha)),
                None => {
                    warn!(path = %path, "No remote id for pulled path; skipping");
                    report.skipped.push(path.clone());
                }
            }
        }

        let files = try_join_all(wanted.into_iter().map(|(path, sha)| async move {
            let encoded = self.remote.get_blob(sha).await?;
            let content =
                FileContent::from_base64(path, &encoded, self.text_extensions.is_text(path))?;
            Ok::<_, SyncError>((path, content))
        }))
        .await?;

        Ok(files.into_iter().collect())
    }
}
