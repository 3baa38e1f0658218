//! Sync run state machine
//!
//! One run walks `ResolveRemoteHead -> (Bootstrap) -> BuildState -> Classify ->
//! (Conflict) -> (Pull) -> (Push) -> Done`. Every failure is caught at the
//! phase boundary and reported in [`SyncResult`]; nothing escapes as an error.

use crate::config::SyncConfig;
use crate::content::TextExtensions;
use crate::diff::{classify, DiffResult};
use crate::error::{RemoteError, RemoteErrorKind, SyncError};
use crate::remote::RemoteRepository;
use crate::state::{FileStates, StateBuilder};
use crate::store::LocalStore;
use crate::sync::conflict::ConflictReporter;
use crate::sync::pull::PullExecutor;
use crate::sync::push::PushExecutor;
use crate::types::ObjectId;
use serde::Serialize;
use tracing::{error, info, warn};

/// Phases of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    ResolveRemoteHead,
    Bootstrap,
    BuildState,
    Classify,
    Conflict,
    Pull,
    Push,
    Done,
}

impl SyncPhase {
    pub fn label(&self) -> &'static str {
        match self {
            SyncPhase::ResolveRemoteHead => "resolve remote head",
            SyncPhase::Bootstrap => "bootstrap",
            SyncPhase::BuildState => "build state",
            SyncPhase::Classify => "classify",
            SyncPhase::Conflict => "conflict",
            SyncPhase::Pull => "pull",
            SyncPhase::Push => "push",
            SyncPhase::Done => "done",
        }
    }
}

/// Outcome of [`SyncOrchestrator::sync`].
#[derive(Debug, Clone, Serialize)]
pub struct SyncResult {
    pub success: bool,
    /// Human-readable status lines, in the order they were produced
    pub messages: Vec<String>,
    /// Base commit the caller should persist. Unchanged on failure.
    pub base_commit: Option<ObjectId>,
    pub failed_phase: Option<SyncPhase>,
    pub diff: Option<DiffResult>,
}

impl SyncResult {
    fn started(base: Option<&str>) -> Self {
        Self {
            success: false,
            messages: Vec::new(),
            base_commit: base.map(str::to_string),
            failed_phase: None,
            diff: None,
        }
    }

    fn fail(&mut self, phase: SyncPhase, messages: impl IntoIterator<Item = String>) {
        self.success = false;
        self.failed_phase = Some(phase);
        self.messages.extend(messages);
    }
}

/// Resolved head, file states and classification, before anything is applied.
#[derive(Debug, Clone)]
pub struct SyncPlan {
    /// `None` only for a dry plan of an empty branch
    pub remote_head: Option<ObjectId>,
    pub states: FileStates,
    pub diff: DiffResult,
    /// The branch was empty and received a placeholder commit during this run
    pub bootstrapped: bool,
}

struct PhaseFailure {
    phase: SyncPhase,
    error: SyncError,
}

trait InPhase<T> {
    fn in_phase(self, phase: SyncPhase) -> Result<T, PhaseFailure>;
}

impl<T, E: Into<SyncError>> InPhase<T> for Result<T, E> {
    fn in_phase(self, phase: SyncPhase) -> Result<T, PhaseFailure> {
        self.map_err(|e| PhaseFailure {
            phase,
            error: e.into(),
        })
    }
}

/// Drives one sync run between a local store and a remote branch.
///
/// Holds no lock: callers must not run two syncs against the same store and
/// branch at once.
pub struct SyncOrchestrator<'a> {
    config: &'a SyncConfig,
    store: &'a dyn LocalStore,
    remote: &'a dyn RemoteRepository,
    text_extensions: TextExtensions,
}

impl<'a> SyncOrchestrator<'a> {
    pub fn new(
        config: &'a SyncConfig,
        store: &'a dyn LocalStore,
        remote: &'a dyn RemoteRepository,
    ) -> Self {
        Self {
            config,
            store,
            remote,
            text_extensions: config.text_extensions(),
        }
    }

    /// Run a full sync from `base`, the commit last known to be in sync.
    pub async fn sync(&self, base: Option<&str>) -> SyncResult {
        let mut result = SyncResult::started(base);
        info!(
            owner = %self.config.owner,
            repository = %self.config.repository,
            branch = %self.config.branch,
            base = base.unwrap_or("-"),
            "Starting sync"
        );

        if let Err(failure) = self.run(base, &mut result).await {
            error!(
                phase = failure.phase.label(),
                error = %failure.error,
                "Sync failed"
            );
            let messages = self.failure_messages(&failure);
            result.fail(failure.phase, messages);
        }
        result
    }

    /// Resolve the head and classify every path without pulling or pushing.
    ///
    /// Nothing is written on either side. An empty branch is not bootstrapped;
    /// every local file then shows up as a push.
    pub async fn plan(&self, base: Option<&str>) -> Result<SyncPlan, SyncError> {
        self.prepare(base, false)
            .await
            .map_err(|failure| failure.error)
    }

    async fn run(&self, base: Option<&str>, result: &mut SyncResult) -> Result<(), PhaseFailure> {
        let plan = self.prepare(base, true).await?;
        let SyncPlan {
            remote_head,
            states,
            diff,
            ..
        } = plan;
        let remote_head = remote_head
            .ok_or_else(|| RemoteError::other("Branch has no head commit"))
            .in_phase(SyncPhase::ResolveRemoteHead)?;
        result.diff = Some(diff.clone());

        if diff.is_empty() {
            info!(head = %remote_head, "Nothing to sync");
            result.success = true;
            result.base_commit = Some(remote_head);
            result.messages.push("No changes since last sync".to_string());
            return Ok(());
        }

        if !diff.conflicts.is_empty() {
            warn!(conflicts = diff.conflicts.len(), "Conflicts detected; aborting");
            ConflictReporter::new(self.store, &self.config.conflict_file)
                .report(&diff.conflicts)
                .await
                .in_phase(SyncPhase::Conflict)?;
            result.fail(
                SyncPhase::Conflict,
                [
                    "Sync Aborted: Conflicts detected".to_string(),
                    format!("Please check {} for more info", self.config.conflict_file),
                ],
            );
            return Ok(());
        }

        if diff.pull_count() > 0 {
            let report = PullExecutor::new(self.store, self.remote, &self.text_extensions)
                .pull(&diff, &states)
                .await
                .in_phase(SyncPhase::Pull)?;
            result.messages.push(format!(
                "Pulled {} new, {} updated, {} deleted",
                report.created.len(),
                report.updated.len(),
                report.deleted.len()
            ));
            if !report.skipped.is_empty() {
                result
                    .messages
                    .push(format!("Skipped {} files during pull", report.skipped.len()));
            }
        }

        let mut new_base = remote_head.clone();
        if diff.push_count() > 0 {
            new_base = PushExecutor::new(
                self.store,
                self.remote,
                &self.text_extensions,
                &self.config.commit_message,
                &self.config.ref_wait,
            )
            .push(&diff, &states, Some(&remote_head), &self.config.branch)
            .await
            .in_phase(SyncPhase::Push)?;
            result.messages.push(format!(
                "Pushed {} new, {} updated, {} deleted",
                diff.push_new.len(),
                diff.push_update.len(),
                diff.push_delete.len()
            ));
        }

        info!(base = %new_base, "Sync complete");
        result.success = true;
        result.base_commit = Some(new_base);
        result.messages.insert(0, "Sync: Successful".to_string());
        Ok(())
    }

    async fn prepare(
        &self,
        base: Option<&str>,
        allow_bootstrap: bool,
    ) -> Result<SyncPlan, PhaseFailure> {
        let phase = SyncPhase::ResolveRemoteHead;
        self.remote.check_repository().await.in_phase(phase)?;

        let mut base = base;
        let mut bootstrapped = false;
        let mut remote_head = self
            .remote
            .head_commit(&self.config.branch)
            .await
            .in_phase(phase)?;
        if remote_head.is_none() {
            if let Some(stale) = base {
                warn!(base = stale, "Branch is empty; discarding stored base commit");
                base = None;
            }
            if allow_bootstrap {
                bootstrapped = true;
                remote_head = Some(self.bootstrap().await.in_phase(SyncPhase::Bootstrap)?);
            }
        }

        let states = StateBuilder::new(self.store, self.remote, &self.text_extensions)
            .build(base, remote_head.as_deref())
            .await
            .in_phase(SyncPhase::BuildState)?;

        let mut diff = classify(&states);
        if bootstrapped {
            self.drop_placeholder(&states, &mut diff);
        }
        info!(
            pull = diff.pull_count(),
            push = diff.push_count(),
            conflicts = diff.conflict_count(),
            "Classified paths"
        );

        Ok(SyncPlan {
            remote_head,
            states,
            diff,
            bootstrapped,
        })
    }

    /// Create the placeholder commit on an empty branch and return the new head.
    async fn bootstrap(&self) -> Result<ObjectId, SyncError> {
        info!(
            branch = %self.config.branch,
            path = %self.config.placeholder_path,
            "Branch has no commits; creating placeholder commit"
        );
        self.remote
            .create_initial_commit(
                &self.config.branch,
                &self.config.placeholder_path,
                &self.config.placeholder_content,
                "Initial commit",
            )
            .await?;
        self.remote
            .head_commit(&self.config.branch)
            .await?
            .ok_or_else(|| {
                RemoteError::other(format!(
                    "Branch {} still has no head after the initial commit",
                    self.config.branch
                ))
                .into()
            })
    }

    /// Keep the placeholder out of the local store and off the remote.
    ///
    /// Without a local copy it is queued for deletion once there is local
    /// content to replace it. A local file at the same path wins over the
    /// placeholder.
    fn drop_placeholder(&self, states: &FileStates, diff: &mut DiffResult) {
        let path = self.config.placeholder_path.as_str();
        diff.pull_new.retain(|p| p != path);
        diff.conflicts.retain(|p| p != path);

        let local_id = states.get(path).and_then(|s| s.local_id.as_deref());
        let remote_id = states.get(path).and_then(|s| s.remote_id.as_deref());
        match local_id {
            Some(local) if Some(local) != remote_id => {
                if !diff.push_update.iter().any(|p| p == path) {
                    diff.push_update.push(path.to_string());
                }
            }
            Some(_) => {}
            None => {
                let has_local_files = states.iter().any(|(_, s)| s.local_id.is_some());
                if has_local_files {
                    diff.force_push_delete(path);
                }
            }
        }
    }

    fn failure_messages(&self, failure: &PhaseFailure) -> Vec<String> {
        let detail = failure.error.to_string();
        match (failure.phase, failure.error.remote_kind()) {
            (_, Some(RemoteErrorKind::Authentication)) => vec![
                "Authentication failed: check the access token".to_string(),
                detail,
            ],
            (SyncPhase::ResolveRemoteHead, Some(RemoteErrorKind::NotFound)) => vec![format!(
                "Repository {}/{} does not exist",
                self.config.owner, self.config.repository
            )],
            (SyncPhase::Pull, _) => vec!["Sync Aborted: Pull failed".to_string(), detail],
            (SyncPhase::Push, _) => vec!["Sync Aborted: Push failed".to_string(), detail],
            (phase, _) => vec![format!("Sync Aborted: {} failed", phase.label()), detail],
        }
    }
}
