//! Persisted sync base
//!
//! The only state carried between runs is the commit last known to be in sync.
//! It lives outside the workspace, in `state.json` under the workspace data
//! directory, tagged with the target it belongs to so that pointing the
//! workspace at another repository or branch starts from an empty base.

use crate::config::{workspace_data_dir, SyncConfig};
use crate::error::SyncError;
use crate::types::ObjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const STATE_FILE_NAME: &str = "state.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStateFile {
    pub owner: String,
    pub repository: String,
    pub branch: String,
    pub base_commit: Option<ObjectId>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl SyncStateFile {
    pub fn new(config: &SyncConfig, base_commit: Option<ObjectId>) -> Self {
        let (owner, repository, branch) = config.target();
        Self {
            owner: owner.to_string(),
            repository: repository.to_string(),
            branch: branch.to_string(),
            base_commit,
            updated_at: Some(Utc::now()),
        }
    }

    /// `state.json` in the data directory of `workspace_root`.
    pub fn path_for_workspace(workspace_root: &Path) -> Result<PathBuf, SyncError> {
        Ok(workspace_data_dir(workspace_root)?.join(STATE_FILE_NAME))
    }

    /// Read the state file. A missing file is `Ok(None)`.
    pub fn load(path: &Path) -> Result<Option<Self>, SyncError> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(state_error(path, e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| state_error(path, e))
    }

    /// Write the state file, replacing any previous one atomically.
    pub fn save(&self, path: &Path) -> Result<(), SyncError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| state_error(parent, e))?;
        }
        let json = serde_json::to_vec_pretty(self).map_err(|e| state_error(path, e))?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| state_error(&tmp, e))?;
        std::fs::rename(&tmp, path).map_err(|e| state_error(path, e))?;
        debug!(path = %path.display(), base = self.base_commit.as_deref().unwrap_or("-"), "Saved sync state");
        Ok(())
    }

    pub fn matches(&self, config: &SyncConfig) -> bool {
        let (owner, repository, branch) = config.target();
        self.owner == owner && self.repository == repository && self.branch == branch
    }
}

/// Stored base commit for `config`'s target, if any.
pub fn load_base_for(path: &Path, config: &SyncConfig) -> Result<Option<ObjectId>, SyncError> {
    match SyncStateFile::load(path)? {
        Some(state) if state.matches(config) => Ok(state.base_commit),
        Some(state) => {
            info!(
                previous = %format!("{}/{}@{}", state.owner, state.repository, state.branch),
                "Sync target changed; starting without a base commit"
            );
            Ok(None)
        }
        None => Ok(None),
    }
}

fn state_error(path: &Path, err: impl std::fmt::Display) -> SyncError {
    SyncError::StateFile {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}
