//! Command-line interface
//!
//! Workspace-scoped commands. The workspace root is the local store; the
//! sync base is kept outside it, in the workspace data directory.

use crate::config::{ConfigLoader, SyncConfig};
use crate::diff::DiffAction;
use crate::error::SyncError;
use crate::hash::compute_blob_id;
use crate::logging::LoggingConfig;
use crate::persist::{load_base_for, SyncStateFile};
use crate::remote::{GitHubRemote, RemoteRepository};
use crate::store::FsLocalStore;
use crate::sync::{SyncOrchestrator, SyncPlan};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::info;

/// Notesync - three-way sync of a local note folder with a Git repository
#[derive(Parser)]
#[command(name = "notesync", version)]
#[command(about = "Synchronize a local folder with a remote Git branch")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory (the folder being synced)
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Pull remote changes, push local changes, and record the new base
    Sync,
    /// Show what a sync would do without changing anything
    Diff {
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Validate configuration and check that the repository is reachable
    Check,
    /// Print the Git blob id of a file
    Hash {
        file: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl Cli {
    /// Logging config with command-line flags applied on top of `base`.
    pub fn logging_config(&self, base: &LoggingConfig) -> LoggingConfig {
        let mut config = base.clone();
        if let Some(level) = &self.log_level {
            config.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.format = format.clone();
        }
        if let Some(output) = &self.log_output {
            config.output = output.clone();
        }
        if let Some(file) = &self.log_file {
            config.file = Some(file.clone());
        }
        config
    }
}

/// Loaded configuration and paths for one invocation.
pub struct CliContext {
    workspace_root: PathBuf,
    config: SyncConfig,
}

impl CliContext {
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, SyncError> {
        let config = match &config_path {
            Some(path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        Ok(Self {
            workspace_root,
            config,
        })
    }

    pub fn from_parts(workspace_root: PathBuf, config: SyncConfig) -> Self {
        Self {
            workspace_root,
            config,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Run a command to completion on a fresh runtime.
    pub fn execute(&self, command: &Commands) -> Result<String, SyncError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| SyncError::ConfigError(format!("Failed to start async runtime: {}", e)))?;
        runtime.block_on(self.execute_async(command))
    }

    pub async fn execute_async(&self, command: &Commands) -> Result<String, SyncError> {
        match command {
            Commands::Hash { file } => hash_file(file),
            Commands::Check => {
                self.config.validate()?;
                let remote = GitHubRemote::from_config(&self.config)?;
                self.check(&remote).await
            }
            Commands::Diff { format } => {
                self.config.validate()?;
                let remote = GitHubRemote::from_config(&self.config)?;
                self.diff(&remote, *format).await
            }
            Commands::Sync => {
                self.config.validate()?;
                let remote = GitHubRemote::from_config(&self.config)?;
                self.sync(&remote).await
            }
        }
    }

    fn store(&self) -> FsLocalStore {
        FsLocalStore::new(&self.workspace_root)
    }

    fn state_path(&self) -> Result<PathBuf, SyncError> {
        SyncStateFile::path_for_workspace(&self.workspace_root)
    }

    pub async fn check(&self, remote: &dyn RemoteRepository) -> Result<String, SyncError> {
        remote.check_repository().await?;
        let (owner, repository, branch) = self.config.target();
        let head = remote.head_commit(branch).await?;
        let head_line = match head {
            Some(head) => format!("Branch {} at {}", branch, head),
            None => format!("Branch {} has no commits; the first sync will create it", branch),
        };
        let base = load_base_for(&self.state_path()?, &self.config)?;
        Ok(format!(
            "Repository {}/{} is reachable\n{}\nStored base: {}",
            owner,
            repository,
            head_line,
            base.as_deref().unwrap_or("none")
        ))
    }

    pub async fn diff(
        &self,
        remote: &dyn RemoteRepository,
        format: OutputFormat,
    ) -> Result<String, SyncError> {
        let store = self.store();
        let base = load_base_for(&self.state_path()?, &self.config)?;
        let plan = SyncOrchestrator::new(&self.config, &store, remote)
            .plan(base.as_deref())
            .await?;
        Ok(match format {
            OutputFormat::Text => format_plan_text(&plan, base.as_deref()),
            OutputFormat::Json => {
                let value = json!({
                    "base_commit": base,
                    "remote_head": plan.remote_head,
                    "diff": plan.diff,
                });
                serde_json::to_string_pretty(&value)
                    .map_err(|e| SyncError::ConfigError(format!("Failed to render JSON: {}", e)))?
            }
        })
    }

    /// Run a sync and persist the new base on success.
    pub async fn sync(&self, remote: &dyn RemoteRepository) -> Result<String, SyncError> {
        let store = self.store();
        let state_path = self.state_path()?;
        let base = load_base_for(&state_path, &self.config)?;

        let result = SyncOrchestrator::new(&self.config, &store, remote)
            .sync(base.as_deref())
            .await;
        let output = result.messages.join("\n");
        if !result.success {
            return Err(SyncError::Aborted(output));
        }

        SyncStateFile::new(&self.config, result.base_commit.clone()).save(&state_path)?;
        info!(
            state = %state_path.display(),
            base = result.base_commit.as_deref().unwrap_or("-"),
            "Recorded sync base"
        );
        Ok(output)
    }
}

fn hash_file(file: &Path) -> Result<String, SyncError> {
    let bytes = std::fs::read(file).map_err(|e| crate::error::StoreError::io(file.display().to_string(), e))?;
    Ok(format!("{}  {}", compute_blob_id(&bytes), file.display()))
}

fn format_plan_text(plan: &SyncPlan, base: Option<&str>) -> String {
    let mut lines = vec![
        format!("Base:   {}", base.unwrap_or("none")),
        format!(
            "Remote: {}",
            plan.remote_head.as_deref().unwrap_or("none (branch is empty)")
        ),
    ];
    if plan.diff.is_empty() {
        lines.push("Everything is in sync".to_string());
        return lines.join("\n");
    }
    for action in DiffAction::ALL {
        for path in plan.diff.set(action) {
            lines.push(format!("{:<12} {}", action.label(), path));
        }
    }
    lines.push(format!(
        "{} to pull, {} to push, {} conflicts",
        plan.diff.pull_count(),
        plan.diff.push_count(),
        plan.diff.conflict_count()
    ));
    lines.join("\n")
}
