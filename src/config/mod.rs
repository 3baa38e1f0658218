//! Configuration
//!
//! One immutable [`SyncConfig`] value is loaded per invocation and handed to
//! every component. Sources are layered by [`ConfigLoader`]: built-in
//! defaults, the user config file, the workspace file, then `NOTESYNC__*`
//! environment variables.

pub mod loader;
pub mod paths;
pub mod sources;

pub use loader::ConfigLoader;
pub use paths::{config_home, data_home, join_normal_components, workspace_data_dir};

use crate::content::{TextExtensions, DEFAULT_TEXT_EXTENSIONS};
use crate::error::SyncError;
use crate::logging::LoggingConfig;
use crate::sync::RefWaitPolicy;
use serde::{Deserialize, Serialize};

/// Everything a sync run needs to know about its target and behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Repository owner (user or organization)
    pub owner: String,
    pub repository: String,
    pub branch: String,
    /// Personal access token; falls back to `GITHUB_TOKEN` when empty
    #[serde(skip_serializing)]
    pub access_token: String,
    pub api_base_url: String,
    pub commit_message: String,
    /// Store path of the conflict checklist
    pub conflict_file: String,
    /// File created by the placeholder commit on an empty branch
    pub placeholder_path: String,
    pub placeholder_content: String,
    /// Extensions read and written as UTF-8 text; everything else is binary
    pub text_extensions: Vec<String>,
    pub ref_wait: RefWaitPolicy,
    pub logging: LoggingConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            owner: String::new(),
            repository: String::new(),
            branch: "main".to_string(),
            access_token: String::new(),
            api_base_url: "https://api.github.com".to_string(),
            commit_message: "Sync".to_string(),
            conflict_file: "CONFLICTS.md".to_string(),
            placeholder_path: "README.md".to_string(),
            placeholder_content: "Initialized".to_string(),
            text_extensions: DEFAULT_TEXT_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            ref_wait: RefWaitPolicy::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl SyncConfig {
    pub fn text_extensions(&self) -> TextExtensions {
        TextExtensions::new(&self.text_extensions)
    }

    /// `(owner, repository, branch)` identifying the sync target.
    pub fn target(&self) -> (&str, &str, &str) {
        (&self.owner, &self.repository, &self.branch)
    }

    /// Fill the token from `GITHUB_TOKEN` if none was configured.
    pub fn with_env_token(mut self) -> Self {
        if self.access_token.trim().is_empty() {
            if let Ok(token) = std::env::var("GITHUB_TOKEN") {
                self.access_token = token;
            }
        }
        self
    }

    /// Reject configurations a sync run cannot start with.
    pub fn validate(&self) -> Result<(), SyncError> {
        let required = [
            ("owner", &self.owner),
            ("repository", &self.repository),
            ("branch", &self.branch),
            ("access_token", &self.access_token),
            ("placeholder_path", &self.placeholder_path),
            ("conflict_file", &self.conflict_file),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(SyncError::ConfigError(format!(
                "Missing required settings: {}",
                missing.join(", ")
            )));
        }

        if !(self.api_base_url.starts_with("https://") || self.api_base_url.starts_with("http://")) {
            return Err(SyncError::ConfigError(format!(
                "api_base_url must be an http(s) URL, got {}",
                self.api_base_url
            )));
        }
        if self.ref_wait.multiplier <= 0.0 || !self.ref_wait.multiplier.is_finite() {
            return Err(SyncError::ConfigError(format!(
                "ref_wait.multiplier must be positive, got {}",
                self.ref_wait.multiplier
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> SyncConfig {
        SyncConfig {
            owner: "me".to_string(),
            repository: "notes".to_string(),
            access_token: "t".to_string(),
            ..SyncConfig::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.branch, "main");
        assert_eq!(config.conflict_file, "CONFLICTS.md");
        assert_eq!(config.placeholder_path, "README.md");
        assert!(config.text_extensions().is_text("a/b.MD"));
        assert!(!config.text_extensions().is_text("a/b.png"));
    }

    #[test]
    fn test_validate_lists_missing_settings() {
        let err = SyncConfig::default().validate().unwrap_err().to_string();
        assert!(err.contains("owner"));
        assert!(err.contains("repository"));
        assert!(err.contains("access_token"));
        assert!(!err.contains("branch"));

        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_url_and_multiplier() {
        let mut config = valid();
        config.api_base_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());

        let mut config = valid();
        config.ref_wait.multiplier = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_target_triple() {
        assert_eq!(valid().target(), ("me", "notes", "main"));
    }
}
