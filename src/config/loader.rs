//! Layered config loading.

use crate::config::{sources, SyncConfig};
use config::{Config, ConfigError, File, FileFormat};
use std::path::Path;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load config for a workspace.
    /// Precedence: global file (lowest) -> workspace file -> environment (highest).
    pub fn load(workspace_root: &Path) -> Result<SyncConfig, ConfigError> {
        let builder = Config::builder();
        let builder = sources::global_file(builder)?;
        let builder = sources::workspace_file(builder, workspace_root)?;
        let builder = sources::environment(builder)?;

        let config: SyncConfig = builder.build()?.try_deserialize()?;
        Ok(config.with_env_token())
    }

    /// Load config from one explicit file with the environment overlay.
    pub fn load_from_file(path: &Path) -> Result<SyncConfig, ConfigError> {
        let builder = Config::builder().add_source(File::from(path).format(FileFormat::Toml));
        let builder = sources::environment(builder)?;

        let config: SyncConfig = builder.build()?.try_deserialize()?;
        Ok(config.with_env_token())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::sources::WORKSPACE_CONFIG_FILE;

    #[test]
    fn test_load_from_file_keeps_defaults_for_missing_keys() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
owner = "me"
repository = "notes"
access_token = "secret"

[ref_wait]
timeout_ms = 1000

[logging]
level = "debug"
"#,
        )
        .unwrap();

        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.target(), ("me", "notes", "main"));
        assert_eq!(config.access_token, "secret");
        assert_eq!(config.ref_wait.timeout_ms, 1000);
        assert_eq!(config.ref_wait.initial_delay_ms, 500);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.conflict_file, "CONFLICTS.md");
    }

    #[test]
    fn test_workspace_file_is_read() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(
            temp.path().join(WORKSPACE_CONFIG_FILE),
            "owner = \"team\"\nrepository = \"wiki\"\nbranch = \"notes\"\ntext_extensions = [\"md\", \"org\"]\n",
        )
        .unwrap();

        let config = ConfigLoader::load(temp.path()).unwrap();
        assert_eq!(config.owner, "team");
        assert_eq!(config.branch, "notes");
        assert!(config.text_extensions().is_text("todo.org"));
        assert!(!config.text_extensions().is_text("a.txt"));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        assert!(ConfigLoader::load_from_file(&temp.path().join("nope.toml")).is_err());
    }
}
