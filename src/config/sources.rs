//! Config sources, lowest precedence first.

use crate::config::paths;
use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, Environment, File, FileFormat};
use std::path::Path;

/// Name of the per-workspace config file at the workspace root.
pub const WORKSPACE_CONFIG_FILE: &str = ".notesync.toml";

/// `$XDG_CONFIG_HOME/notesync/config.toml`, if present.
pub fn global_file(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    match paths::global_config_path() {
        Ok(path) => Ok(builder.add_source(File::from(path).format(FileFormat::Toml).required(false))),
        Err(_) => Ok(builder),
    }
}

/// `<workspace>/.notesync.toml`, if present.
pub fn workspace_file(
    builder: ConfigBuilder<DefaultState>,
    workspace_root: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let path = workspace_root.join(WORKSPACE_CONFIG_FILE);
    Ok(builder.add_source(File::from(path).format(FileFormat::Toml).required(false)))
}

/// `NOTESYNC__*` variables; `__` separates nested keys, e.g.
/// `NOTESYNC__REF_WAIT__TIMEOUT_MS`.
pub fn environment(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(builder.add_source(
        Environment::with_prefix("NOTESYNC")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("text_extensions")
            .try_parsing(true),
    ))
}
