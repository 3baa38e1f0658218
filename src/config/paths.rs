//! XDG base directories for user config and per-workspace state.

use crate::error::SyncError;
use std::path::{Component, Path, PathBuf};

const APP_DIR: &str = "notesync";

/// `$XDG_DATA_HOME`, or `$HOME/.local/share`.
pub fn data_home() -> Option<PathBuf> {
    if let Ok(xdg_data_home) = std::env::var("XDG_DATA_HOME") {
        if !xdg_data_home.is_empty() {
            return Some(PathBuf::from(xdg_data_home));
        }
    }
    std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".local").join("share"))
}

/// `$XDG_CONFIG_HOME`, or `$HOME/.config`.
pub fn config_home() -> Result<PathBuf, SyncError> {
    if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg_config_home.is_empty() {
            return Ok(PathBuf::from(xdg_config_home));
        }
    }
    let home = std::env::var("HOME").map_err(|_| {
        SyncError::ConfigError(
            "Could not determine XDG config home directory (HOME not set)".to_string(),
        )
    })?;
    Ok(PathBuf::from(home).join(".config"))
}

/// User-wide config file: `$XDG_CONFIG_HOME/notesync/config.toml`.
pub fn global_config_path() -> Result<PathBuf, SyncError> {
    Ok(config_home()?.join(APP_DIR).join("config.toml"))
}

/// State directory of one workspace: `$XDG_DATA_HOME/notesync/<canonical path>/`.
///
/// `/home/me/notes` maps to `$XDG_DATA_HOME/notesync/home/me/notes/`, so the
/// synced directory itself holds no tool state.
pub fn workspace_data_dir(workspace_root: &Path) -> Result<PathBuf, SyncError> {
    let data_home = data_home().ok_or_else(|| {
        SyncError::ConfigError(
            "Could not determine XDG data home directory (HOME not set)".to_string(),
        )
    })?;
    let canonical = workspace_root.canonicalize().map_err(|e| {
        SyncError::ConfigError(format!(
            "Failed to canonicalize workspace path {}: {}",
            workspace_root.display(),
            e
        ))
    })?;
    Ok(join_normal_components(data_home.join(APP_DIR), &canonical))
}

/// Append the normal components of `path` to `base`, dropping root and prefix.
pub fn join_normal_components(base: PathBuf, path: &Path) -> PathBuf {
    path.components().fold(base, |acc, component| match component {
        Component::Normal(name) => acc.join(name),
        Component::RootDir | Component::Prefix(_) | Component::CurDir | Component::ParentDir => acc,
    })
}
