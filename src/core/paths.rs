// src/core/paths.rs

use crate::constants::{
    COMMAND_INDEX_FILENAME, COMMANDS_DIR, CONFIG_DIR_ENV, CONFIG_DIR_NAME, CONFIG_FILENAME,
    LOCAL_ROOT_DIR,
};
use crate::models::TroupeConfig;
use anyhow::{Result, anyhow};
use lazy_static::lazy_static;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

lazy_static! {
    static ref TROUPE_CONFIG_DIR: Mutex<Option<PathBuf>> = Mutex::new(None);
}

#[derive(Error, Debug)]
pub enum PathError {
    #[error("Could not find system config directory.")]
    ConfigDirNotFound,
    #[error("Could not create config directory at '{path}': {source}")]
    ConfigDirCreation {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Returns the path to the troupe configuration directory (`~/.config/troupe`),
/// or `$TROUPE_CONFIG_DIR` when set. Creates it if it doesn't exist.
///
/// This function is memoized: the first call computes and caches the path,
/// subsequent calls return the cached value instantly.
pub fn get_config_dir() -> Result<PathBuf, PathError> {
    let mut cached_path_guard = TROUPE_CONFIG_DIR
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    if let Some(path) = &*cached_path_guard {
        return Ok(path.clone());
    }

    let config_path = match std::env::var_os(CONFIG_DIR_ENV) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => dirs::config_dir()
            .ok_or(PathError::ConfigDirNotFound)?
            .join(CONFIG_DIR_NAME),
    };

    if !config_path.exists() {
        fs::create_dir_all(&config_path).map_err(|e| PathError::ConfigDirCreation {
            path: config_path.display().to_string(),
            source: e,
        })?;
    }

    *cached_path_guard = Some(config_path.clone());
    Ok(config_path)
}

/// Returns the path to `troupe.toml` inside the config directory.
pub fn get_config_file_path() -> Result<PathBuf, PathError> {
    get_config_dir().map(|dir| dir.join(CONFIG_FILENAME))
}

/// Returns the path to the persisted command index.
pub fn get_index_path() -> Result<PathBuf, PathError> {
    get_config_dir().map(|dir| dir.join(COMMAND_INDEX_FILENAME))
}

/// Expands `~` and environment variables in a configured path.
pub fn expand_path(template: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(template)
        .map_err(|e| anyhow!("Failed to expand path '{}': {}", template, e))?;
    Ok(PathBuf::from(expanded.into_owned()))
}

/// Directory holding global command files: `commands_dir` from the config,
/// or `<config_dir>/commands`.
pub fn resolve_commands_dir(config: &TroupeConfig, config_dir: &Path) -> Result<PathBuf> {
    match &config.commands_dir {
        Some(template) => expand_path(template),
        None => Ok(config_dir.join(COMMANDS_DIR)),
    }
}

/// The user-local root: `local_root` from the config (relative paths are taken
/// from `cwd`), or `<cwd>/.troupe`. Canonicalized when it exists so it compares
/// equal to the directories libraries resolve to.
pub fn resolve_local_root(config: &TroupeConfig, cwd: &Path) -> Result<PathBuf> {
    let root = match &config.local_root {
        Some(template) => {
            let expanded = expand_path(template)?;
            if expanded.is_absolute() {
                expanded
            } else {
                cwd.join(expanded)
            }
        }
        None => cwd.join(LOCAL_ROOT_DIR),
    };

    if root.exists() {
        Ok(dunce::canonicalize(&root)?)
    } else {
        Ok(root)
    }
}
