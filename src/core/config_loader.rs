//! # Config Loader
//!
//! Reads `troupe.toml` from the configuration directory. The file is optional:
//! without it, troupe runs with the defaults (the `text` library loaded on start,
//! commands under `<config_dir>/commands`). The file is only ever read.

use crate::constants::CONFIG_FILENAME;
use crate::models::TroupeConfig;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{}': {source}", path.display())]
    TomlParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Loads `troupe.toml` from `config_dir`. A missing file yields the defaults.
pub fn load_config(config_dir: &Path) -> Result<TroupeConfig, ConfigError> {
    let path = config_dir.join(CONFIG_FILENAME);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::debug!("No config file at '{}', using defaults.", path.display());
            return Ok(TroupeConfig::default());
        }
        Err(e) => return Err(ConfigError::Io { path, source: e }),
    };

    let config: TroupeConfig =
        toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
            path: path.clone(),
            source: e,
        })?;
    log::debug!(
        "Loaded config from '{}': {} libraries, {} packages.",
        path.display(),
        config.libraries.len(),
        config.packages.len()
    );
    Ok(config)
}
