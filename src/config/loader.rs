// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Load a graph file and return the raw, unvalidated [`RawConfigFile`].
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    let config: RawConfigFile = toml::from_str(&contents)?;
    Ok(config)
}

/// Load a graph file and validate it.
///
/// Checks for:
/// - at least one node,
/// - unknown or self-referencing `after` entries,
/// - cycles,
/// - malformed durations.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// `Dagstream.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Dagstream.toml")
}
