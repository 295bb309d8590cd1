// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{RawRunConfig, RunConfig};
use crate::errors::Result;

/// Read and deserialize a config file without semantic validation.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawRunConfig> {
    let contents = fs::read_to_string(path.as_ref())?;
    let config: RawRunConfig = toml::from_str(&contents)?;
    Ok(config)
}

/// Read, deserialize and validate a config file.
///
/// Relative paths inside the file are resolved against the current
/// directory, not the file's location.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<RunConfig> {
    let raw = load_from_path(&path)?;
    RunConfig::try_from(raw)
}

/// `Stagehand.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Stagehand.toml")
}
