// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{Config, RawConfig};
use crate::errors::Result;

/// Environment variable that overrides the default config location.
pub const CONFIG_ENV_VAR: &str = "SHEPHERD_CONFIG";

/// Load a configuration file from a given path and return the raw `RawConfig`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let mut config: RawConfig = toml::from_str(&contents)?;
    config.base_dir = Some(config_root_dir(path));

    Ok(config)
}

/// Load a configuration file from path and run validation.
///
/// Relative paths inside the file (`workdir`, `logs.dir`, `env.file`) are
/// resolved against the directory holding the config file, so cron jobs do
/// not depend on the working directory they happen to start in.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Config> {
    let raw_config = load_from_path(&path)?;
    let config = Config::try_from(raw_config)?;
    Ok(config)
}

/// Resolve the config path: explicit flag, then `SHEPHERD_CONFIG`, then
/// `Shepherd.toml` in the current working directory.
pub fn resolve_config_path(explicit: Option<&str>) -> PathBuf {
    if let Some(path) = explicit {
        return PathBuf::from(path);
    }
    match std::env::var(CONFIG_ENV_VAR) {
        Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
        _ => default_config_path(),
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("Shepherd.toml")
}

/// - "deploy/Shepherd.toml" → "deploy"
/// - "Shepherd.toml" (parent = "") → current working directory
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}
