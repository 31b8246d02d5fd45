// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::AppConfig;
use crate::config::validate::validate_config;
use crate::errors::Result;

pub const CONFIG_ENV: &str = "DATACHEF_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "DataChef.toml";

/// Parse a configuration file. No semantic validation happens here; use
/// [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<AppConfig> {
    let contents = fs::read_to_string(path.as_ref())?;
    let config: AppConfig = toml::from_str(&contents)?;
    Ok(config)
}

/// Like [`load_from_path`], but a missing file yields the defaults.
pub fn load_or_default(path: impl AsRef<Path>) -> Result<AppConfig> {
    let path = path.as_ref();
    if !path.exists() {
        debug!(path = %path.display(), "no config file; using defaults");
        return Ok(AppConfig::default());
    }
    load_from_path(path)
}

/// Load (or default) and validate.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<AppConfig> {
    let config = load_or_default(path)?;
    validate_config(&config)?;
    Ok(config)
}

/// Write the configuration as pretty TOML, creating parent directories.
pub fn save(path: impl AsRef<Path>, config: &AppConfig) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, toml::to_string_pretty(config)?)?;
    Ok(())
}

/// Explicit path, else `DATACHEF_CONFIG`, else `DataChef.toml` in the
/// working directory.
pub fn resolve_config_path(explicit: Option<&str>) -> PathBuf {
    explicit
        .map(PathBuf::from)
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}
