// src/config/mod.rs

//! Runtime configuration: TOML model, loading, validation and a shared
//! handle that can be updated while the process runs.

pub mod loader;
pub mod model;
pub mod validate;

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::info;

use crate::errors::{DataChefError, Result};

pub use model::AppConfig;

/// Shared, updatable configuration.
///
/// Readers take a snapshot; [`ConfigHandle::update`] validates the candidate,
/// persists it to the backing file (if any) and only then swaps it in.
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<AppConfig>>,
    path: Option<PathBuf>,
}

impl ConfigHandle {
    pub fn new(config: AppConfig, path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
            path: Some(path.into()),
        }
    }

    /// A handle that never touches the filesystem.
    pub fn in_memory(config: AppConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
            path: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn snapshot(&self) -> AppConfig {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update<F>(&self, f: F) -> Result<AppConfig>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let mut candidate = guard.clone();
        f(&mut candidate);
        validate::validate_config(&candidate)?;

        if let Some(path) = &self.path {
            loader::save(path, &candidate)?;
            info!(path = %path.display(), "configuration saved");
        }

        *guard = candidate.clone();
        Ok(candidate)
    }

    /// Set one dotted key (e.g. `storage.port`) from its TOML literal form.
    /// Values that do not parse as TOML are taken as plain strings.
    pub fn set(&self, key: &str, raw_value: &str) -> Result<AppConfig> {
        let current = self.snapshot();
        let updated = with_override(&current, key, raw_value)?;
        self.update(|cfg| *cfg = updated)
    }
}

fn with_override(config: &AppConfig, key: &str, raw_value: &str) -> Result<AppConfig> {
    let toml::Value::Table(mut root) = toml::Value::try_from(config)? else {
        return Err(DataChefError::ConfigError(
            "configuration did not serialize to a table".to_string(),
        ));
    };

    let mut segments: Vec<&str> = key.split('.').collect();
    let Some(leaf) = segments.pop().filter(|s| !s.is_empty()) else {
        return Err(DataChefError::ConfigError(format!("invalid key '{key}'")));
    };

    let mut table = &mut root;
    for segment in segments {
        table = match table.get_mut(segment) {
            Some(toml::Value::Table(t)) => t,
            _ => {
                return Err(DataChefError::ConfigError(format!(
                    "unknown config section '{segment}' in '{key}'"
                )));
            }
        };
    }

    table.insert(leaf.to_string(), parse_literal(raw_value));

    let updated: AppConfig = toml::Value::Table(root).try_into()?;
    Ok(updated)
}

fn parse_literal(raw: &str) -> toml::Value {
    toml::from_str::<toml::Table>(&format!("v = {raw}"))
        .ok()
        .and_then(|mut t| t.remove("v"))
        .unwrap_or_else(|| toml::Value::String(raw.to_string()))
}
