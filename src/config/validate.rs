// src/config/validate.rs

use crate::config::model::{AppConfig, StorageKind};
use crate::errors::{DataChefError, Result};

/// Semantic checks that serde defaults cannot express.
pub fn validate_config(cfg: &AppConfig) -> Result<()> {
    validate_storage(cfg)?;
    validate_engine(cfg)?;
    validate_iceberg(cfg)?;
    validate_upload(cfg)?;
    Ok(())
}

fn validate_storage(cfg: &AppConfig) -> Result<()> {
    let storage = &cfg.storage;
    if storage.kind != StorageKind::S3 {
        return Ok(());
    }

    if storage.endpoint.trim().is_empty() {
        return Err(DataChefError::ConfigError(
            "[storage].endpoint must not be empty".to_string(),
        ));
    }
    if storage.port == 0 {
        return Err(DataChefError::ConfigError(
            "[storage].port must be >= 1 (got 0)".to_string(),
        ));
    }
    if storage.bucket.trim().is_empty() {
        return Err(DataChefError::ConfigError(
            "[storage].bucket must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_engine(cfg: &AppConfig) -> Result<()> {
    let engine = &cfg.engine;
    if engine.program.is_none() && engine.jar_path.as_os_str().is_empty() {
        return Err(DataChefError::ConfigError(
            "[engine] needs either `program` or `jar_path`".to_string(),
        ));
    }
    if engine.master_url.trim().is_empty() {
        return Err(DataChefError::ConfigError(
            "[engine].master_url must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_iceberg(cfg: &AppConfig) -> Result<()> {
    if cfg.iceberg.catalog.trim().is_empty() {
        return Err(DataChefError::ConfigError(
            "[iceberg].catalog must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_upload(cfg: &AppConfig) -> Result<()> {
    if cfg.upload.max_files == 0 || cfg.upload.max_file_bytes == 0 {
        return Err(DataChefError::ConfigError(
            "[upload] limits must be >= 1".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        validate_config(&AppConfig::default()).unwrap();
    }

    #[test]
    fn empty_bucket_is_rejected_for_s3_only() {
        let mut cfg = AppConfig::default();
        cfg.storage.bucket.clear();
        assert!(validate_config(&cfg).is_err());

        cfg.storage.kind = StorageKind::Memory;
        assert!(validate_config(&cfg).is_ok());
    }
}
