// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

use crate::engine::EngineError;
use crate::pipe::extract::ExtractionError;
use crate::pipe::validate::ValidationError;

#[derive(Error, Debug)]
pub enum DataChefError {
    #[error("Validation failed: {}", join_violations(.0))]
    Validation(Vec<ValidationError>),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Catalog error: {0}")]
    Catalog(#[from] rusqlite::Error),

    #[error("Another execution is already running (pipe {pipe_id})")]
    ExecutionBusy { pipe_id: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Timestamp error: {0}")]
    Timestamp(#[from] chrono::ParseError),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("TOML encoding error: {0}")]
    TomlEncodeError(#[from] toml::ser::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(&'static str),
}

impl DataChefError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        DataChefError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DataChefError::NotFound { .. })
    }
}

fn join_violations(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, DataChefError>;
