// src/lib.rs

pub mod catalog;
pub mod cli;
pub mod commands;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod pipe;
pub mod service;
pub mod storage;
pub mod tables;
pub mod types;

use anyhow::Result;
use tracing::debug;

use crate::cli::CliArgs;
use crate::config::loader::resolve_config_path;

pub use crate::errors::DataChefError;
pub use crate::service::PipeService;

/// High-level entry point used by `main.rs`.
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = resolve_config_path(args.config.as_deref());
    debug!(config = %config_path.display(), "resolved config path");
    commands::dispatch(args.command, config_path).await
}
