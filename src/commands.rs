// src/commands.rs

//! Subcommand handlers. Results are printed to stdout as JSON; logs go to
//! stderr through `tracing`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use bytes::Bytes;
use futures::StreamExt;
use serde::Serialize;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::cli::{Command, ConfigCommand, PipesCommand, SpecInput, StorageCommand, TablesCommand};
use crate::config::ConfigHandle;
use crate::config::loader::{load_and_validate, load_or_default, save};
use crate::config::model::AppConfig;
use crate::engine::LogSink;
use crate::pipe::model::{PipePatch, PipeSpec};
use crate::service::{PipeService, UploadFile};
use crate::types::{DeleteKind, DeleteOutcome, ExecutionLog};

pub async fn dispatch(command: Command, config_path: PathBuf) -> Result<()> {
    match command {
        Command::Config(cmd) => config_command(cmd, &config_path),
        Command::Pipes(cmd) => pipes_command(&open_service(config_path)?, cmd).await,
        Command::Run { pipe_id, source } => {
            run_pipe(&open_service(config_path)?, &pipe_id, source.as_deref()).await
        }
        Command::History { pipe, limit } => {
            print_json(&open_service(config_path)?.history(pipe.as_deref(), limit)?)
        }
        Command::Storage(cmd) => storage_command(&open_service(config_path)?, cmd).await,
        Command::Tables(cmd) => tables_command(&open_service(config_path)?, cmd).await,
    }
}

fn open_service(config_path: PathBuf) -> Result<PipeService> {
    let cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let handle = ConfigHandle::new(cfg, config_path);
    Ok(PipeService::from_config(handle)?)
}

async fn pipes_command(service: &PipeService, cmd: PipesCommand) -> Result<()> {
    match cmd {
        PipesCommand::List => print_json(&service.list_pipes()?),
        PipesCommand::Get { id } => print_json(&service.get_pipe(&id)?),
        PipesCommand::Create(input) => {
            let spec: PipeSpec = read_json(&input)?;
            print_json(&service.create_pipe(spec).await?)
        }
        PipesCommand::Update { id, input } => {
            let patch: PipePatch = read_json(&input)?;
            if patch.is_empty() {
                bail!("the update contains no fields");
            }
            print_json(&service.update_pipe(&id, patch).await?)
        }
        PipesCommand::Delete { id } => {
            let outcome = service.delete_pipe(&id).await?;
            if let DeleteOutcome::DeletedWithWarning(w) = &outcome {
                warn!(pipe_id = %id, warning = %w, "pipe deleted, folder kept");
            }
            print_json(&json!({ "deleted": true, "warning": outcome.warning() }))
        }
        PipesCommand::Check(input) => {
            let spec: PipeSpec = read_json(&input)?;
            let violations = service.check_pipe(&spec);
            print_json(&json!({ "valid": violations.is_empty(), "errors": violations }))?;
            if !violations.is_empty() {
                bail!("pipe spec has {} validation error(s)", violations.len());
            }
            Ok(())
        }
        PipesCommand::Seed => print_json(&service.seed_default_pipes().await?),
        PipesCommand::Preview { id, object, limit } => {
            print_json(&service.preview_records(&id, &object, limit).await?)
        }
    }
}

/// Stream the execution log to stderr while the engine runs; Ctrl-C cancels.
async fn run_pipe(service: &PipeService, pipe_id: &str, source: Option<&str>) -> Result<()> {
    let (sink, mut rx) = LogSink::channel();
    let printer = tokio::spawn(async move {
        while let Some(entry) = rx.recv().await {
            eprintln!("{}", format_log(&entry));
        }
    });

    let canceller = {
        let service = service.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() && service.cancel_execution() {
                info!("cancellation requested");
            }
        })
    };

    let outcome = service.execute(pipe_id, source, sink).await;
    canceller.abort();
    let _ = printer.await;

    let outcome = outcome?;
    print_json(&json!({
        "executionId": outcome.execution_id,
        "success": outcome.success,
        "error": outcome.error,
        "result": outcome.result,
    }))?;

    if !outcome.success {
        bail!(
            "execution failed: {}",
            outcome.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

async fn storage_command(service: &PipeService, cmd: StorageCommand) -> Result<()> {
    match cmd {
        StorageCommand::Ls { path } => print_json(&service.list_storage(&path).await?),
        StorageCommand::Mkdir { path } => {
            let key = service.create_folder(&path).await?;
            print_json(&json!({ "created": key }))
        }
        StorageCommand::Upload { path, files } => {
            let mut uploads = Vec::with_capacity(files.len());
            for file in &files {
                uploads.push(read_upload(Path::new(file)).await?);
            }
            let outcome = service.upload(&path, uploads).await?;
            if outcome.pipe_executed {
                info!(path = %path, "waiting for triggered execution");
                service.wait_background().await;
            }
            print_json(&outcome)
        }
        StorageCommand::Rm { path, recursive } => {
            let kind = if recursive {
                DeleteKind::Folder
            } else {
                DeleteKind::File
            };
            let removed = service.delete_storage(&path, kind).await?;
            print_json(&json!({ "removed": removed }))
        }
        StorageCommand::Get { path, output } => {
            let download = service.download(&path).await?;
            let mut stream = download.stream;
            match output {
                Some(out) => {
                    let mut file = tokio::fs::File::create(&out)
                        .await
                        .with_context(|| format!("creating {out}"))?;
                    while let Some(chunk) = stream.next().await {
                        file.write_all(&chunk?).await?;
                    }
                    file.flush().await?;
                    info!(path = %path, output = %out, bytes = download.content_length, "downloaded");
                }
                None => {
                    let mut stdout = tokio::io::stdout();
                    while let Some(chunk) = stream.next().await {
                        stdout.write_all(&chunk?).await?;
                    }
                    stdout.flush().await?;
                }
            }
            Ok(())
        }
    }
}

async fn tables_command(service: &PipeService, cmd: TablesCommand) -> Result<()> {
    match cmd {
        TablesCommand::List => print_json(&service.list_tables().await?),
        TablesCommand::Preview { table, limit } => {
            print_json(&service.preview_table(&table, limit).await?)
        }
        TablesCommand::Query { sql, limit } => print_json(&service.query_tables(&sql, limit).await?),
    }
}

fn config_command(cmd: ConfigCommand, path: &Path) -> Result<()> {
    match cmd {
        ConfigCommand::Show => {
            let cfg = load_or_default(path)?;
            print!("{}", toml::to_string_pretty(&cfg)?);
            Ok(())
        }
        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            save(path, &AppConfig::default())?;
            info!(path = %path.display(), "default configuration written");
            Ok(())
        }
        ConfigCommand::Set { key, value } => {
            let handle = ConfigHandle::new(load_or_default(path)?, path);
            let updated = handle.set(&key, &value)?;
            print!("{}", toml::to_string_pretty(&updated)?);
            Ok(())
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(input: &SpecInput) -> Result<T> {
    let text = if input.file == "-" {
        std::io::read_to_string(std::io::stdin()).context("reading spec from stdin")?
    } else {
        std::fs::read_to_string(&input.file).with_context(|| format!("reading {}", input.file))?
    };
    serde_json::from_str(&text).with_context(|| format!("parsing {}", input.file))
}

async fn read_upload(path: &Path) -> Result<UploadFile> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("{} has no usable file name", path.display()))?
        .to_string();
    let body = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;

    Ok(UploadFile {
        content_type: guess_content_type(&name).map(str::to_string),
        name,
        body: Bytes::from(body),
    })
}

fn guess_content_type(name: &str) -> Option<&'static str> {
    let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "json" => Some("application/json"),
        "jsonl" | "ndjson" => Some("application/x-ndjson"),
        "csv" => Some("text/csv"),
        "txt" | "log" => Some("text/plain"),
        "parquet" => Some("application/vnd.apache.parquet"),
        _ => None,
    }
}

fn format_log(entry: &ExecutionLog) -> String {
    format!(
        "{} [{}] {}",
        entry.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
        entry.level,
        entry.message
    )
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::errors::DataChefError;

    #[test]
    fn invalid_config_is_rejected_before_the_service_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("DataChef.toml");
        std::fs::write(&path, "[storage]\nport = 0\n").unwrap();

        let err = open_service(path).err().expect("invalid config must not open");
        assert!(matches!(
            err.downcast_ref::<DataChefError>(),
            Some(DataChefError::ConfigError(msg)) if msg.contains("port")
        ));
    }

    #[test]
    fn content_types_follow_extension() {
        assert_eq!(guess_content_type("a.JSON"), Some("application/json"));
        assert_eq!(guess_content_type("app.log"), Some("text/plain"));
        assert_eq!(guess_content_type("blob"), None);
    }
}
