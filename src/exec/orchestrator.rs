// src/exec/orchestrator.rs

//! Binds a pipe and a source path into one engine run.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::slot::{ExecutionSlot, ExecutionStatusReport};
use crate::catalog::{ExecutionCounters, PipeCatalog, PipeExecution};
use crate::config::ConfigHandle;
use crate::engine::protocol::connection_blob;
use crate::engine::{EngineBackend, EngineError, EngineInvocation, LogSink};
use crate::errors::{DataChefError, Result};
use crate::pipe::model::Pipe;
use crate::storage::StorageBridge;
use crate::types::{ExecutionLog, ExecutionStatus, LogLevel};

/// What an execution produced. Engine failures land here, not in `Err`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOutcome {
    pub execution_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    pub logs: Vec<ExecutionLog>,
}

pub struct Orchestrator {
    catalog: Arc<PipeCatalog>,
    storage: StorageBridge,
    engine: Arc<dyn EngineBackend>,
    config: ConfigHandle,
    slot: ExecutionSlot,
}

impl Orchestrator {
    pub fn new(
        catalog: Arc<PipeCatalog>,
        storage: StorageBridge,
        engine: Arc<dyn EngineBackend>,
        config: ConfigHandle,
    ) -> Self {
        Self {
            catalog,
            storage,
            engine,
            config,
            slot: ExecutionSlot::new(),
        }
    }

    pub fn status(&self) -> ExecutionStatusReport {
        self.slot.status()
    }

    pub fn cancel(&self) -> bool {
        self.slot.cancel()
    }

    /// Run `pipe_id` against `source_path` (or the pipe's own folder).
    ///
    /// Unknown pipes and a busy slot are rejected before any work. Everything
    /// after that, engine failures included, is reported in the outcome.
    pub async fn execute(
        &self,
        pipe_id: &str,
        source_path: Option<&str>,
        logs: LogSink,
    ) -> Result<ExecutionOutcome> {
        let pipe = self
            .catalog
            .get(pipe_id)?
            .ok_or_else(|| DataChefError::not_found("pipe", pipe_id))?;

        let source_path = source_path
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(&pipe.spec.storage_path)
            .to_string();

        let blob = self.config_blob(&pipe, &source_path)?;
        let execution_id = Uuid::new_v4().to_string();
        let (guard, cancel) = self.slot.try_acquire(&pipe.id, &execution_id)?;

        let mut record = PipeExecution::start(&execution_id, &pipe, &source_path);
        if let Err(err) = self.catalog.record_execution(&record) {
            warn!(execution_id = %execution_id, error = %err, "failed to record execution start");
        }

        let (collector, mut collected) = LogSink::channel();
        let sink = logs.merged(&collector);
        drop(collector);

        sink.emit(
            LogLevel::Info,
            format!("Starting engine job for pipe: {}", pipe.spec.name),
        );
        sink.emit(LogLevel::Info, format!("Source path: {source_path}"));
        info!(
            pipe_id = %pipe.id,
            execution_id = %execution_id,
            source = %source_path,
            "execution started"
        );

        let invocation = EngineInvocation::new("execute", Vec::new(), blob);
        let result = self.engine.invoke(invocation, sink.clone(), cancel).await;

        let (status, error) = match &result {
            Ok(_) => {
                sink.emit(LogLevel::Info, "Engine job completed successfully");
                (ExecutionStatus::Completed, None)
            }
            Err(EngineError::Cancelled) => {
                sink.emit(LogLevel::Warn, "Engine job was cancelled");
                (ExecutionStatus::Cancelled, Some(EngineError::Cancelled.to_string()))
            }
            Err(err) => {
                sink.emit(LogLevel::Error, format!("Engine job failed: {err}"));
                (ExecutionStatus::Failed, Some(err.to_string()))
            }
        };

        drop(guard);
        drop(sink);

        let mut entries = Vec::new();
        while let Ok(entry) = collected.try_recv() {
            entries.push(entry);
        }

        let result = result.ok();
        let counters = result
            .as_ref()
            .map(ExecutionCounters::from_result)
            .unwrap_or_default();

        record.finish(status, error.clone(), entries.clone(), counters);
        if let Err(err) = self.catalog.record_execution(&record) {
            warn!(execution_id = %execution_id, error = %err, "failed to record execution result");
        }

        match &error {
            None => info!(pipe_id = %pipe.id, execution_id = %execution_id, "execution completed"),
            Some(e) => error!(pipe_id = %pipe.id, execution_id = %execution_id, error = %e, "execution failed"),
        }

        Ok(ExecutionOutcome {
            execution_id,
            success: error.is_none(),
            error,
            result,
            logs: entries,
        })
    }

    /// `{pipe, sourcePath, minio, spark, iceberg}`
    fn config_blob(&self, pipe: &Pipe, source_path: &str) -> Result<Value> {
        let mut blob = connection_blob(&self.config.snapshot());
        blob.insert("pipe".to_string(), serde_json::to_value(pipe)?);
        blob.insert(
            "sourcePath".to_string(),
            Value::String(self.storage.engine_uri(source_path)),
        );
        Ok(Value::Object(blob))
    }
}
