// src/service.rs

//! The request surface: pipes, executions, storage and tables composed into
//! one cloneable handle.

use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::catalog::{PipeCatalog, PipeExecution};
use crate::config::ConfigHandle;
use crate::engine::{EngineBackend, EngineLauncher, LogSink, ProcessEngine};
use crate::errors::{DataChefError, Result};
use crate::exec::{ExecutionOutcome, ExecutionStatusReport, Orchestrator};
use crate::pipe::defaults::default_pipes;
use crate::pipe::extract::{Extractor, FieldValue, Record};
use crate::pipe::model::{Pipe, PipePatch, PipeSpec};
use crate::pipe::records::{FileMatcher, split_records};
use crate::pipe::validate::{ValidationError, ensure_valid, validate};
use crate::storage::path_utils::normalize_path;
use crate::storage::{Download, ObjectBackend, ObjectStoreBackend, StorageBridge, StorageItem};
use crate::tables::{TableInfo, TablePreview, TableService};
use crate::types::{DeleteKind, DeleteOutcome};

/// One file in an upload request.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub content_type: Option<String>,
    pub body: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOutcome {
    pub files: Vec<String>,
    /// A pipe bound to the upload folder was started in the background.
    pub pipe_executed: bool,
}

#[derive(Clone)]
pub struct PipeService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    catalog: Arc<PipeCatalog>,
    storage: StorageBridge,
    orchestrator: Arc<Orchestrator>,
    tables: TableService,
    config: ConfigHandle,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl PipeService {
    pub fn new(
        catalog: Arc<PipeCatalog>,
        backend: Arc<dyn ObjectBackend>,
        engine: Arc<dyn EngineBackend>,
        config: ConfigHandle,
    ) -> Self {
        let storage = StorageBridge::new(backend);
        let orchestrator = Orchestrator::new(
            Arc::clone(&catalog),
            storage.clone(),
            Arc::clone(&engine),
            config.clone(),
        );

        Self {
            inner: Arc::new(ServiceInner {
                catalog,
                storage,
                orchestrator: Arc::new(orchestrator),
                tables: TableService::new(engine, config.clone()),
                config,
                background: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Wire up the production components described by the configuration.
    pub fn from_config(config: ConfigHandle) -> Result<Self> {
        let cfg = config.snapshot();
        let catalog = PipeCatalog::open(&cfg.catalog.resolved_db_path())?;
        let backend = ObjectStoreBackend::from_config(&cfg.storage)?;
        let engine = ProcessEngine::new(EngineLauncher::from_config(&cfg.engine));

        Ok(Self::new(
            Arc::new(catalog),
            Arc::new(backend),
            Arc::new(engine),
            config,
        ))
    }

    pub fn config(&self) -> &ConfigHandle {
        &self.inner.config
    }

    // ---- pipes ----

    pub fn list_pipes(&self) -> Result<Vec<Pipe>> {
        self.inner.catalog.list()
    }

    pub fn get_pipe(&self, id: &str) -> Result<Pipe> {
        self.inner
            .catalog
            .get(id)?
            .ok_or_else(|| DataChefError::not_found("pipe", id))
    }

    /// Validate without storing anything.
    pub fn check_pipe(&self, spec: &PipeSpec) -> Vec<ValidationError> {
        let mut spec = spec.clone();
        spec.apply_defaults();
        validate(&spec)
    }

    /// Validate, provision the folder, then store the row.
    pub async fn create_pipe(&self, mut spec: PipeSpec) -> Result<Pipe> {
        spec.apply_defaults();
        ensure_valid(&spec)?;

        let placeholder = self.inner.storage.create_folder(&spec.storage_path).await?;

        let pipe = match self.inner.catalog.insert(spec) {
            Ok(pipe) => pipe,
            Err(err) => {
                warn!(error = %err, "pipe insert failed; removing provisioned folder placeholder");
                if let Err(cleanup) = self.inner.storage.delete_file(&placeholder).await {
                    warn!(key = %placeholder, error = %cleanup, "placeholder cleanup failed");
                }
                return Err(err);
            }
        };

        info!(pipe_id = %pipe.id, name = %pipe.spec.name, "pipe created");
        Ok(pipe)
    }

    pub async fn update_pipe(&self, id: &str, patch: PipePatch) -> Result<Pipe> {
        let existing = self.get_pipe(id)?;

        let mut spec = existing.spec.clone();
        patch.apply_to(&mut spec);
        spec.apply_defaults();
        ensure_valid(&spec)?;

        if normalize_path(&spec.storage_path) != normalize_path(&existing.spec.storage_path) {
            self.inner.storage.create_folder(&spec.storage_path).await?;
        }

        let pipe = self
            .inner
            .catalog
            .update(id, spec)?
            .ok_or_else(|| DataChefError::not_found("pipe", id))?;

        info!(pipe_id = %pipe.id, "pipe updated");
        Ok(pipe)
    }

    /// Delete the folder (best-effort), then the row.
    pub async fn delete_pipe(&self, id: &str) -> Result<DeleteOutcome> {
        let pipe = self.get_pipe(id)?;

        let warning = match self.inner.storage.delete_folder(&pipe.spec.storage_path).await {
            Ok(removed) => {
                info!(pipe_id = %id, removed, "pipe folder deleted");
                None
            }
            Err(err) => {
                error!(pipe_id = %id, error = %err, "failed to delete pipe folder");
                Some(err.to_string())
            }
        };

        if !self.inner.catalog.delete(id)? {
            return Err(DataChefError::not_found("pipe", id));
        }

        info!(pipe_id = %id, "pipe deleted");
        Ok(match warning {
            None => DeleteOutcome::Deleted,
            Some(w) => DeleteOutcome::DeletedWithWarning(w),
        })
    }

    /// Create the built-in pipes whose names are not taken yet.
    pub async fn seed_default_pipes(&self) -> Result<Vec<Pipe>> {
        let mut created = Vec::new();
        for spec in default_pipes() {
            if self.inner.catalog.find_by_name(&spec.name)?.is_some() {
                continue;
            }
            created.push(self.create_pipe(spec).await?);
        }
        Ok(created)
    }

    /// Run the pipe's extraction over an uploaded object, locally.
    pub async fn preview_records(
        &self,
        pipe_id: &str,
        object_path: &str,
        limit: usize,
    ) -> Result<Vec<Record>> {
        let pipe = self.get_pipe(pipe_id)?;
        let boundary = &pipe.spec.record_boundary;

        let download = self.inner.storage.download(object_path).await?;
        let matcher = FileMatcher::new(&pipe.spec.file_pattern)?;
        if !matcher.matches(&download.file_name, download.content_length) {
            warn!(
                pipe_id = %pipe.id,
                object = %object_path,
                "object does not match the pipe's file pattern"
            );
        }

        let body = download.collect().await?;
        let text = String::from_utf8_lossy(&body);
        let raw_records = split_records(&text, boundary)?;

        let records = match &boundary.field_extraction {
            Some(extraction) => {
                let extractor = Extractor::new(extraction)?;
                let mut out = Vec::new();
                for raw in &raw_records {
                    if out.len() >= limit {
                        break;
                    }
                    if let Some(record) = extractor.apply(raw)? {
                        out.push(record);
                    }
                }
                out
            }
            None => raw_records
                .into_iter()
                .take(limit)
                .map(|raw| Record::new(vec![("value".to_string(), Some(FieldValue::Text(raw)))]))
                .collect(),
        };

        Ok(records)
    }

    // ---- executions ----

    pub async fn execute(
        &self,
        pipe_id: &str,
        source_path: Option<&str>,
        logs: LogSink,
    ) -> Result<ExecutionOutcome> {
        self.inner.orchestrator.execute(pipe_id, source_path, logs).await
    }

    pub fn execution_status(&self) -> ExecutionStatusReport {
        self.inner.orchestrator.status()
    }

    pub fn cancel_execution(&self) -> bool {
        self.inner.orchestrator.cancel()
    }

    pub fn history(&self, pipe_id: Option<&str>, limit: usize) -> Result<Vec<PipeExecution>> {
        self.inner.catalog.executions(pipe_id, limit)
    }

    // ---- storage ----

    pub async fn list_storage(&self, path: &str) -> Result<Vec<StorageItem>> {
        self.inner.storage.list(path).await
    }

    pub async fn create_folder(&self, path: &str) -> Result<String> {
        self.inner.storage.create_folder(path).await
    }

    /// Store the files, then start the pipe bound to `path` (if any) in the
    /// background.
    pub async fn upload(&self, path: &str, files: Vec<UploadFile>) -> Result<UploadOutcome> {
        let limits = self.inner.config.snapshot().upload;
        if files.is_empty() {
            return Err(DataChefError::InvalidRequest(
                "no files were uploaded".to_string(),
            ));
        }
        if files.len() > limits.max_files {
            return Err(DataChefError::InvalidRequest(format!(
                "at most {} files per upload (got {})",
                limits.max_files,
                files.len()
            )));
        }
        if let Some(big) = files
            .iter()
            .find(|f| f.body.len() as u64 > limits.max_file_bytes)
        {
            return Err(DataChefError::InvalidRequest(format!(
                "'{}' exceeds the {} byte upload limit",
                big.name, limits.max_file_bytes
            )));
        }

        let mut keys = Vec::with_capacity(files.len());
        for file in files {
            let key = self
                .inner
                .storage
                .upload(path, &file.name, file.body, file.content_type.as_deref())
                .await?;
            keys.push(key);
        }
        info!(path, files = keys.len(), "upload stored");

        let pipe_executed = match self.inner.catalog.find_by_storage_path(path)? {
            Some(pipe) => {
                self.spawn_auto_execution(pipe, path.to_string());
                true
            }
            None => false,
        };

        Ok(UploadOutcome {
            files: keys,
            pipe_executed,
        })
    }

    fn spawn_auto_execution(&self, pipe: Pipe, path: String) {
        let orchestrator = Arc::clone(&self.inner.orchestrator);
        info!(pipe_id = %pipe.id, path = %path, "upload matched pipe; starting execution");

        let handle = tokio::spawn(async move {
            let (sink, mut rx) = LogSink::channel();
            let pipe_name = pipe.spec.name.clone();
            let forward = tokio::spawn(async move {
                while let Some(entry) = rx.recv().await {
                    info!(pipe = %pipe_name, level = %entry.level, "{}", entry.message);
                }
            });

            match orchestrator.execute(&pipe.id, Some(&path), sink).await {
                Ok(outcome) if outcome.success => {
                    info!(pipe_id = %pipe.id, execution_id = %outcome.execution_id, "auto-execution completed");
                }
                Ok(outcome) => {
                    error!(
                        pipe_id = %pipe.id,
                        execution_id = %outcome.execution_id,
                        error = outcome.error.as_deref().unwrap_or("unknown"),
                        "auto-execution failed"
                    );
                }
                Err(DataChefError::ExecutionBusy { pipe_id }) => {
                    warn!(pipe_id = %pipe.id, running = %pipe_id, "execution slot busy; skipping auto-execution");
                }
                Err(err) => {
                    error!(pipe_id = %pipe.id, error = %err, "auto-execution could not start");
                }
            }

            let _ = forward.await;
        });

        let mut background = self
            .inner
            .background
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        background.retain(|h| !h.is_finished());
        background.push(handle);
    }

    /// Background executions still tracked; finished ones are pruned.
    pub fn pending_background(&self) -> usize {
        let mut background = self
            .inner
            .background
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        background.retain(|h| !h.is_finished());
        background.len()
    }

    /// Wait for every background execution started so far.
    pub async fn wait_background(&self) {
        let handles: Vec<_> = std::mem::take(
            &mut *self
                .inner
                .background
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for handle in handles {
            if let Err(err) = handle.await {
                warn!(error = %err, "background execution task failed");
            }
        }
    }

    pub async fn delete_storage(&self, path: &str, kind: DeleteKind) -> Result<usize> {
        self.inner.storage.delete(path, kind).await
    }

    pub async fn download(&self, path: &str) -> Result<Download> {
        self.inner.storage.download(path).await
    }

    // ---- tables ----

    pub async fn list_tables(&self) -> Result<Vec<TableInfo>> {
        self.inner.tables.list().await
    }

    pub async fn preview_table(&self, table: &str, limit: usize) -> Result<TablePreview> {
        self.inner.tables.preview(table, limit).await
    }

    pub async fn query_tables(&self, sql: &str, limit: usize) -> Result<TablePreview> {
        self.inner.tables.query(sql, limit).await
    }
}
