// src/catalog/history.rs

use chrono::{DateTime, Utc};
use rusqlite::{Row, params};
use serde::{Deserialize, Serialize};

use super::{PipeCatalog, format_ts, now, parse_ts};
use crate::errors::{DataChefError, Result};
use crate::pipe::model::Pipe;
use crate::types::{ExecutionLog, ExecutionStatus};

/// One recorded run of a pipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipeExecution {
    pub id: String,
    pub pipe_id: String,
    pub pipe_name: String,
    pub source_path: String,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub counters: ExecutionCounters,
    pub error: Option<String>,
    pub logs: Vec<ExecutionLog>,
}

/// Work counters an engine may report in its result object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecutionCounters {
    pub files_processed: u64,
    pub records_processed: u64,
    pub bytes_processed: u64,
}

impl ExecutionCounters {
    /// Pick counters out of an engine result; missing ones stay zero.
    pub fn from_result(result: &serde_json::Value) -> Self {
        serde_json::from_value(result.clone()).unwrap_or_default()
    }
}

impl PipeExecution {
    pub fn start(id: impl Into<String>, pipe: &Pipe, source_path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            pipe_id: pipe.id.clone(),
            pipe_name: pipe.spec.name.clone(),
            source_path: source_path.into(),
            status: ExecutionStatus::Running,
            started_at: now(),
            completed_at: None,
            counters: ExecutionCounters::default(),
            error: None,
            logs: Vec::new(),
        }
    }

    pub fn finish(
        &mut self,
        status: ExecutionStatus,
        error: Option<String>,
        logs: Vec<ExecutionLog>,
        counters: ExecutionCounters,
    ) {
        self.status = status;
        self.completed_at = Some(now());
        self.error = error;
        self.logs = logs;
        self.counters = counters;
    }
}

struct ExecutionRow {
    id: String,
    pipe_id: String,
    pipe_name: String,
    source_path: String,
    status: String,
    started_at: String,
    completed_at: Option<String>,
    files_processed: i64,
    records_processed: i64,
    bytes_processed: i64,
    error: Option<String>,
    logs: Option<String>,
}

impl ExecutionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            pipe_id: row.get(1)?,
            pipe_name: row.get(2)?,
            source_path: row.get(3)?,
            status: row.get(4)?,
            started_at: row.get(5)?,
            completed_at: row.get(6)?,
            files_processed: row.get(7)?,
            records_processed: row.get(8)?,
            bytes_processed: row.get(9)?,
            error: row.get(10)?,
            logs: row.get(11)?,
        })
    }

    fn into_execution(self) -> Result<PipeExecution> {
        Ok(PipeExecution {
            id: self.id,
            pipe_id: self.pipe_id,
            pipe_name: self.pipe_name,
            source_path: self.source_path,
            status: self
                .status
                .parse()
                .map_err(DataChefError::InvalidRequest)?,
            started_at: parse_ts(&self.started_at)?,
            completed_at: self.completed_at.as_deref().map(parse_ts).transpose()?,
            counters: ExecutionCounters {
                files_processed: from_sql_count(self.files_processed),
                records_processed: from_sql_count(self.records_processed),
                bytes_processed: from_sql_count(self.bytes_processed),
            },
            error: self.error,
            logs: match self.logs {
                Some(raw) if !raw.is_empty() => serde_json::from_str(&raw)?,
                _ => Vec::new(),
            },
        })
    }
}

fn to_sql_count(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn from_sql_count(n: i64) -> u64 {
    u64::try_from(n).unwrap_or(0)
}

impl PipeCatalog {
    pub fn record_execution(&self, execution: &PipeExecution) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO executions (id, pipe_id, pipe_name, source_path, status, started_at, \
             completed_at, files_processed, records_processed, bytes_processed, error, logs) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12) \
             ON CONFLICT(id) DO UPDATE SET status = excluded.status, \
             completed_at = excluded.completed_at, files_processed = excluded.files_processed, \
             records_processed = excluded.records_processed, \
             bytes_processed = excluded.bytes_processed, error = excluded.error, \
             logs = excluded.logs",
            params![
                execution.id,
                execution.pipe_id,
                execution.pipe_name,
                execution.source_path,
                execution.status.as_str(),
                format_ts(&execution.started_at),
                execution.completed_at.as_ref().map(format_ts),
                to_sql_count(execution.counters.files_processed),
                to_sql_count(execution.counters.records_processed),
                to_sql_count(execution.counters.bytes_processed),
                execution.error,
                serde_json::to_string(&execution.logs)?,
            ],
        )?;
        Ok(())
    }

    pub fn get_execution(&self, id: &str) -> Result<Option<PipeExecution>> {
        let mut found = self.query_executions(
            "SELECT * FROM executions WHERE id = ?1",
            params![id],
        )?;
        Ok(found.pop())
    }

    /// Most recent executions first, optionally for a single pipe.
    pub fn executions(&self, pipe_id: Option<&str>, limit: usize) -> Result<Vec<PipeExecution>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        match pipe_id {
            Some(pipe_id) => self.query_executions(
                "SELECT * FROM executions WHERE pipe_id = ?1 ORDER BY started_at DESC LIMIT ?2",
                params![pipe_id, limit],
            ),
            None => self.query_executions(
                "SELECT * FROM executions ORDER BY started_at DESC LIMIT ?1",
                params![limit],
            ),
        }
    }

    fn query_executions<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<PipeExecution>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, ExecutionRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(ExecutionRow::into_execution).collect()
    }
}
