// src/catalog/mod.rs

//! SQLite-backed pipe catalog and execution history.
//!
//! A single `Mutex<Connection>` serializes access; the lock is held for one
//! statement batch at a time and never across an `.await`.

mod history;
mod pipes;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, SubsecRound, TimeDelta, Utc};
use rusqlite::Connection;
use tracing::debug;

use crate::errors::{DataChefError, Result};

pub use history::{ExecutionCounters, PipeExecution};

const CREATE_TABLES: &str = r"
CREATE TABLE IF NOT EXISTS pipes (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    storage_path TEXT NOT NULL,
    file_pattern TEXT NOT NULL,
    record_boundary TEXT NOT NULL,
    schema TEXT NOT NULL,
    partitioning TEXT NOT NULL,
    output TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS executions (
    id TEXT PRIMARY KEY,
    pipe_id TEXT NOT NULL,
    pipe_name TEXT NOT NULL,
    source_path TEXT NOT NULL,
    status TEXT NOT NULL,
    started_at TEXT NOT NULL,
    completed_at TEXT,
    files_processed INTEGER DEFAULT 0,
    records_processed INTEGER DEFAULT 0,
    bytes_processed INTEGER DEFAULT 0,
    error TEXT,
    logs TEXT
);

CREATE INDEX IF NOT EXISTS idx_executions_pipe ON executions (pipe_id, started_at);
";

/// Persisted collection of pipes plus their execution history.
///
/// Create with [`PipeCatalog::open`] for a database file or
/// [`PipeCatalog::in_memory`] for tests.
pub struct PipeCatalog {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for PipeCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipeCatalog").finish_non_exhaustive()
    }
}

impl PipeCatalog {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        debug!(path = %path.display(), "opening pipe catalog");
        Self::init(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(CREATE_TABLES)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| DataChefError::LockPoisoned("pipe catalog"))
    }
}

/// Current time at the precision the catalog stores.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// A timestamp strictly later than `previous`, even if the clock has not
/// moved (or moved backwards) since.
pub fn advance(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = now();
    if now > previous {
        now
    } else {
        previous + TimeDelta::microseconds(1)
    }
}

fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}
