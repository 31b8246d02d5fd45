// src/catalog/pipes.rs

use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::debug;
use uuid::Uuid;

use super::{PipeCatalog, advance, format_ts, now, parse_ts};
use crate::errors::Result;
use crate::pipe::model::{Pipe, PipeSpec};

const SELECT_PIPE: &str = "SELECT id, name, description, storage_path, file_pattern, \
     record_boundary, schema, partitioning, output, created_at, updated_at FROM pipes";

/// Raw column values; JSON decoding happens outside the rusqlite closure.
struct PipeRow {
    id: String,
    name: String,
    description: Option<String>,
    storage_path: String,
    file_pattern: String,
    record_boundary: String,
    schema: String,
    partitioning: String,
    output: String,
    created_at: String,
    updated_at: String,
}

impl PipeRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            storage_path: row.get(3)?,
            file_pattern: row.get(4)?,
            record_boundary: row.get(5)?,
            schema: row.get(6)?,
            partitioning: row.get(7)?,
            output: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    fn into_pipe(self) -> Result<Pipe> {
        Ok(Pipe {
            id: self.id,
            spec: PipeSpec {
                name: self.name,
                description: self.description,
                storage_path: self.storage_path,
                file_pattern: serde_json::from_str(&self.file_pattern)?,
                record_boundary: serde_json::from_str(&self.record_boundary)?,
                schema: serde_json::from_str(&self.schema)?,
                partitioning: serde_json::from_str(&self.partitioning)?,
                output: serde_json::from_str(&self.output)?,
            },
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
        })
    }
}

impl PipeCatalog {
    /// All pipes, most recently updated first.
    pub fn list(&self) -> Result<Vec<Pipe>> {
        let conn = self.lock_conn()?;
        query_pipes(&conn, &format!("{SELECT_PIPE} ORDER BY updated_at DESC"), [])
    }

    pub fn get(&self, id: &str) -> Result<Option<Pipe>> {
        let conn = self.lock_conn()?;
        get_pipe(&conn, id)
    }

    /// First pipe (in listing order) bound exactly to `storage_path`.
    pub fn find_by_storage_path(&self, storage_path: &str) -> Result<Option<Pipe>> {
        let conn = self.lock_conn()?;
        let mut pipes = query_pipes(
            &conn,
            &format!("{SELECT_PIPE} WHERE storage_path = ?1 ORDER BY updated_at DESC LIMIT 1"),
            [storage_path],
        )?;
        Ok(pipes.pop())
    }

    pub fn find_by_name(&self, name: &str) -> Result<Option<Pipe>> {
        let conn = self.lock_conn()?;
        let mut pipes = query_pipes(
            &conn,
            &format!("{SELECT_PIPE} WHERE name = ?1 ORDER BY updated_at DESC LIMIT 1"),
            [name],
        )?;
        Ok(pipes.pop())
    }

    /// Store a new pipe under a fresh id.
    pub fn insert(&self, spec: PipeSpec) -> Result<Pipe> {
        let ts = now();
        let pipe = Pipe {
            id: Uuid::new_v4().to_string(),
            spec,
            created_at: ts,
            updated_at: ts,
        };

        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO pipes (id, name, description, storage_path, file_pattern, \
             record_boundary, schema, partitioning, output, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                pipe.id,
                pipe.spec.name,
                pipe.spec.description,
                pipe.spec.storage_path,
                serde_json::to_string(&pipe.spec.file_pattern)?,
                serde_json::to_string(&pipe.spec.record_boundary)?,
                serde_json::to_string(&pipe.spec.schema)?,
                serde_json::to_string(&pipe.spec.partitioning)?,
                serde_json::to_string(&pipe.spec.output)?,
                format_ts(&pipe.created_at),
                format_ts(&pipe.updated_at),
            ],
        )?;

        debug!(pipe_id = %pipe.id, name = %pipe.spec.name, "inserted pipe");
        Ok(pipe)
    }

    /// Replace the spec of an existing pipe. `None` if the id is unknown.
    ///
    /// `id` and `createdAt` are preserved; `updatedAt` always moves forward.
    pub fn update(&self, id: &str, spec: PipeSpec) -> Result<Option<Pipe>> {
        let conn = self.lock_conn()?;
        let Some(existing) = get_pipe(&conn, id)? else {
            return Ok(None);
        };

        let pipe = Pipe {
            id: existing.id,
            spec,
            created_at: existing.created_at,
            updated_at: advance(existing.updated_at),
        };

        conn.execute(
            "UPDATE pipes SET name = ?1, description = ?2, storage_path = ?3, \
             file_pattern = ?4, record_boundary = ?5, schema = ?6, partitioning = ?7, \
             output = ?8, updated_at = ?9 WHERE id = ?10",
            params![
                pipe.spec.name,
                pipe.spec.description,
                pipe.spec.storage_path,
                serde_json::to_string(&pipe.spec.file_pattern)?,
                serde_json::to_string(&pipe.spec.record_boundary)?,
                serde_json::to_string(&pipe.spec.schema)?,
                serde_json::to_string(&pipe.spec.partitioning)?,
                serde_json::to_string(&pipe.spec.output)?,
                format_ts(&pipe.updated_at),
                pipe.id,
            ],
        )?;

        debug!(pipe_id = %pipe.id, "updated pipe");
        Ok(Some(pipe))
    }

    /// Remove a pipe row. Returns whether a row existed.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let conn = self.lock_conn()?;
        let removed = conn.execute("DELETE FROM pipes WHERE id = ?1", [id])?;
        Ok(removed > 0)
    }
}

fn get_pipe(conn: &Connection, id: &str) -> Result<Option<Pipe>> {
    conn.query_row(&format!("{SELECT_PIPE} WHERE id = ?1"), [id], PipeRow::from_row)
        .optional()?
        .map(PipeRow::into_pipe)
        .transpose()
}

fn query_pipes<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<Pipe>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, PipeRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().map(PipeRow::into_pipe).collect()
}
