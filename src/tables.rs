// src/tables.rs

//! Table listing, preview and ad-hoc queries, answered by the engine.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::config::ConfigHandle;
use crate::engine::protocol::connection_blob;
use crate::engine::{CancelSignal, EngineBackend, EngineInvocation, LogSink};
use crate::errors::{DataChefError, Result};

pub const MAX_PREVIEW_ROWS: usize = 1_000;
pub const MAX_QUERY_ROWS: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
}

/// The engine reports tables either as bare names or as objects.
#[derive(Deserialize)]
#[serde(untagged)]
enum TableEntry {
    Name(String),
    Info(TableInfo),
}

impl From<TableEntry> for TableInfo {
    fn from(entry: TableEntry) -> Self {
        match entry {
            TableEntry::Name(name) => TableInfo {
                name,
                namespace: None,
            },
            TableEntry::Info(info) => info,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TablePreview {
    pub schema: Vec<ColumnInfo>,
    #[serde(default)]
    pub rows: Vec<Value>,
    #[serde(default)]
    pub row_count: usize,
}

#[derive(Clone)]
pub struct TableService {
    engine: Arc<dyn EngineBackend>,
    config: ConfigHandle,
}

impl TableService {
    pub fn new(engine: Arc<dyn EngineBackend>, config: ConfigHandle) -> Self {
        Self { engine, config }
    }

    pub async fn list(&self) -> Result<Vec<TableInfo>> {
        let result = self.call("list", Vec::new()).await?;
        let entries: Vec<TableEntry> = match result.get("tables") {
            Some(tables) => serde_json::from_value(tables.clone())?,
            None => Vec::new(),
        };
        Ok(entries.into_iter().map(TableInfo::from).collect())
    }

    pub async fn preview(&self, table: &str, limit: usize) -> Result<TablePreview> {
        if table.trim().is_empty() {
            return Err(DataChefError::InvalidRequest(
                "table name is required".to_string(),
            ));
        }
        check_limit(limit, MAX_PREVIEW_ROWS)?;

        let result = self
            .call(
                "preview",
                vec![
                    "--table".to_string(),
                    table.to_string(),
                    "--limit".to_string(),
                    limit.to_string(),
                ],
            )
            .await?;

        if result.get("schema").is_none() {
            return Err(DataChefError::not_found("table", table));
        }
        Ok(serde_json::from_value(result)?)
    }

    pub async fn query(&self, sql: &str, limit: usize) -> Result<TablePreview> {
        if sql.trim().is_empty() {
            return Err(DataChefError::InvalidRequest(
                "query text is required".to_string(),
            ));
        }
        check_limit(limit, MAX_QUERY_ROWS)?;

        let result = self
            .call(
                "query",
                vec![
                    "--sql".to_string(),
                    sql.to_string(),
                    "--limit".to_string(),
                    limit.to_string(),
                ],
            )
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    async fn call(&self, action: &str, args: Vec<String>) -> Result<Value> {
        info!(action, "table request");
        let blob = Value::Object(connection_blob(&self.config.snapshot()));
        let invocation = EngineInvocation::new(action, args, blob);
        let value = self
            .engine
            .invoke(invocation, LogSink::discard(), CancelSignal::never())
            .await?;
        Ok(value)
    }
}

fn check_limit(limit: usize, max: usize) -> Result<()> {
    if limit == 0 || limit > max {
        return Err(DataChefError::InvalidRequest(format!(
            "limit must be between 1 and {max} (got {limit})"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn table_entries_accept_names_and_objects() {
        let entries: Vec<TableEntry> =
            serde_json::from_value(json!(["a", {"name": "b", "namespace": "default"}])).unwrap();
        let tables: Vec<TableInfo> = entries.into_iter().map(TableInfo::from).collect();
        assert_eq!(tables[0].name, "a");
        assert_eq!(tables[1].namespace.as_deref(), Some("default"));
    }

    #[test]
    fn limits_are_bounded() {
        assert!(check_limit(0, 10).is_err());
        assert!(check_limit(11, 10).is_err());
        assert!(check_limit(10, 10).is_ok());
    }
}
