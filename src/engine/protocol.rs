// src/engine/protocol.rs

//! The engine's line protocol.
//!
//! - stdout: free-form progress text; the last line starting with `{` is the
//!   JSON result object.
//! - stderr: one JSON object per line; those with string `level` and
//!   `message` fields are structured log entries, everything else is noise.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};

use super::EngineError;
use crate::config::AppConfig;
use crate::types::{ExecutionLog, LogLevel};

/// Whether a stdout line could be the result object.
pub fn is_result_candidate(line: &str) -> bool {
    line.trim().starts_with('{')
}

/// Extract the result object from complete stdout text.
pub fn parse_result(stdout: &str) -> Result<Value, EngineError> {
    let last = stdout.lines().rev().find(|l| is_result_candidate(l));
    parse_result_line(last)
}

/// Parse the chosen result line.
pub fn parse_result_line(line: Option<&str>) -> Result<Value, EngineError> {
    let line = line.ok_or(EngineError::NoResult)?;
    serde_json::from_str(line.trim()).map_err(EngineError::MalformedResult)
}

/// Turn one stderr line into a log entry, if it is a well-formed one.
pub fn parse_diagnostic_line(line: &str) -> Option<ExecutionLog> {
    let trimmed = line.trim();
    if !trimmed.starts_with('{') {
        return None;
    }

    let value: Value = serde_json::from_str(trimmed).ok()?;
    let level = value.get("level")?.as_str()?;
    let message = value.get("message")?.as_str()?;

    let timestamp = value
        .get("timestamp")
        .and_then(Value::as_str)
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map_or_else(Utc::now, |ts| ts.with_timezone(&Utc));

    Some(ExecutionLog {
        timestamp,
        level: LogLevel::from_engine(level),
        message: message.to_string(),
    })
}

/// Connection settings every engine call carries: `minio`, `spark` and
/// `iceberg` sections.
pub fn connection_blob(config: &AppConfig) -> Map<String, Value> {
    let storage = &config.storage;
    let engine = &config.engine;

    let mut blob = Map::new();
    blob.insert(
        "minio".to_string(),
        json!({
            "endpoint": storage.endpoint,
            "port": storage.port,
            "useSSL": storage.use_ssl,
            "accessKey": storage.access_key,
            "secretKey": storage.secret_key,
            "defaultBucket": storage.bucket,
        }),
    );
    blob.insert(
        "spark".to_string(),
        json!({
            "pythonPath": engine.python_path,
            "sparkHome": engine.spark_home,
            "masterUrl": engine.master_url,
            "driverMemory": engine.driver_memory,
            "executorMemory": engine.executor_memory,
            "javaHome": engine.java_home.as_ref().map(|p| p.display().to_string()),
        }),
    );
    blob.insert(
        "iceberg".to_string(),
        json!({
            "warehouse": config.iceberg.warehouse,
            "catalog": config.iceberg.catalog,
        }),
    );
    blob
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_brace_line_wins() {
        let out = "starting\n{\"partial\":1}\nworking\n{\"tables\":[\"a\"]}\ndone\n";
        assert_eq!(parse_result(out).unwrap(), json!({"tables": ["a"]}));
    }

    #[test]
    fn missing_result_is_a_protocol_error() {
        let err = parse_result("just text\n").unwrap_err();
        assert!(matches!(err, EngineError::NoResult));
        assert!(err.is_protocol());
    }

    #[test]
    fn malformed_result_is_a_protocol_error() {
        let err = parse_result("{not json").unwrap_err();
        assert!(matches!(err, EngineError::MalformedResult(_)));
    }

    #[test]
    fn diagnostic_lines_need_level_and_message() {
        let entry = parse_diagnostic_line(r#"{"level":"warn","message":"slow scan"}"#).unwrap();
        assert_eq!(entry.level, LogLevel::Warn);
        assert_eq!(entry.message, "slow scan");

        assert!(parse_diagnostic_line("WARN slow scan").is_none());
        assert!(parse_diagnostic_line(r#"{"level":"warn"}"#).is_none());
        assert!(parse_diagnostic_line(r#"{"level":1,"message":"x"}"#).is_none());
    }

    #[test]
    fn diagnostic_timestamp_is_kept_when_valid() {
        let entry = parse_diagnostic_line(
            r#"{"level":"INFO","message":"m","timestamp":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(entry.level, LogLevel::Info);
        assert_eq!(entry.timestamp.to_rfc3339(), "2024-01-01T00:00:00+00:00");
    }

    #[test]
    fn connection_blob_has_engine_field_names() {
        let blob = connection_blob(&AppConfig::default());
        assert_eq!(blob["minio"]["defaultBucket"], "data-chef");
        assert_eq!(blob["minio"]["useSSL"], false);
        assert_eq!(blob["spark"]["masterUrl"], "local[*]");
        assert_eq!(blob["iceberg"]["catalog"], "iceberg_catalog");
    }
}
