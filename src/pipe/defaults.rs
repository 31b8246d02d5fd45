// src/pipe/defaults.rs

//! Built-in pipes that can be seeded into an empty catalog.

use crate::pipe::model::{
    ColumnType, ExtractionMethod, FieldExtraction, FilePattern, OnError, OutputConfig,
    Partitioning, PipeSpec, RecordBoundary, RecordFormat, Schema, SchemaColumn,
};

pub const JSON_PIPE_NAME: &str = "JSON file loader";
pub const LOG_PIPE_NAME: &str = "Log file parser";

/// Matches `2024-01-01 12:00:00 [LEVEL] message`.
pub const LOG_LINE_PATTERN: &str = r"(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}) \[(\w+)\] (.*)";

pub fn default_pipes() -> Vec<PipeSpec> {
    vec![json_loader(), log_parser()]
}

fn json_loader() -> PipeSpec {
    PipeSpec {
        name: JSON_PIPE_NAME.to_string(),
        description: Some("Loads JSON documents into an Iceberg table.".to_string()),
        storage_path: "/json_data".to_string(),
        file_pattern: FilePattern {
            extensions: vec!["json".to_string()],
            ..Default::default()
        },
        record_boundary: RecordBoundary {
            format: RecordFormat::Json,
            encoding: Some("utf-8".to_string()),
            field_extraction: None,
        },
        schema: Schema::default(),
        partitioning: Partitioning::default(),
        output: OutputConfig::new("json_data"),
    }
}

fn log_parser() -> PipeSpec {
    let column = |name: &str, nullable: bool| SchemaColumn {
        nullable,
        ..SchemaColumn::new(name, ColumnType::String)
    };

    PipeSpec {
        name: LOG_PIPE_NAME.to_string(),
        description: Some(
            "Extracts timestamp, level and message from plain-text log files.".to_string(),
        ),
        storage_path: "/logs".to_string(),
        file_pattern: FilePattern {
            extensions: vec!["log".to_string(), "txt".to_string()],
            ..Default::default()
        },
        record_boundary: RecordBoundary {
            format: RecordFormat::Text {
                line_separator: None,
                multiline_pattern: None,
            },
            encoding: Some("utf-8".to_string()),
            field_extraction: Some(FieldExtraction {
                method: ExtractionMethod::Regex {
                    pattern: LOG_LINE_PATTERN.to_string(),
                },
                field_names: vec!["timestamp".into(), "level".into(), "message".into()],
                on_error: OnError::Null,
                field_processing: Vec::new(),
            }),
        },
        schema: Schema {
            infer_from_data: false,
            columns: vec![
                column("timestamp", false),
                column("level", false),
                column("message", true),
            ],
        },
        partitioning: Partitioning::default(),
        output: OutputConfig::new("logs"),
    }
}
