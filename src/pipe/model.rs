// src/pipe/model.rs

//! Serde model for pipe specifications.
//!
//! Everything here serializes to camelCase JSON: the same shape is stored in
//! catalog columns and handed to the engine inside the config blob.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_DELIMITER: &str = ",";
pub const DEFAULT_CATALOG: &str = "iceberg_catalog";
pub const DEFAULT_NAMESPACE: &str = "default";

/// A persisted pipe: a [`PipeSpec`] plus catalog-assigned identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pipe {
    pub id: String,
    #[serde(flatten)]
    pub spec: PipeSpec,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipeSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub storage_path: String,
    #[serde(default)]
    pub file_pattern: FilePattern,
    pub record_boundary: RecordBoundary,
    #[serde(default)]
    pub schema: Schema,
    #[serde(default)]
    pub partitioning: Partitioning,
    pub output: OutputConfig,
}

impl PipeSpec {
    /// Fill in format defaults that the validator and engine rely on.
    pub fn apply_defaults(&mut self) {
        if let RecordFormat::Delimited {
            delimiter,
            has_header,
            ..
        } = &mut self.record_boundary.format
        {
            if delimiter.is_none() {
                *delimiter = Some(DEFAULT_DELIMITER.to_string());
            }
            if has_header.is_none() {
                *has_header = Some(true);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePattern {
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordBoundary {
    #[serde(flatten)]
    pub format: RecordFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_extraction: Option<FieldExtraction>,
}

impl RecordBoundary {
    pub fn new(format: RecordFormat) -> Self {
        Self {
            format,
            encoding: None,
            field_extraction: None,
        }
    }
}

/// How raw bytes are cut into records, tagged on `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum RecordFormat {
    Delimited {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        delimiter: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        quote: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        escape: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        has_header: Option<bool>,
    },
    Fixed,
    Json,
    Jsonl,
    Multiline {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        multiline_pattern: Option<String>,
    },
    Parquet,
    Text {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        line_separator: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        multiline_pattern: Option<String>,
    },
}

impl RecordFormat {
    pub fn kind(&self) -> &'static str {
        match self {
            RecordFormat::Delimited { .. } => "delimited",
            RecordFormat::Fixed => "fixed",
            RecordFormat::Json => "json",
            RecordFormat::Jsonl => "jsonl",
            RecordFormat::Multiline { .. } => "multiline",
            RecordFormat::Parquet => "parquet",
            RecordFormat::Text { .. } => "text",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldExtraction {
    #[serde(flatten)]
    pub method: ExtractionMethod,
    pub field_names: Vec<String>,
    #[serde(default)]
    pub on_error: OnError,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub field_processing: Vec<FieldProcessing>,
}

/// Extraction strategy, tagged on `method`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum ExtractionMethod {
    Regex { pattern: String },
    Delimiter { field_delimiter: String },
    Fixed { fixed_widths: Vec<usize> },
    Split { split_steps: Vec<SplitStep> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitStep {
    pub delimiter: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub keep_all: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnError {
    Skip,
    #[default]
    Null,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldProcessing {
    pub field: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub trim: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replace: Vec<Replacement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_format: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replacement {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(default)]
    pub infer_from_data: bool,
    #[serde(default)]
    pub columns: Vec<SchemaColumn>,
}

impl Default for Schema {
    fn default() -> Self {
        Self {
            infer_from_data: true,
            columns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl SchemaColumn {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            description: None,
            format: None,
        }
    }
}

fn default_nullable() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Int,
    Long,
    Float,
    Double,
    Boolean,
    Date,
    Timestamp,
    Binary,
    Decimal,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ColumnType::String => "string",
            ColumnType::Int => "int",
            ColumnType::Long => "long",
            ColumnType::Float => "float",
            ColumnType::Double => "double",
            ColumnType::Boolean => "boolean",
            ColumnType::Date => "date",
            ColumnType::Timestamp => "timestamp",
            ColumnType::Binary => "binary",
            ColumnType::Decimal => "decimal",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Partitioning {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub keys: Vec<PartitionKey>,
}

/// One partition key. Transform parameters stay optional here so that a
/// missing `bucketCount` is reported by validation rather than by the parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionKey {
    pub column: String,
    pub transform: PartitionTransform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncate_length: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionTransform {
    Identity,
    Bucket,
    Truncate,
    Year,
    Month,
    Day,
    Hour,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputConfig {
    pub table_name: String,
    #[serde(default = "default_catalog")]
    pub catalog: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub write_mode: WriteMode,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

impl OutputConfig {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            catalog: default_catalog(),
            namespace: default_namespace(),
            write_mode: WriteMode::Append,
            properties: BTreeMap::new(),
        }
    }
}

fn default_catalog() -> String {
    DEFAULT_CATALOG.to_string()
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    #[default]
    Append,
    Overwrite,
    Upsert,
}

/// Partial update for a pipe. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_pattern: Option<FilePattern>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_boundary: Option<RecordBoundary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partitioning: Option<Partitioning>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputConfig>,
}

impl PipePatch {
    pub fn is_empty(&self) -> bool {
        *self == PipePatch::default()
    }

    pub fn apply_to(self, spec: &mut PipeSpec) {
        if let Some(name) = self.name {
            spec.name = name;
        }
        if let Some(description) = self.description {
            spec.description = Some(description);
        }
        if let Some(storage_path) = self.storage_path {
            spec.storage_path = storage_path;
        }
        if let Some(file_pattern) = self.file_pattern {
            spec.file_pattern = file_pattern;
        }
        if let Some(record_boundary) = self.record_boundary {
            spec.record_boundary = record_boundary;
        }
        if let Some(schema) = self.schema {
            spec.schema = schema;
        }
        if let Some(partitioning) = self.partitioning {
            spec.partitioning = partitioning;
        }
        if let Some(output) = self.output {
            spec.output = output;
        }
    }
}
