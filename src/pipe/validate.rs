// src/pipe/validate.rs

use std::collections::HashSet;
use std::fmt;

use regex::Regex;
use serde::Serialize;

use crate::errors::{DataChefError, Result};
use crate::pipe::model::{
    ExtractionMethod, FieldExtraction, PartitionTransform, PipeSpec, RecordFormat,
};
use crate::storage::path_utils::normalize_path;

/// One rule violation, addressed by a dotted field path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check every rule and return all violations. Empty means acceptable.
pub fn validate(spec: &PipeSpec) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    validate_identity(spec, &mut errors);
    validate_file_pattern(spec, &mut errors);
    validate_record_boundary(spec, &mut errors);
    validate_schema(spec, &mut errors);
    validate_partitioning(spec, &mut errors);
    validate_output(spec, &mut errors);

    errors
}

/// Like [`validate`] but folds violations into a single error.
pub fn ensure_valid(spec: &PipeSpec) -> Result<()> {
    let errors = validate(spec);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(DataChefError::Validation(errors))
    }
}

fn validate_identity(spec: &PipeSpec, errors: &mut Vec<ValidationError>) {
    if spec.name.trim().is_empty() {
        errors.push(ValidationError::new("name", "Pipe name is required"));
    }

    if spec.storage_path.is_empty() {
        errors.push(ValidationError::new(
            "storagePath",
            "Storage path is required",
        ));
    } else if !spec.storage_path.starts_with('/') {
        errors.push(ValidationError::new(
            "storagePath",
            "Storage path must start with /",
        ));
    } else if normalize_path(&spec.storage_path).is_empty() {
        errors.push(ValidationError::new(
            "storagePath",
            "Storage path must name a folder below the root",
        ));
    }
}

fn validate_file_pattern(spec: &PipeSpec, errors: &mut Vec<ValidationError>) {
    let pattern = &spec.file_pattern;

    if pattern.extensions.iter().all(|e| e.trim().is_empty()) {
        errors.push(ValidationError::new(
            "filePattern.extensions",
            "At least one file extension is required",
        ));
    }

    if let Some(regex) = &pattern.regex {
        check_regex("filePattern.regex", regex, errors);
    }

    if let (Some(min), Some(max)) = (pattern.min_size, pattern.max_size) {
        if min > max {
            errors.push(ValidationError::new(
                "filePattern.minSize",
                format!("minSize ({min}) must not exceed maxSize ({max})"),
            ));
        }
    }
}

fn validate_record_boundary(spec: &PipeSpec, errors: &mut Vec<ValidationError>) {
    let boundary = &spec.record_boundary;

    match &boundary.format {
        RecordFormat::Delimited { delimiter, .. } => {
            if delimiter.as_deref() == Some("") {
                errors.push(ValidationError::new(
                    "recordBoundary.delimiter",
                    "Delimiter must not be empty",
                ));
            }
        }
        RecordFormat::Multiline { multiline_pattern } => match multiline_pattern {
            Some(p) => check_regex("recordBoundary.multilinePattern", p, errors),
            None => errors.push(ValidationError::new(
                "recordBoundary.multilinePattern",
                "Multiline records need a multilinePattern",
            )),
        },
        RecordFormat::Text {
            line_separator,
            multiline_pattern,
        } => {
            if line_separator.as_deref() == Some("") {
                errors.push(ValidationError::new(
                    "recordBoundary.lineSeparator",
                    "Line separator must not be empty",
                ));
            }
            if let Some(p) = multiline_pattern {
                check_regex("recordBoundary.multilinePattern", p, errors);
            }
        }
        RecordFormat::Fixed | RecordFormat::Json | RecordFormat::Jsonl | RecordFormat::Parquet => {
        }
    }

    if let Some(extraction) = &boundary.field_extraction {
        validate_field_extraction(extraction, errors);
    }
}

fn validate_field_extraction(extraction: &FieldExtraction, errors: &mut Vec<ValidationError>) {
    const BASE: &str = "recordBoundary.fieldExtraction";
    let names = &extraction.field_names;

    if names.is_empty() {
        errors.push(ValidationError::new(
            format!("{BASE}.fieldNames"),
            "At least one field name is required",
        ));
    }

    let mut seen = HashSet::new();
    for name in names {
        if name.trim().is_empty() {
            errors.push(ValidationError::new(
                format!("{BASE}.fieldNames"),
                "Field names must not be empty",
            ));
        } else if !seen.insert(name.as_str()) {
            errors.push(ValidationError::new(
                format!("{BASE}.fieldNames"),
                format!("Duplicate field name '{name}'"),
            ));
        }
    }

    match &extraction.method {
        ExtractionMethod::Regex { pattern } => match Regex::new(pattern) {
            Ok(re) => {
                let groups = re.captures_len() - 1;
                if groups != names.len() {
                    errors.push(ValidationError::new(
                        format!("{BASE}.fieldNames"),
                        format!(
                            "Pattern has {groups} capture groups but {} field names were given",
                            names.len()
                        ),
                    ));
                }
            }
            Err(e) => errors.push(ValidationError::new(
                format!("{BASE}.pattern"),
                format!("Invalid regular expression: {e}"),
            )),
        },
        ExtractionMethod::Delimiter { field_delimiter } => {
            if field_delimiter.is_empty() {
                errors.push(ValidationError::new(
                    format!("{BASE}.fieldDelimiter"),
                    "Field delimiter must not be empty",
                ));
            }
        }
        ExtractionMethod::Fixed { fixed_widths } => {
            if fixed_widths.contains(&0) {
                errors.push(ValidationError::new(
                    format!("{BASE}.fixedWidths"),
                    "Fixed widths must be greater than zero",
                ));
            }
            if fixed_widths.len() != names.len() {
                errors.push(ValidationError::new(
                    format!("{BASE}.fieldNames"),
                    format!(
                        "{} widths were given for {} field names",
                        fixed_widths.len(),
                        names.len()
                    ),
                ));
            }
        }
        ExtractionMethod::Split { split_steps } => {
            if split_steps.is_empty() {
                errors.push(ValidationError::new(
                    format!("{BASE}.splitSteps"),
                    "At least one split step is required",
                ));
            }
            for (i, step) in split_steps.iter().enumerate() {
                if step.delimiter.is_empty() {
                    errors.push(ValidationError::new(
                        format!("{BASE}.splitSteps[{i}].delimiter"),
                        "Split delimiter must not be empty",
                    ));
                }
            }
        }
    }

    for (i, processing) in extraction.field_processing.iter().enumerate() {
        if !names.contains(&processing.field) {
            errors.push(ValidationError::new(
                format!("{BASE}.fieldProcessing[{i}].field"),
                format!("Unknown field '{}'", processing.field),
            ));
        }
        if let Some(regex) = &processing.regex {
            check_regex(&format!("{BASE}.fieldProcessing[{i}].regex"), regex, errors);
        }
    }
}

fn validate_schema(spec: &PipeSpec, errors: &mut Vec<ValidationError>) {
    let schema = &spec.schema;
    if schema.infer_from_data {
        return;
    }

    if schema.columns.is_empty() {
        errors.push(ValidationError::new(
            "schema.columns",
            "An explicit schema needs at least one column",
        ));
    }

    let mut seen = HashSet::new();
    for (i, column) in schema.columns.iter().enumerate() {
        if column.name.trim().is_empty() {
            errors.push(ValidationError::new(
                format!("schema.columns[{i}].name"),
                "Column name is required",
            ));
        } else if !seen.insert(column.name.as_str()) {
            errors.push(ValidationError::new(
                format!("schema.columns[{i}].name"),
                format!("Duplicate column '{}'", column.name),
            ));
        }
    }
}

fn validate_partitioning(spec: &PipeSpec, errors: &mut Vec<ValidationError>) {
    let partitioning = &spec.partitioning;
    if !partitioning.enabled {
        return;
    }

    if partitioning.keys.is_empty() {
        errors.push(ValidationError::new(
            "partitioning.keys",
            "Partitioning is enabled but no keys are defined",
        ));
    }

    for (i, key) in partitioning.keys.iter().enumerate() {
        if key.column.trim().is_empty() {
            errors.push(ValidationError::new(
                format!("partitioning.keys[{i}].column"),
                "Partition column is required",
            ));
        }

        match key.transform {
            PartitionTransform::Bucket if !matches!(key.bucket_count, Some(n) if n > 0) => {
                errors.push(ValidationError::new(
                    format!("partitioning.keys[{i}].bucketCount"),
                    "Bucket transform requires bucketCount",
                ));
            }
            PartitionTransform::Truncate if !matches!(key.truncate_length, Some(n) if n > 0) => {
                errors.push(ValidationError::new(
                    format!("partitioning.keys[{i}].truncateLength"),
                    "Truncate transform requires truncateLength",
                ));
            }
            _ => {}
        }

        if !spec.schema.infer_from_data
            && !key.column.trim().is_empty()
            && !spec.schema.columns.iter().any(|c| c.name == key.column)
        {
            errors.push(ValidationError::new(
                format!("partitioning.keys[{i}].column"),
                format!("Partition column '{}' is not in the schema", key.column),
            ));
        }
    }
}

fn validate_output(spec: &PipeSpec, errors: &mut Vec<ValidationError>) {
    if spec.output.table_name.trim().is_empty() {
        errors.push(ValidationError::new(
            "output.tableName",
            "Output table name is required",
        ));
    }
}

fn check_regex(field: &str, pattern: &str, errors: &mut Vec<ValidationError>) {
    if let Err(e) = Regex::new(pattern) {
        errors.push(ValidationError::new(
            field,
            format!("Invalid regular expression: {e}"),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipe::model::{
        ColumnType, FilePattern, OnError, OutputConfig, PartitionKey, Partitioning,
        RecordBoundary, Schema, SchemaColumn,
    };

    fn minimal() -> PipeSpec {
        PipeSpec {
            name: "logs".into(),
            description: None,
            storage_path: "/logs".into(),
            file_pattern: FilePattern {
                extensions: vec!["log".into()],
                ..Default::default()
            },
            record_boundary: RecordBoundary::new(RecordFormat::Text {
                line_separator: None,
                multiline_pattern: None,
            }),
            schema: Schema::default(),
            partitioning: Partitioning::default(),
            output: OutputConfig::new("logs"),
        }
    }

    fn fields(errors: &[ValidationError]) -> Vec<&str> {
        errors.iter().map(|e| e.field.as_str()).collect()
    }

    #[test]
    fn minimal_spec_is_accepted() {
        assert!(validate(&minimal()).is_empty());
    }

    #[test]
    fn collects_every_violation() {
        let mut spec = minimal();
        spec.storage_path = "logs".into();
        spec.file_pattern.extensions.clear();
        spec.output.table_name = String::new();

        let errors = validate(&spec);
        assert_eq!(
            fields(&errors),
            vec!["storagePath", "filePattern.extensions", "output.tableName"]
        );
    }

    #[test]
    fn bucket_partition_needs_count() {
        let mut spec = minimal();
        spec.partitioning = Partitioning {
            enabled: true,
            keys: vec![PartitionKey {
                column: "level".into(),
                transform: PartitionTransform::Bucket,
                bucket_count: None,
                truncate_length: None,
            }],
        };

        let errors = validate(&spec);
        assert_eq!(fields(&errors), vec!["partitioning.keys[0].bucketCount"]);
    }

    #[test]
    fn disabled_partitioning_is_not_checked() {
        let mut spec = minimal();
        spec.partitioning.keys.push(PartitionKey {
            column: "level".into(),
            transform: PartitionTransform::Truncate,
            bucket_count: None,
            truncate_length: None,
        });
        assert!(validate(&spec).is_empty());
    }

    #[test]
    fn regex_group_count_must_match_field_names() {
        let mut spec = minimal();
        spec.record_boundary.field_extraction = Some(FieldExtraction {
            method: ExtractionMethod::Regex {
                pattern: r"(\d+) (\w+)".into(),
            },
            field_names: vec!["only_one".into()],
            on_error: OnError::Null,
            field_processing: Vec::new(),
        });

        let errors = validate(&spec);
        assert_eq!(
            fields(&errors),
            vec!["recordBoundary.fieldExtraction.fieldNames"]
        );
        assert!(errors[0].message.contains("2 capture groups"));
    }

    #[test]
    fn explicit_schema_must_contain_partition_columns() {
        let mut spec = minimal();
        spec.schema = Schema {
            infer_from_data: false,
            columns: vec![SchemaColumn::new("message", ColumnType::String)],
        };
        spec.partitioning = Partitioning {
            enabled: true,
            keys: vec![PartitionKey {
                column: "ts".into(),
                transform: PartitionTransform::Day,
                bucket_count: None,
                truncate_length: None,
            }],
        };

        let errors = validate(&spec);
        assert_eq!(fields(&errors), vec!["partitioning.keys[0].column"]);
    }

    #[test]
    fn root_storage_path_is_rejected() {
        let mut spec = minimal();
        spec.storage_path = "/".into();
        assert_eq!(fields(&validate(&spec)), vec!["storagePath"]);
    }
}
