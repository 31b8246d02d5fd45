#![allow(dead_code)]

use datachef::pipe::model::{
    ExtractionMethod, FieldExtraction, FilePattern, OnError, OutputConfig, Partitioning,
    PipeSpec, RecordBoundary, RecordFormat, Schema,
};

/// Builder for `PipeSpec` to simplify test setup.
///
/// Starts from a valid text pipe over `/incoming` writing to `incoming`.
pub struct PipeSpecBuilder {
    spec: PipeSpec,
}

impl PipeSpecBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            spec: PipeSpec {
                name: name.to_string(),
                description: None,
                storage_path: "/incoming".to_string(),
                file_pattern: FilePattern::default(),
                record_boundary: RecordBoundary {
                    format: RecordFormat::Text {
                        line_separator: None,
                        multiline_pattern: None,
                    },
                    encoding: None,
                    field_extraction: None,
                },
                schema: Schema::default(),
                partitioning: Partitioning::default(),
                output: OutputConfig::new("incoming"),
            },
        }
    }

    pub fn storage_path(mut self, path: &str) -> Self {
        self.spec.storage_path = path.to_string();
        self
    }

    pub fn description(mut self, text: &str) -> Self {
        self.spec.description = Some(text.to_string());
        self
    }

    pub fn extensions(mut self, exts: &[&str]) -> Self {
        self.spec.file_pattern.extensions = exts.iter().map(|e| e.to_string()).collect();
        self
    }

    pub fn format(mut self, format: RecordFormat) -> Self {
        self.spec.record_boundary.format = format;
        self
    }

    pub fn regex(self, pattern: &str, fields: &[&str]) -> Self {
        self.extraction(
            ExtractionMethod::Regex {
                pattern: pattern.to_string(),
            },
            fields,
            OnError::Null,
        )
    }

    pub fn fixed(self, widths: &[usize], fields: &[&str], on_error: OnError) -> Self {
        self.extraction(
            ExtractionMethod::Fixed {
                fixed_widths: widths.to_vec(),
            },
            fields,
            on_error,
        )
    }

    pub fn extraction(mut self, method: ExtractionMethod, fields: &[&str], on_error: OnError) -> Self {
        self.spec.record_boundary.field_extraction = Some(FieldExtraction {
            method,
            field_names: fields.iter().map(|f| f.to_string()).collect(),
            on_error,
            field_processing: Vec::new(),
        });
        self
    }

    pub fn table(mut self, table: &str) -> Self {
        self.spec.output = OutputConfig::new(table);
        self
    }

    pub fn build(self) -> PipeSpec {
        self.spec
    }
}
