// src/pipe/extract.rs

//! Apply a [`FieldExtraction`] to a single record.
//!
//! The engine does the real parsing; this is the local counterpart used to
//! preview what a pipe would produce from a sample file.

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::ser::{Serialize, SerializeMap, Serializer};
use thiserror::Error;

use crate::pipe::model::{
    ExtractionMethod, FieldExtraction, FieldProcessing, OnError, Replacement, SplitStep,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("expected {expected} fields but extraction produced {produced}")]
    FieldCount { expected: usize, produced: usize },

    #[error("pattern did not match record")]
    NoMatch,

    #[error("invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("processing field '{field}' failed: {message}")]
    Processing { field: String, message: String },

    #[error("record boundary '{0}' cannot be split locally")]
    UnsupportedBoundary(&'static str),
}

/// A single extracted value. `keepAll` split steps produce lists.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::List(_) => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

/// Named fields in declaration order. Missing values are `None`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    fields: Vec<(String, Option<FieldValue>)>,
}

impl Record {
    pub fn new(fields: Vec<(String, Option<FieldValue>)>) -> Self {
        Self { fields }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| v.as_ref())
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_text)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// One-shot convenience over [`Extractor`].
pub fn apply(extraction: &FieldExtraction, record: &str) -> Result<Option<Record>, ExtractionError> {
    Extractor::new(extraction)?.apply(record)
}

/// A compiled field extraction, reusable across records.
#[derive(Debug, Clone)]
pub struct Extractor {
    method: CompiledMethod,
    field_names: Vec<String>,
    on_error: OnError,
    processing: Vec<CompiledProcessing>,
}

#[derive(Debug, Clone)]
enum CompiledMethod {
    Regex(Regex),
    Delimiter(String),
    Fixed(Vec<usize>),
    Split(Vec<SplitStep>),
}

#[derive(Debug, Clone)]
struct CompiledProcessing {
    field: String,
    index: usize,
    trim: bool,
    replace: Vec<Replacement>,
    regex: Option<Regex>,
    date_format: Option<String>,
}

impl Extractor {
    pub fn new(extraction: &FieldExtraction) -> Result<Self, ExtractionError> {
        let method = match &extraction.method {
            ExtractionMethod::Regex { pattern } => CompiledMethod::Regex(compile(pattern)?),
            ExtractionMethod::Delimiter { field_delimiter } => {
                CompiledMethod::Delimiter(field_delimiter.clone())
            }
            ExtractionMethod::Fixed { fixed_widths } => CompiledMethod::Fixed(fixed_widths.clone()),
            ExtractionMethod::Split { split_steps } => CompiledMethod::Split(split_steps.clone()),
        };

        let processing = extraction
            .field_processing
            .iter()
            .filter_map(|p| {
                let index = extraction.field_names.iter().position(|n| *n == p.field)?;
                Some(CompiledProcessing::new(p, index))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            method,
            field_names: extraction.field_names.clone(),
            on_error: extraction.on_error,
            processing,
        })
    }

    /// Extract one record. `Ok(None)` means the record was skipped.
    pub fn apply(&self, record: &str) -> Result<Option<Record>, ExtractionError> {
        let expected = self.field_names.len();

        let mut values = match self.raw_values(record) {
            Ok(values) if values.len() == expected => values,
            Ok(mut values) => {
                let fault = ExtractionError::FieldCount {
                    expected,
                    produced: values.len(),
                };
                match self.on_error {
                    OnError::Skip => return Ok(None),
                    OnError::Fail => return Err(fault),
                    OnError::Null => {
                        values.resize(expected, None);
                        values
                    }
                }
            }
            Err(fault) => match self.on_error {
                OnError::Skip => return Ok(None),
                OnError::Fail => return Err(fault),
                OnError::Null => vec![None; expected],
            },
        };

        for step in &self.processing {
            let Some(slot) = values.get_mut(step.index) else {
                continue;
            };
            let Some(value) = slot.take() else {
                continue;
            };
            match step.run(value) {
                Ok(processed) => *slot = Some(processed),
                Err(fault) => match self.on_error {
                    OnError::Skip => return Ok(None),
                    OnError::Fail => return Err(fault),
                    OnError::Null => {}
                },
            }
        }

        Ok(Some(Record::new(
            self.field_names.iter().cloned().zip(values).collect(),
        )))
    }

    fn raw_values(&self, record: &str) -> Result<Vec<Option<FieldValue>>, ExtractionError> {
        match &self.method {
            CompiledMethod::Regex(re) => {
                let caps = re.captures(record).ok_or(ExtractionError::NoMatch)?;
                Ok(caps
                    .iter()
                    .skip(1)
                    .map(|m| m.map(|m| FieldValue::from(m.as_str())))
                    .collect())
            }
            CompiledMethod::Delimiter(delimiter) => Ok(record
                .split(delimiter.as_str())
                .map(|token| Some(FieldValue::from(token)))
                .collect()),
            CompiledMethod::Fixed(widths) => Ok(slice_fixed(record, widths)),
            CompiledMethod::Split(steps) => Ok(run_split(record, steps)
                .into_iter()
                .map(Some)
                .collect()),
        }
    }
}

/// Slice by character widths. A field that starts past the end of the
/// record is missing; one that is only partially covered keeps what is there.
fn slice_fixed(record: &str, widths: &[usize]) -> Vec<Option<FieldValue>> {
    let chars: Vec<char> = record.chars().collect();
    let mut values = Vec::with_capacity(widths.len());
    let mut offset = 0;

    for &width in widths {
        if offset >= chars.len() {
            break;
        }
        let end = (offset + width).min(chars.len());
        values.push(Some(FieldValue::Text(chars[offset..end].iter().collect())));
        offset += width;
    }

    values
}

fn run_split(record: &str, steps: &[SplitStep]) -> Vec<FieldValue> {
    let mut current = vec![FieldValue::Text(record.to_string())];

    for step in steps {
        let mut next = Vec::new();
        for value in current {
            let text = match value {
                FieldValue::Text(text) => text,
                // lists are terminal
                list @ FieldValue::List(_) => {
                    next.push(list);
                    continue;
                }
            };
            let parts: Vec<&str> = text.split(step.delimiter.as_str()).collect();
            match step.index {
                Some(i) => {
                    if let Some(part) = parts.get(i) {
                        next.push(FieldValue::from(*part));
                    }
                }
                None if step.keep_all => {
                    next.push(FieldValue::List(
                        parts.into_iter().map(str::to_string).collect(),
                    ));
                }
                None => next.extend(parts.into_iter().map(FieldValue::from)),
            }
        }
        current = next;
    }

    current
}

impl CompiledProcessing {
    fn new(spec: &FieldProcessing, index: usize) -> Result<Self, ExtractionError> {
        Ok(Self {
            field: spec.field.clone(),
            index,
            trim: spec.trim,
            replace: spec.replace.clone(),
            regex: spec.regex.as_deref().map(compile).transpose()?,
            date_format: spec.date_format.clone(),
        })
    }

    fn run(&self, value: FieldValue) -> Result<FieldValue, ExtractionError> {
        match value {
            FieldValue::Text(text) => self.run_text(text).map(FieldValue::Text),
            FieldValue::List(items) => items
                .into_iter()
                .map(|item| self.run_text(item))
                .collect::<Result<Vec<_>, _>>()
                .map(FieldValue::List),
        }
    }

    /// trim, then replacements, then secondary regex, then date parsing.
    fn run_text(&self, text: String) -> Result<String, ExtractionError> {
        let mut text = if self.trim {
            text.trim().to_string()
        } else {
            text
        };

        for replacement in &self.replace {
            text = text.replace(&replacement.from, &replacement.to);
        }

        if let Some(re) = &self.regex {
            let caps = re.captures(&text).ok_or_else(|| self.failure(format!(
                "value '{text}' does not match '{}'",
                re.as_str()
            )))?;
            text = caps
                .get(1)
                .or_else(|| caps.get(0))
                .map_or_else(String::new, |m| m.as_str().to_string());
        }

        if let Some(format) = &self.date_format {
            text = normalize_date(&text, format).map_err(|e| {
                self.failure(format!("value '{text}' does not match date format '{format}': {e}"))
            })?;
        }

        Ok(text)
    }

    fn failure(&self, message: String) -> ExtractionError {
        ExtractionError::Processing {
            field: self.field.clone(),
            message,
        }
    }
}

/// Parse with a strftime format and render as ISO-8601.
fn normalize_date(text: &str, format: &str) -> Result<String, chrono::ParseError> {
    match NaiveDateTime::parse_from_str(text, format) {
        Ok(dt) => Ok(dt.format("%Y-%m-%dT%H:%M:%S").to_string()),
        Err(_) => NaiveDate::parse_from_str(text, format).map(|d| d.format("%Y-%m-%d").to_string()),
    }
}

fn compile(pattern: &str) -> Result<Regex, ExtractionError> {
    Regex::new(pattern).map_err(|e| ExtractionError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}
