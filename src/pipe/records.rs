// src/pipe/records.rs

//! Local record splitting and file eligibility, used by record previews.

use regex::Regex;

use crate::pipe::extract::ExtractionError;
use crate::pipe::model::{FilePattern, RecordBoundary, RecordFormat};
use crate::storage::PLACEHOLDER;

/// Split raw text into records according to the boundary.
///
/// Line-oriented formats are supported. Whole-document formats (`json`,
/// `parquet`) are left to the engine.
pub fn split_records(text: &str, boundary: &RecordBoundary) -> Result<Vec<String>, ExtractionError> {
    match &boundary.format {
        RecordFormat::Text {
            line_separator,
            multiline_pattern,
        } => {
            let lines = split_lines(text, line_separator.as_deref().unwrap_or("\n"));
            match multiline_pattern {
                Some(p) => Ok(group_continuations(lines, &compile(p)?)),
                None => Ok(lines),
            }
        }
        RecordFormat::Multiline { multiline_pattern } => {
            let lines = split_lines(text, "\n");
            match multiline_pattern {
                Some(p) => Ok(group_continuations(lines, &compile(p)?)),
                None => Ok(lines),
            }
        }
        RecordFormat::Delimited { has_header, .. } => {
            let mut lines = split_lines(text, "\n");
            if has_header.unwrap_or(true) && !lines.is_empty() {
                lines.remove(0);
            }
            Ok(lines)
        }
        RecordFormat::Jsonl | RecordFormat::Fixed => Ok(split_lines(text, "\n")),
        RecordFormat::Json => Err(ExtractionError::UnsupportedBoundary("json")),
        RecordFormat::Parquet => Err(ExtractionError::UnsupportedBoundary("parquet")),
    }
}

fn split_lines(text: &str, separator: &str) -> Vec<String> {
    text.split(separator)
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}

/// A line matching `start` opens a new record; other lines continue the
/// current one. Leading lines before the first match form their own record.
fn group_continuations(lines: Vec<String>, start: &Regex) -> Vec<String> {
    let mut records: Vec<String> = Vec::new();
    for line in lines {
        if start.is_match(&line) {
            records.push(line);
            continue;
        }
        match records.last_mut() {
            Some(current) => {
                current.push('\n');
                current.push_str(&line);
            }
            None => records.push(line),
        }
    }
    records
}

fn compile(pattern: &str) -> Result<Regex, ExtractionError> {
    Regex::new(pattern).map_err(|e| ExtractionError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

/// Compiled form of a [`FilePattern`].
#[derive(Debug, Clone)]
pub struct FileMatcher {
    extensions: Vec<String>,
    prefix: Option<String>,
    suffix: Option<String>,
    regex: Option<Regex>,
    min_size: Option<u64>,
    max_size: Option<u64>,
}

impl FileMatcher {
    pub fn new(pattern: &FilePattern) -> Result<Self, ExtractionError> {
        Ok(Self {
            extensions: pattern
                .extensions
                .iter()
                .map(|e| e.trim().trim_start_matches('.').to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
            prefix: pattern.prefix.clone().filter(|p| !p.is_empty()),
            suffix: pattern.suffix.clone().filter(|s| !s.is_empty()),
            regex: pattern.regex.as_deref().map(compile).transpose()?,
            min_size: pattern.min_size,
            max_size: pattern.max_size,
        })
    }

    /// Whether a file with this base name and size would be picked up.
    pub fn matches(&self, file_name: &str, size: u64) -> bool {
        if file_name == PLACEHOLDER {
            return false;
        }

        let (stem, extension) = match file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem, ext.to_lowercase()),
            _ => (file_name, String::new()),
        };

        if !self.extensions.iter().any(|e| *e == extension) {
            return false;
        }
        if let Some(prefix) = &self.prefix {
            if !stem.starts_with(prefix.as_str()) {
                return false;
            }
        }
        if let Some(suffix) = &self.suffix {
            if !stem.ends_with(suffix.as_str()) {
                return false;
            }
        }
        if let Some(re) = &self.regex {
            if !re.is_match(file_name) {
                return false;
            }
        }

        self.min_size.is_none_or(|min| size >= min) && self.max_size.is_none_or(|max| size <= max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_boundary(multiline: Option<&str>) -> RecordBoundary {
        RecordBoundary::new(RecordFormat::Text {
            line_separator: None,
            multiline_pattern: multiline.map(str::to_string),
        })
    }

    #[test]
    fn text_records_skip_blank_lines() {
        let records = split_records("a\r\n\nb\n", &text_boundary(None)).unwrap();
        assert_eq!(records, vec!["a", "b"]);
    }

    #[test]
    fn continuation_lines_join_the_previous_record() {
        let text = "2024-01-01 start\n  at frame 1\n  at frame 2\n2024-01-02 next\n";
        let records = split_records(text, &text_boundary(Some(r"^\d{4}-"))).unwrap();
        assert_eq!(
            records,
            vec!["2024-01-01 start\n  at frame 1\n  at frame 2", "2024-01-02 next"]
        );
    }

    #[test]
    fn delimited_header_is_dropped() {
        let boundary = RecordBoundary::new(RecordFormat::Delimited {
            delimiter: Some(",".into()),
            quote: None,
            escape: None,
            has_header: Some(true),
        });
        let records = split_records("a,b\n1,2\n", &boundary).unwrap();
        assert_eq!(records, vec!["1,2"]);
    }

    #[test]
    fn json_documents_are_not_split_locally() {
        let err = split_records("{}", &RecordBoundary::new(RecordFormat::Json)).unwrap_err();
        assert_eq!(err, ExtractionError::UnsupportedBoundary("json"));
    }

    #[test]
    fn file_matcher_checks_every_constraint() {
        let matcher = FileMatcher::new(&FilePattern {
            extensions: vec![".CSV".into()],
            prefix: Some("sales_".into()),
            suffix: Some("_2024".into()),
            regex: None,
            min_size: Some(1),
            max_size: Some(100),
        })
        .unwrap();

        assert!(matcher.matches("sales_q1_2024.csv", 10));
        assert!(!matcher.matches("sales_q1_2023.csv", 10));
        assert!(!matcher.matches("orders_q1_2024.csv", 10));
        assert!(!matcher.matches("sales_q1_2024.txt", 10));
        assert!(!matcher.matches("sales_q1_2024.csv", 0));
        assert!(!matcher.matches("sales_q1_2024.csv", 101));
    }

    #[test]
    fn placeholder_never_matches() {
        let matcher = FileMatcher::new(&FilePattern {
            extensions: vec!["keep".into()],
            ..Default::default()
        })
        .unwrap();
        assert!(!matcher.matches(PLACEHOLDER, 0));
    }
}
