mod common;
use crate::common::{Harness, PipeSpecBuilder};

use bytes::Bytes;
use datachef::pipe::extract::{ExtractionError, FieldValue, apply};
use datachef::pipe::model::{ExtractionMethod, FieldExtraction, OnError, RecordFormat};
use datachef::service::UploadFile;

const LOG_PATTERN: &str = r"^(\d{4}-\d{2}-\d{2}) \[(\w+)\] (.*)";

fn fixed_4_1_4(on_error: OnError) -> FieldExtraction {
    FieldExtraction {
        method: ExtractionMethod::Fixed {
            fixed_widths: vec![4, 1, 4],
        },
        field_names: vec!["code".into(), "flag".into(), "amount".into()],
        on_error,
        field_processing: Vec::new(),
    }
}

#[test]
fn regex_extraction_names_each_group() {
    let extraction = FieldExtraction {
        method: ExtractionMethod::Regex {
            pattern: LOG_PATTERN.to_string(),
        },
        field_names: vec!["timestamp".into(), "level".into(), "message".into()],
        on_error: OnError::Fail,
        field_processing: Vec::new(),
    };

    let record = apply(&extraction, "2024-01-01 [ERROR] disk full")
        .unwrap()
        .unwrap();

    assert_eq!(record.text("timestamp"), Some("2024-01-01"));
    assert_eq!(record.text("level"), Some("ERROR"));
    assert_eq!(record.text("message"), Some("disk full"));
    assert_eq!(
        serde_json::to_value(&record).unwrap(),
        serde_json::json!({"timestamp": "2024-01-01", "level": "ERROR", "message": "disk full"})
    );
}

#[test]
fn short_fixed_record_under_null_policy_yields_null_field() {
    let record = apply(&fixed_4_1_4(OnError::Null), "abcdX").unwrap().unwrap();

    assert_eq!(record.get("code"), Some(&FieldValue::from("abcd")));
    assert_eq!(record.text("flag"), Some("X"));
    assert_eq!(record.get("amount"), None);
    assert_eq!(record.len(), 3);
}

#[test]
fn short_fixed_record_under_skip_policy_is_dropped() {
    assert_eq!(apply(&fixed_4_1_4(OnError::Skip), "abcdX").unwrap(), None);
}

#[test]
fn short_fixed_record_under_fail_policy_raises() {
    let err = apply(&fixed_4_1_4(OnError::Fail), "abcdX").unwrap_err();
    assert_eq!(
        err,
        ExtractionError::FieldCount {
            expected: 3,
            produced: 2
        }
    );
}

#[tokio::test]
async fn preview_runs_the_pipe_over_an_uploaded_object() {
    let h = Harness::new();
    let pipe = h
        .service
        .create_pipe(
            PipeSpecBuilder::new("app logs")
                .storage_path("/app-logs")
                .extensions(&["log"])
                .format(RecordFormat::Text {
                    line_separator: None,
                    multiline_pattern: Some(r"^\d{4}-\d{2}-\d{2} ".to_string()),
                })
                .regex(r"(?s)^(\d{4}-\d{2}-\d{2}) \[(\w+)\] (.*)", &["timestamp", "level", "message"])
                .build(),
        )
        .await
        .unwrap();

    let body = "2024-01-01 [ERROR] disk full\n  at volume /dev/sda1\n2024-01-02 [INFO] recovered\n";
    h.service
        .upload(
            "/app-logs",
            vec![UploadFile {
                name: "app.log".into(),
                content_type: Some("text/plain".into()),
                body: Bytes::from(body),
            }],
        )
        .await
        .unwrap();
    h.service.wait_background().await;

    let records = h
        .service
        .preview_records(&pipe.id, "/app-logs/app.log", 10)
        .await
        .unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].text("message"), Some("disk full\n  at volume /dev/sda1"));
    assert_eq!(records[1].text("level"), Some("INFO"));
}
