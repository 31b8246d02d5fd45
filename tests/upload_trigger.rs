mod common;
use crate::common::{Harness, PipeSpecBuilder, with_timeout};

use bytes::Bytes;
use datachef::errors::DataChefError;
use datachef::service::UploadFile;
use datachef::types::ExecutionStatus;
use datachef_test_utils::fake_engine::{FakeEngine, FakeResponse};

fn json_file(name: &str) -> UploadFile {
    UploadFile {
        name: name.to_string(),
        content_type: Some("application/json".to_string()),
        body: Bytes::from_static(br#"{"id": 1}"#),
    }
}

#[tokio::test]
async fn upload_into_a_pipe_folder_runs_the_pipe() {
    let h = Harness::new();
    let pipe = h
        .service
        .create_pipe(PipeSpecBuilder::new("events").storage_path("/events").build())
        .await
        .unwrap();

    let outcome = h
        .service
        .upload("/events", vec![json_file("e1.json")])
        .await
        .unwrap();
    assert!(outcome.pipe_executed);
    assert_eq!(outcome.files, vec!["events/e1.json".to_string()]);

    with_timeout(h.service.wait_background()).await;

    let calls = h.engine.invocations();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].config["sourcePath"], "memory://datachef/events");

    let history = h.service.history(Some(&pipe.id), 5).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, ExecutionStatus::Completed);
    assert_eq!(history[0].source_path, "/events");
}

#[tokio::test]
async fn upload_elsewhere_runs_nothing() {
    let h = Harness::new();
    h.service
        .create_pipe(PipeSpecBuilder::new("events").storage_path("/events").build())
        .await
        .unwrap();

    let outcome = h
        .service
        .upload("/scratch", vec![json_file("e1.json")])
        .await
        .unwrap();
    h.service.wait_background().await;

    assert!(!outcome.pipe_executed);
    assert!(h.engine.invocations().is_empty());
}

#[tokio::test]
async fn upload_while_busy_skips_the_trigger() {
    let h = Harness::with_engine(FakeEngine::answering(FakeResponse::HangUntilCancelled));
    let pipe = h
        .service
        .create_pipe(PipeSpecBuilder::new("events").storage_path("/events").build())
        .await
        .unwrap();

    let running = {
        let service = h.service.clone();
        let id = pipe.id.clone();
        tokio::spawn(async move {
            service
                .execute(&id, None, datachef::engine::LogSink::discard())
                .await
        })
    };
    with_timeout(h.engine.wait_started()).await;

    h.service
        .upload("/events", vec![json_file("e2.json")])
        .await
        .unwrap();
    with_timeout(h.service.wait_background()).await;
    assert_eq!(h.engine.invocations().len(), 1);

    h.service.cancel_execution();
    with_timeout(running).await.unwrap().unwrap();
}

#[tokio::test]
async fn upload_limits_are_enforced_before_storing() {
    let h = Harness::new();
    h.service
        .config()
        .update(|cfg| {
            cfg.upload.max_files = 1;
            cfg.upload.max_file_bytes = 4;
        })
        .unwrap();

    let err = h
        .service
        .upload("/x", vec![json_file("a.json"), json_file("b.json")])
        .await
        .unwrap_err();
    assert!(matches!(err, DataChefError::InvalidRequest(_)));

    let err = h
        .service
        .upload("/x", vec![json_file("a.json")])
        .await
        .unwrap_err();
    assert!(matches!(err, DataChefError::InvalidRequest(_)));

    let err = h.service.upload("/x", Vec::new()).await.unwrap_err();
    assert!(matches!(err, DataChefError::InvalidRequest(_)));

    assert_eq!(h.storage.calls(), 0);
}

#[tokio::test]
async fn finished_background_runs_are_not_retained() {
    let h = Harness::new();
    let pipe = h
        .service
        .create_pipe(PipeSpecBuilder::new("events").storage_path("/events").build())
        .await
        .unwrap();

    for name in ["e1.json", "e2.json"] {
        h.service.upload("/events", vec![json_file(name)]).await.unwrap();
        with_timeout(async {
            while h.service.pending_background() > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        })
        .await;
    }

    assert_eq!(h.engine.invocations().len(), 2);
    assert_eq!(h.service.history(Some(&pipe.id), 5).unwrap().len(), 2);
}
