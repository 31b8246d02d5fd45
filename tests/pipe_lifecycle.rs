mod common;
use crate::common::{Harness, PipeSpecBuilder};

use datachef::errors::DataChefError;
use datachef::pipe::model::PipePatch;
use datachef::types::DeleteOutcome;

#[tokio::test]
async fn create_then_get_round_trips() {
    let h = Harness::new();
    let spec = PipeSpecBuilder::new("app logs")
        .storage_path("/logs")
        .description("nightly app logs")
        .extensions(&["log"])
        .regex(r"^(\S+) (.*)$", &["ts", "message"])
        .table("app_logs")
        .build();

    let created = h.service.create_pipe(spec.clone()).await.unwrap();
    let fetched = h.service.get_pipe(&created.id).unwrap();

    assert_eq!(fetched, created);
    assert_eq!(fetched.spec, spec);
    assert_eq!(fetched.created_at, fetched.updated_at);
    assert_eq!(h.storage.ops(), vec!["put logs/.keep".to_string()]);
}

#[tokio::test]
async fn update_keeps_identity_and_advances_updated_at() {
    let h = Harness::new();
    let created = h
        .service
        .create_pipe(PipeSpecBuilder::new("orders").storage_path("/orders").build())
        .await
        .unwrap();

    let patch = PipePatch {
        description: Some("renamed source".to_string()),
        ..Default::default()
    };
    let updated = h.service.update_pipe(&created.id, patch).await.unwrap();

    assert_eq!(updated.id, created.id);
    assert_eq!(updated.created_at, created.created_at);
    assert!(updated.updated_at > created.updated_at);
    assert_eq!(updated.spec.description.as_deref(), Some("renamed source"));
    // same folder, nothing new provisioned
    assert_eq!(h.storage.calls(), 1);
}

#[tokio::test]
async fn moving_the_storage_path_provisions_the_new_folder() {
    let h = Harness::new();
    let created = h
        .service
        .create_pipe(PipeSpecBuilder::new("orders").storage_path("/orders").build())
        .await
        .unwrap();

    let patch = PipePatch {
        storage_path: Some("/orders-v2".to_string()),
        ..Default::default()
    };
    h.service.update_pipe(&created.id, patch).await.unwrap();

    assert!(h.storage.ops().contains(&"put orders-v2/.keep".to_string()));
}

#[tokio::test]
async fn relative_storage_path_is_rejected_without_storage_calls() {
    let h = Harness::new();
    let spec = PipeSpecBuilder::new("bad").storage_path("logs").build();

    let err = h.service.create_pipe(spec).await.unwrap_err();

    match err {
        DataChefError::Validation(violations) => {
            assert!(violations.iter().any(|v| v.field == "storagePath"));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(h.storage.calls(), 0);
    assert!(h.service.list_pipes().unwrap().is_empty());
}

#[tokio::test]
async fn storage_failure_on_create_stores_nothing() {
    let h = Harness::new();
    h.storage.fail_puts(true);

    let err = h
        .service
        .create_pipe(PipeSpecBuilder::new("x").build())
        .await
        .unwrap_err();

    assert!(matches!(err, DataChefError::Storage(_)));
    assert!(h.service.list_pipes().unwrap().is_empty());
}

#[tokio::test]
async fn deleting_an_unknown_pipe_touches_no_storage() {
    let h = Harness::new();

    let err = h.service.delete_pipe("does-not-exist").await.unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(h.storage.calls(), 0);
}

#[tokio::test]
async fn delete_removes_folder_and_row() {
    let h = Harness::new();
    let pipe = h
        .service
        .create_pipe(PipeSpecBuilder::new("tmp").storage_path("/tmp-data").build())
        .await
        .unwrap();

    let outcome = h.service.delete_pipe(&pipe.id).await.unwrap();

    assert_eq!(outcome, DeleteOutcome::Deleted);
    assert!(h.service.get_pipe(&pipe.id).unwrap_err().is_not_found());
    assert!(h.service.list_storage("/").await.unwrap().is_empty());
}

#[tokio::test]
async fn folder_delete_failure_still_deletes_the_pipe() {
    let h = Harness::new();
    let pipe = h
        .service
        .create_pipe(PipeSpecBuilder::new("tmp").storage_path("/tmp-data").build())
        .await
        .unwrap();
    h.storage.fail_deletes(true);

    let outcome = h.service.delete_pipe(&pipe.id).await.unwrap();

    assert!(outcome.warning().is_some());
    assert!(h.service.get_pipe(&pipe.id).unwrap_err().is_not_found());
}

#[tokio::test]
async fn seeding_defaults_is_idempotent() {
    let h = Harness::new();

    let first = h.service.seed_default_pipes().await.unwrap();
    let second = h.service.seed_default_pipes().await.unwrap();

    assert_eq!(first.len(), 2);
    assert!(second.is_empty());
    assert_eq!(h.service.list_pipes().unwrap().len(), 2);
}

#[tokio::test]
async fn check_reports_every_violation_without_storing() {
    let h = Harness::new();
    let mut spec = PipeSpecBuilder::new("").storage_path("nope").build();
    spec.output.table_name.clear();

    let violations = h.service.check_pipe(&spec);

    let fields: Vec<&str> = violations.iter().map(|v| v.field.as_str()).collect();
    assert!(fields.contains(&"name"));
    assert!(fields.contains(&"storagePath"));
    assert!(fields.contains(&"output.tableName"));
    assert_eq!(h.storage.calls(), 0);
}
