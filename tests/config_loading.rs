use std::io::Write;

use datachef::PipeService;
use datachef::config::ConfigHandle;
use datachef::config::loader::{load_and_validate, load_from_path, load_or_default};
use datachef::config::model::{AppConfig, StorageKind};
use datachef::errors::DataChefError;
use datachef_test_utils::builders::PipeSpecBuilder;
use tempfile::{NamedTempFile, tempdir};

#[test]
fn partial_file_falls_back_to_defaults() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[storage]
endpoint = "minio.internal"
bucket = "lake"

[engine]
master_url = "spark://spark-master:7077"
"#
    )
    .unwrap();

    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.storage.endpoint, "minio.internal");
    assert_eq!(cfg.storage.bucket, "lake");
    assert_eq!(cfg.storage.port, 9000);
    assert_eq!(cfg.engine.master_url, "spark://spark-master:7077");
    assert_eq!(cfg.iceberg, AppConfig::default().iceberg);
}

#[test]
fn missing_file_yields_defaults() {
    let dir = tempdir().unwrap();
    let cfg = load_or_default(dir.path().join("DataChef.toml")).unwrap();
    assert_eq!(cfg, AppConfig::default());
}

#[test]
fn semantic_errors_are_config_errors() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "[storage]\nbucket = \"\"\n").unwrap();

    match load_and_validate(file.path()) {
        Err(DataChefError::ConfigError(msg)) => assert!(msg.contains("bucket")),
        other => panic!("expected config error, got {other:?}"),
    }
}

#[test]
fn syntax_errors_are_reported() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "[storage\nport = ").unwrap();
    assert!(matches!(
        load_from_path(file.path()),
        Err(DataChefError::TomlError(_))
    ));
}

#[test]
fn runtime_updates_are_persisted() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("DataChef.toml");
    let handle = ConfigHandle::new(AppConfig::default(), &path);

    handle.set("storage.port", "9100").unwrap();
    handle.set("iceberg.warehouse", "s3a://lake/warehouse").unwrap();

    let reloaded = load_from_path(&path).unwrap();
    assert_eq!(reloaded.storage.port, 9100);
    assert_eq!(reloaded.iceberg.warehouse, "s3a://lake/warehouse");
    assert_eq!(reloaded, handle.snapshot());
}

#[test]
fn rejected_updates_leave_file_and_snapshot_untouched() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("DataChef.toml");
    let handle = ConfigHandle::new(AppConfig::default(), &path);

    assert!(handle.set("upload.max_files", "0").is_err());
    assert!(handle.set("nosuch.key", "1").is_err());
    assert_eq!(handle.snapshot(), AppConfig::default());
    assert!(!path.exists());
}

#[tokio::test]
async fn service_from_config_uses_local_storage_and_file_catalog() {
    let dir = tempdir().unwrap();
    let mut cfg = AppConfig::default();
    cfg.storage.kind = StorageKind::Local;
    cfg.storage.local_root = dir.path().join("objects");
    cfg.catalog.db_path = Some(dir.path().join("catalog/pipes.db"));

    let handle = ConfigHandle::in_memory(cfg.clone());
    let service = PipeService::from_config(handle).unwrap();
    let pipe = service
        .create_pipe(PipeSpecBuilder::new("local").storage_path("/landing").build())
        .await
        .unwrap();

    assert!(dir.path().join("objects/landing/.keep").exists());

    // a second service over the same files sees the pipe
    let reopened = PipeService::from_config(ConfigHandle::in_memory(cfg)).unwrap();
    assert_eq!(reopened.get_pipe(&pipe.id).unwrap(), pipe);
}
