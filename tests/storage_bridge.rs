mod common;
use crate::common::Harness;

use bytes::Bytes;
use datachef::errors::DataChefError;
use datachef::service::UploadFile;
use datachef::storage::ItemKind;
use datachef::types::DeleteKind;

fn file(name: &str, body: &str) -> UploadFile {
    UploadFile {
        name: name.to_string(),
        content_type: Some("text/plain".to_string()),
        body: Bytes::from(body.to_string()),
    }
}

#[tokio::test]
async fn root_lists_folders_and_folders_list_files() {
    let h = Harness::new();
    h.service.create_folder("/sales").await.unwrap();
    h.service
        .upload("/sales", vec![file("q1.csv", "a,b\n1,2\n")])
        .await
        .unwrap();

    let root = h.service.list_storage("/").await.unwrap();
    assert_eq!(root.len(), 1);
    assert_eq!(root[0].name, "sales");
    assert_eq!(root[0].path, "/sales");
    assert_eq!(root[0].kind, ItemKind::Folder);

    let mut names: Vec<String> = h
        .service
        .list_storage("/sales")
        .await
        .unwrap()
        .into_iter()
        .map(|i| i.name)
        .collect();
    names.sort();
    assert_eq!(names, vec![".keep", "q1.csv"]);
}

#[tokio::test]
async fn recursive_delete_removes_nested_objects() {
    let h = Harness::new();
    h.service.create_folder("/raw").await.unwrap();
    h.service
        .upload("/raw", vec![file("a.txt", "a"), file("b.txt", "b")])
        .await
        .unwrap();
    h.service
        .upload("/raw/2024/01", vec![file("c.txt", "c")])
        .await
        .unwrap();

    let removed = h
        .service
        .delete_storage("/raw", DeleteKind::Folder)
        .await
        .unwrap();

    assert_eq!(removed, 4);
    assert!(h.service.list_storage("/raw").await.unwrap().is_empty());
    assert!(h.service.list_storage("/raw/2024/01").await.unwrap().is_empty());
    assert!(h.service.list_storage("/").await.unwrap().is_empty());
}

#[tokio::test]
async fn root_cannot_be_deleted_or_created() {
    let h = Harness::new();

    let err = h
        .service
        .delete_storage("/", DeleteKind::Folder)
        .await
        .unwrap_err();
    assert!(matches!(err, DataChefError::InvalidRequest(_)));
    assert!(h.service.create_folder("/").await.is_err());
    assert_eq!(h.storage.calls(), 0);
}

#[tokio::test]
async fn download_streams_body_and_content_type() {
    let h = Harness::new();
    h.service
        .upload("/docs", vec![file("readme.txt", "hello chef")])
        .await
        .unwrap();

    let download = h.service.download("/docs/readme.txt").await.unwrap();
    assert_eq!(download.file_name, "readme.txt");
    assert_eq!(download.content_type, "text/plain");
    assert_eq!(download.content_length, 10);
    assert_eq!(download.collect().await.unwrap(), Bytes::from("hello chef"));
}

#[tokio::test]
async fn missing_object_is_not_found() {
    let h = Harness::new();
    let err = h.service.download("/docs/nope.txt").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn single_file_delete_leaves_siblings() {
    let h = Harness::new();
    h.service
        .upload("/docs", vec![file("a.txt", "a"), file("b.txt", "b")])
        .await
        .unwrap();

    h.service
        .delete_storage("/docs/a.txt", DeleteKind::File)
        .await
        .unwrap();

    let names: Vec<String> = h
        .service
        .list_storage("/docs")
        .await
        .unwrap()
        .into_iter()
        .map(|i| i.name)
        .collect();
    assert_eq!(names, vec!["b.txt"]);
}

#[tokio::test]
async fn upload_rejects_names_with_slashes() {
    let h = Harness::new();
    let err = h
        .service
        .upload("/docs", vec![file("../escape.txt", "x")])
        .await
        .unwrap_err();
    assert!(matches!(err, DataChefError::InvalidRequest(_)));
}
