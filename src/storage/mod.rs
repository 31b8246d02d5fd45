// src/storage/mod.rs

//! Folder-shaped view over a flat object key namespace.

pub mod backend;
pub mod path_utils;

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use futures::stream::BoxStream;
use serde::Serialize;
use tracing::{debug, info};

use crate::errors::{DataChefError, Result};
use crate::types::DeleteKind;

pub use backend::{ObjectBackend, ObjectBody, ObjectInfo, ObjectStoreBackend};
use path_utils::{display_path, file_name, join_key, normalize_path};

/// Zero-length object that makes an otherwise empty folder visible.
pub const PLACEHOLDER: &str = ".keep";

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    File,
    Folder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageItem {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

/// A streamed download.
pub struct Download {
    pub file_name: String,
    pub content_type: String,
    pub content_length: u64,
    pub stream: BoxStream<'static, Result<Bytes>>,
}

impl std::fmt::Debug for Download {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Download")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

impl Download {
    /// Drain the stream into memory.
    pub async fn collect(self) -> Result<Bytes> {
        let buf = self
            .stream
            .try_fold(BytesMut::new(), |mut buf, chunk| async move {
                buf.extend_from_slice(&chunk);
                Ok(buf)
            })
            .await?;
        Ok(buf.freeze())
    }
}

#[derive(Debug, Clone)]
pub struct StorageBridge {
    backend: Arc<dyn ObjectBackend>,
}

impl StorageBridge {
    pub fn new(backend: Arc<dyn ObjectBackend>) -> Self {
        Self { backend }
    }

    /// List a folder.
    ///
    /// At the root only first-level folders are returned. Below the root only
    /// the files directly inside the folder are returned, placeholder included.
    pub async fn list(&self, path: &str) -> Result<Vec<StorageItem>> {
        let key = normalize_path(path);
        let listing = self.backend.list_children(&key).await?;

        let items = if key.is_empty() {
            listing
                .prefixes
                .into_iter()
                .map(|prefix| {
                    let prefix = normalize_path(&prefix);
                    StorageItem {
                        name: file_name(&prefix).to_string(),
                        path: display_path(&prefix),
                        kind: ItemKind::Folder,
                        size: None,
                        last_modified: None,
                    }
                })
                .collect()
        } else {
            listing
                .objects
                .into_iter()
                .map(|obj| StorageItem {
                    name: file_name(&obj.key).to_string(),
                    path: display_path(&obj.key),
                    kind: ItemKind::File,
                    size: Some(obj.size),
                    last_modified: Some(obj.last_modified),
                })
                .collect()
        };

        Ok(items)
    }

    /// Write the folder placeholder. Returns the placeholder key.
    pub async fn create_folder(&self, path: &str) -> Result<String> {
        let key = normalize_path(path);
        if key.is_empty() {
            return Err(DataChefError::InvalidRequest(
                "cannot create the root folder".to_string(),
            ));
        }

        let placeholder = join_key(&key, PLACEHOLDER);
        self.backend.put(&placeholder, Bytes::new(), None).await?;
        info!(folder = %key, "folder created");
        Ok(placeholder)
    }

    /// Store one file under `path`. Returns the object key.
    pub async fn upload(
        &self,
        path: &str,
        name: &str,
        body: Bytes,
        content_type: Option<&str>,
    ) -> Result<String> {
        if name.is_empty() || name.contains('/') {
            return Err(DataChefError::InvalidRequest(format!(
                "invalid file name '{name}'"
            )));
        }

        let key = join_key(path, name);
        let content_type = content_type.unwrap_or(DEFAULT_CONTENT_TYPE);
        self.backend.put(&key, body, Some(content_type)).await?;
        debug!(key = %key, content_type, "file uploaded");
        Ok(key)
    }

    pub async fn delete(&self, path: &str, kind: DeleteKind) -> Result<usize> {
        match kind {
            DeleteKind::File => self.delete_file(path).await.map(|()| 1),
            DeleteKind::Folder => self.delete_folder(path).await,
        }
    }

    pub async fn delete_file(&self, path: &str) -> Result<()> {
        let key = normalize_path(path);
        if key.is_empty() {
            return Err(DataChefError::InvalidRequest(
                "a file path is required".to_string(),
            ));
        }
        self.backend.delete(&key).await
    }

    /// Remove every object below the folder. Returns how many were removed.
    pub async fn delete_folder(&self, path: &str) -> Result<usize> {
        let key = normalize_path(path);
        if key.is_empty() {
            return Err(DataChefError::InvalidRequest(
                "refusing to delete the root folder".to_string(),
            ));
        }

        let keys: Vec<String> = self
            .backend
            .list_recursive(&key)
            .await?
            .into_iter()
            .map(|obj| obj.key)
            .collect();

        if keys.is_empty() {
            return Ok(0);
        }

        let removed = self.backend.delete_many(keys).await?;
        info!(folder = %key, removed, "folder deleted");
        Ok(removed)
    }

    pub async fn download(&self, path: &str) -> Result<Download> {
        let key = normalize_path(path);
        let body = self.backend.get(&key).await?;

        Ok(Download {
            file_name: file_name(&key).to_string(),
            content_type: body
                .content_type
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            content_length: body.info.size,
            stream: body.stream,
        })
    }

    /// URI the engine uses to read `path`.
    pub fn engine_uri(&self, path: &str) -> String {
        self.backend.engine_uri(&normalize_path(path))
    }
}
