// src/storage/backend.rs

//! Object storage backends.
//!
//! [`ObjectBackend`] is the seam the storage bridge talks to. The production
//! implementation wraps any `object_store` store (S3/MinIO, local directory,
//! in-memory); tests wrap it again to count calls or inject failures.

use std::fmt::Debug;
use std::path::Path as FsPath;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{Attribute, AttributeValue, Attributes, ObjectMeta, ObjectStore, PutOptions, PutPayload};
use serde::Serialize;
use tracing::debug;

use crate::config::model::{StorageConfig, StorageKind};
use crate::errors::{DataChefError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

impl From<ObjectMeta> for ObjectInfo {
    fn from(meta: ObjectMeta) -> Self {
        Self {
            key: meta.location.to_string(),
            size: meta.size as u64,
            last_modified: meta.last_modified,
        }
    }
}

/// Immediate children of a prefix.
#[derive(Debug, Clone, Default)]
pub struct Listing {
    pub objects: Vec<ObjectInfo>,
    /// Child "folders", as keys without a trailing slash.
    pub prefixes: Vec<String>,
}

/// A readable object: metadata plus its body as a byte stream.
pub struct ObjectBody {
    pub info: ObjectInfo,
    pub content_type: Option<String>,
    pub stream: BoxStream<'static, Result<Bytes>>,
}

impl std::fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectBody")
            .field("info", &self.info)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait ObjectBackend: Send + Sync + Debug {
    async fn put(&self, key: &str, body: Bytes, content_type: Option<&str>) -> Result<()>;

    /// Objects and common prefixes directly below `prefix` (`""` is the root).
    async fn list_children(&self, prefix: &str) -> Result<Listing>;

    /// Every object below `prefix`, at any depth.
    async fn list_recursive(&self, prefix: &str) -> Result<Vec<ObjectInfo>>;

    async fn get(&self, key: &str) -> Result<ObjectBody>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Remove many keys in one request where the store supports it.
    async fn delete_many(&self, keys: Vec<String>) -> Result<usize>;

    /// URI under which the engine can read `key`.
    fn engine_uri(&self, key: &str) -> String;
}

/// [`ObjectBackend`] over an `object_store` implementation.
#[derive(Debug, Clone)]
pub struct ObjectStoreBackend {
    store: Arc<dyn ObjectStore>,
    uri_base: String,
    store_content_types: bool,
}

impl ObjectStoreBackend {
    pub fn new(store: Arc<dyn ObjectStore>, uri_base: impl Into<String>) -> Self {
        Self {
            store,
            uri_base: uri_base.into(),
            store_content_types: true,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()), "memory://datachef")
    }

    /// Objects as files under `root`. Content types are not persisted.
    pub fn local(root: &FsPath) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        let store = LocalFileSystem::new_with_prefix(root).map_err(storage_error)?;
        Ok(Self {
            store: Arc::new(store),
            uri_base: format!("file://{}", root.display()),
            store_content_types: false,
        })
    }

    /// S3-compatible endpoint (MinIO in the default setup).
    pub fn s3(cfg: &StorageConfig) -> Result<Self> {
        let scheme = if cfg.use_ssl { "https" } else { "http" };
        let endpoint = format!("{scheme}://{}:{}", cfg.endpoint, cfg.port);

        let store = AmazonS3Builder::new()
            .with_endpoint(endpoint)
            .with_bucket_name(&cfg.bucket)
            .with_region(&cfg.region)
            .with_access_key_id(&cfg.access_key)
            .with_secret_access_key(&cfg.secret_key)
            .with_allow_http(!cfg.use_ssl)
            .with_virtual_hosted_style_request(false)
            .build()
            .map_err(storage_error)?;

        Ok(Self::new(Arc::new(store), format!("s3a://{}", cfg.bucket)))
    }

    pub fn from_config(cfg: &StorageConfig) -> Result<Self> {
        match cfg.kind {
            StorageKind::S3 => Self::s3(cfg),
            StorageKind::Local => Self::local(&cfg.local_root),
            StorageKind::Memory => Ok(Self::in_memory()),
        }
    }
}

#[async_trait]
impl ObjectBackend for ObjectStoreBackend {
    async fn put(&self, key: &str, body: Bytes, content_type: Option<&str>) -> Result<()> {
        let mut attributes = Attributes::new();
        if let (true, Some(ct)) = (self.store_content_types, content_type) {
            attributes.insert(Attribute::ContentType, AttributeValue::from(ct.to_string()));
        }
        let opts = PutOptions {
            attributes,
            ..Default::default()
        };

        debug!(key, bytes = body.len(), "put object");
        self.store
            .put_opts(&Path::from(key), PutPayload::from(body), opts)
            .await
            .map_err(storage_error)?;
        Ok(())
    }

    async fn list_children(&self, prefix: &str) -> Result<Listing> {
        let prefix = (!prefix.is_empty()).then(|| Path::from(prefix));
        let result = self
            .store
            .list_with_delimiter(prefix.as_ref())
            .await
            .map_err(storage_error)?;

        Ok(Listing {
            objects: result.objects.into_iter().map(ObjectInfo::from).collect(),
            prefixes: result
                .common_prefixes
                .into_iter()
                .map(|p| p.to_string())
                .collect(),
        })
    }

    async fn list_recursive(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        let prefix = (!prefix.is_empty()).then(|| Path::from(prefix));
        let metas: Vec<ObjectMeta> = self
            .store
            .list(prefix.as_ref())
            .try_collect()
            .await
            .map_err(storage_error)?;
        Ok(metas.into_iter().map(ObjectInfo::from).collect())
    }

    async fn get(&self, key: &str) -> Result<ObjectBody> {
        let result = self
            .store
            .get(&Path::from(key))
            .await
            .map_err(storage_error)?;

        let content_type = result.attributes.get(&Attribute::ContentType).map(|v| {
            let s: &str = v.as_ref();
            s.to_string()
        });
        let info = ObjectInfo::from(result.meta.clone());
        let stream = result.into_stream().map_err(storage_error).boxed();

        Ok(ObjectBody {
            info,
            content_type,
            stream,
        })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.store
            .delete(&Path::from(key))
            .await
            .map_err(storage_error)
    }

    async fn delete_many(&self, keys: Vec<String>) -> Result<usize> {
        let locations = stream::iter(
            keys.into_iter()
                .map(|k| Ok::<Path, object_store::Error>(Path::from(k))),
        )
        .boxed();

        let deleted: Vec<Path> = self
            .store
            .delete_stream(locations)
            .try_collect()
            .await
            .map_err(storage_error)?;
        Ok(deleted.len())
    }

    fn engine_uri(&self, key: &str) -> String {
        format!("{}/{}", self.uri_base.trim_end_matches('/'), key)
    }
}

pub(crate) fn storage_error(err: object_store::Error) -> DataChefError {
    match err {
        object_store::Error::NotFound { path, .. } => DataChefError::not_found("object", path),
        other => DataChefError::Storage(other.to_string()),
    }
}
