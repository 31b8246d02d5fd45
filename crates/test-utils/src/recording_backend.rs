use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use datachef::errors::{DataChefError, Result};
use datachef::storage::backend::{Listing, ObjectBackend, ObjectBody, ObjectInfo, ObjectStoreBackend};

/// In-memory storage that counts calls and can be told to fail.
#[derive(Debug)]
pub struct RecordingBackend {
    inner: ObjectStoreBackend,
    calls: AtomicUsize,
    ops: Mutex<Vec<String>>,
    fail_puts: AtomicBool,
    fail_deletes: AtomicBool,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            inner: ObjectStoreBackend::in_memory(),
            calls: AtomicUsize::new(0),
            ops: Mutex::new(Vec::new()),
            fail_puts: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
        }
    }

    /// Total number of backend calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// `"<op> <key>"` for every call, in order.
    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    fn record(&self, op: &str, key: &str) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.ops.lock().unwrap().push(format!("{op} {key}"));
    }

    fn injected(flag: &AtomicBool, op: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(DataChefError::Storage(format!("injected {op} failure")));
        }
        Ok(())
    }
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectBackend for RecordingBackend {
    async fn put(&self, key: &str, body: Bytes, content_type: Option<&str>) -> Result<()> {
        self.record("put", key);
        Self::injected(&self.fail_puts, "put")?;
        self.inner.put(key, body, content_type).await
    }

    async fn list_children(&self, prefix: &str) -> Result<Listing> {
        self.record("list", prefix);
        self.inner.list_children(prefix).await
    }

    async fn list_recursive(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        self.record("list_recursive", prefix);
        self.inner.list_recursive(prefix).await
    }

    async fn get(&self, key: &str) -> Result<ObjectBody> {
        self.record("get", key);
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.record("delete", key);
        Self::injected(&self.fail_deletes, "delete")?;
        self.inner.delete(key).await
    }

    async fn delete_many(&self, keys: Vec<String>) -> Result<usize> {
        self.record("delete_many", &keys.join(","));
        Self::injected(&self.fail_deletes, "delete")?;
        self.inner.delete_many(keys).await
    }

    fn engine_uri(&self, key: &str) -> String {
        self.inner.engine_uri(key)
    }
}
