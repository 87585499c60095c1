// src/storage.rs
//! Key-value storage primitives the seen-set sits on.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use serde_json::Value;
use tokio::fs;

use crate::error::StorageError;

#[async_trait::async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;
    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;
    /// Returns whether the key existed.
    async fn delete(&self, key: &str) -> Result<bool, StorageError>;
}

/// Whole store kept as one JSON object on disk. Writes go through a temp file
/// and a rename so a crash never leaves a half-written document.
pub struct FileKvStore {
    path: PathBuf,
    // serialize read-modify-write within this process
    write_lock: tokio::sync::Mutex<()>,
}

impl FileKvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<BTreeMap<String, Value>, StorageError> {
        match fs::read_to_string(&self.path).await {
            Ok(s) if s.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(s) => serde_json::from_str(&s).map_err(|e| StorageError::Corrupt {
                key: self.path.display().to_string(),
                reason: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    // Writers replace a document that no longer parses; nothing in it is recoverable.
    async fn read_for_write(&self) -> Result<BTreeMap<String, Value>, StorageError> {
        match self.read_all().await {
            Err(e @ StorageError::Corrupt { .. }) => {
                tracing::warn!(target: "storage", error = %e, "overwriting corrupt store document");
                Ok(BTreeMap::new())
            }
            other => other,
        }
    }

    async fn write_all(&self, map: &BTreeMap<String, Value>) -> Result<(), StorageError> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir).await?;
            }
        }
        let json = serde_json::to_vec_pretty(map)
            .map_err(|e| StorageError::Backend(format!("serialize store: {e}")))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl KvStore for FileKvStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.read_all().await?.remove(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let _g = self.write_lock.lock().await;
        let mut map = self.read_for_write().await?;
        map.insert(key.to_string(), value);
        self.write_all(&map).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let _g = self.write_lock.lock().await;
        let mut map = self.read_for_write().await?;
        let existed = map.remove(key).is_some();
        if existed {
            self.write_all(&map).await?;
        }
        Ok(existed)
    }
}

/// In-process store. Used by tests and by ephemeral runs; reads and writes can
/// be made to fail on demand to exercise degradation paths.
#[derive(Default)]
pub struct MemoryKvStore {
    inner: Mutex<BTreeMap<String, Value>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(key: &str, value: Value) -> Self {
        let s = Self::new();
        s.lock().insert(key.to_string(), value);
        s
    }

    pub fn fail_reads(&self, on: bool) {
        self.fail_reads.store(on, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }

    pub fn peek(&self, key: &str) -> Option<Value> {
        self.lock().get(key).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Value>> {
        match self.inner.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        }
    }
}

#[async_trait::async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("simulated read failure".into()));
        }
        Ok(self.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("simulated write failure".into()));
        }
        self.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("simulated write failure".into()));
        }
        Ok(self.lock().remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn file_store_round_trips_and_keeps_other_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileKvStore::new(tmp.path().join("nested/kv.json"));

        assert_eq!(store.get("seen_posts").await.unwrap(), None);
        store.set("seen_posts", json!(["a", "b"])).await.unwrap();
        store.set("other", json!(1)).await.unwrap();

        assert_eq!(store.get("seen_posts").await.unwrap(), Some(json!(["a", "b"])));
        assert!(store.delete("seen_posts").await.unwrap());
        assert!(!store.delete("seen_posts").await.unwrap());
        assert_eq!(store.get("other").await.unwrap(), Some(json!(1)));
    }

    #[tokio::test]
    async fn file_store_reports_then_replaces_corrupt_document() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("kv.json");
        std::fs::write(&p, "{not json").unwrap();
        let store = FileKvStore::new(&p);
        assert!(matches!(
            store.get("seen_posts").await,
            Err(StorageError::Corrupt { .. })
        ));

        store.set("seen_posts", json!(["a"])).await.unwrap();
        assert_eq!(store.get("seen_posts").await.unwrap(), Some(json!(["a"])));
    }

    #[tokio::test]
    async fn memory_store_failure_switches() {
        let store = MemoryKvStore::with_entry("k", json!(["x"]));
        store.fail_reads(true);
        assert!(store.get("k").await.is_err());
        store.fail_reads(false);
        store.fail_writes(true);
        assert!(store.set("k", json!([])).await.is_err());
        assert_eq!(store.peek("k"), Some(json!(["x"])));
    }
}
