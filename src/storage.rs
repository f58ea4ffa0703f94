//! Key/value storage abstraction standing in for browser local storage.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{Error, Result};

/// String-keyed, string-valued persistent storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns the stored value for `key`, if any.
    async fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Removes `key` if present.
    async fn remove_item(&self, key: &str) -> Result<()>;
}

#[async_trait]
impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        (**self).get_item(key).await
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        (**self).set_item(key, value).await
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        (**self).remove_item(key).await
    }
}

/// Volatile storage, lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn items(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.items
            .lock()
            .map_err(|_| Error::Io(std::io::Error::other("memory storage lock poisoned")))
    }
}

#[async_trait]
impl KeyValueStore for MemoryStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items()?.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.items()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        self.items()?.remove(key);
        Ok(())
    }
}

/// Storage backed by a single JSON object file on disk.
///
/// Every write rewrites the whole file atomically (write tmp + rename).
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileStorage {
    /// Creates a store persisting to `path`. The file is created lazily.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<BTreeMap<String, String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_all(&self, items: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, serde_json::to_vec_pretty(items)?).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all().await?.remove(key))
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut items = self.read_all().await?;
        items.insert(key.to_string(), value.to_string());
        self.write_all(&items).await
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut items = self.read_all().await?;
        if items.remove(key).is_some() {
            self.write_all(&items).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn memory_storage_set_get_remove() {
        let store = MemoryStorage::new();
        assert_eq!(store.get_item("theme").await.unwrap(), None);

        store.set_item("theme", "dark").await.unwrap();
        assert_eq!(store.get_item("theme").await.unwrap().as_deref(), Some("dark"));

        store.remove_item("theme").await.unwrap();
        assert_eq!(store.get_item("theme").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_storage_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileStorage::new(dir.path().join("storage.json"));
        assert_eq!(store.get_item("monitor-subscriptions").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_storage_persists_across_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/storage.json");

        let store = FileStorage::new(&path);
        store.set_item("monitor-subscriptions", "[1,2]").await.unwrap();
        store.set_item("theme", "light").await.unwrap();
        drop(store);

        let reopened = FileStorage::new(&path);
        assert_eq!(
            reopened.get_item("monitor-subscriptions").await.unwrap().as_deref(),
            Some("[1,2]")
        );
        assert_eq!(reopened.get_item("theme").await.unwrap().as_deref(), Some("light"));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn file_storage_remove_item() {
        let dir = TempDir::new().unwrap();
        let store = FileStorage::new(dir.path().join("storage.json"));
        store.set_item("a", "1").await.unwrap();
        store.remove_item("a").await.unwrap();
        store.remove_item("never-set").await.unwrap();
        assert_eq!(store.get_item("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_storage_rejects_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = FileStorage::new(&path);
        assert!(matches!(store.get_item("x").await, Err(Error::Json(_))));
    }

    #[tokio::test]
    async fn shared_store_through_arc() {
        let store = Arc::new(MemoryStorage::new());
        let other = Arc::clone(&store);
        store.set_item("k", "v").await.unwrap();
        assert_eq!(other.get_item("k").await.unwrap().as_deref(), Some("v"));
    }
}
