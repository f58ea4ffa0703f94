//! Named cache buckets of stored responses.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::network::Response;
use crate::error::{Error, Result};

/// Storage for named buckets of cached responses.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Creates bucket `name` if it does not exist.
    async fn open(&self, name: &str) -> Result<()>;

    /// Names of all existing buckets.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Deletes bucket `name`. Returns whether it existed.
    async fn delete(&self, name: &str) -> Result<bool>;

    /// Looks up `key` in bucket `name`.
    async fn lookup(&self, name: &str, key: &str) -> Result<Option<Response>>;

    /// Stores `response` under `key` in bucket `name`, creating the bucket if needed.
    async fn put(&self, name: &str, key: &str, response: &Response) -> Result<()>;
}

/// Volatile cache storage.
#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    buckets: Mutex<BTreeMap<String, HashMap<String, Response>>>,
}

impl MemoryCacheStorage {
    /// Creates an empty cache storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn buckets(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, HashMap<String, Response>>>> {
        self.buckets
            .lock()
            .map_err(|_| Error::Cache("cache storage lock poisoned".to_string()))
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, name: &str) -> Result<()> {
        self.buckets()?.entry(name.to_string()).or_default();
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.buckets()?.keys().cloned().collect())
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        Ok(self.buckets()?.remove(name).is_some())
    }

    async fn lookup(&self, name: &str, key: &str) -> Result<Option<Response>> {
        Ok(self
            .buckets()?
            .get(name)
            .and_then(|bucket| bucket.get(key))
            .cloned())
    }

    async fn put(&self, name: &str, key: &str, response: &Response) -> Result<()> {
        self.buckets()?
            .entry(name.to_string())
            .or_default()
            .insert(key.to_string(), response.clone());
        Ok(())
    }
}

/// Sidecar describing a cached body on disk.
#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    key: String,
    status: u16,
    headers: Vec<(String, String)>,
    stored_at: DateTime<Utc>,
}

/// Cache storage persisted to disk.
///
/// Each bucket is a directory under the root. Entries are named by the
/// SHA-256 of their key: `<hash>.body` holds the bytes and `<hash>.json`
/// the status and headers. The sidecar is written last, so an entry is
/// only visible once its body is complete.
#[derive(Debug, Clone)]
pub struct DiskCacheStorage {
    root: PathBuf,
}

impl DiskCacheStorage {
    /// Uses `root` as the directory holding all buckets.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_dir(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(['/', '\\'])
        {
            return Err(Error::Cache(format!("invalid cache name {name:?}")));
        }
        Ok(self.root.join(name))
    }

    fn entry_stem(key: &str) -> String {
        let digest = Sha256::digest(key.as_bytes());
        let mut stem = String::with_capacity(digest.len() * 2);
        for byte in digest {
            let _ = write!(stem, "{byte:02x}");
        }
        stem
    }

    async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
        let mut tmp_path = path.as_os_str().to_owned();
        tmp_path.push(".tmp");
        let tmp_path = PathBuf::from(tmp_path);
        tokio::fs::write(&tmp_path, contents).await?;
        tokio::fs::rename(&tmp_path, path).await?;
        Ok(())
    }
}

#[async_trait]
impl CacheStorage for DiskCacheStorage {
    async fn open(&self, name: &str) -> Result<()> {
        tokio::fs::create_dir_all(self.bucket_dir(name)?).await?;
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut read_dir = match tokio::fs::read_dir(&self.root).await {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut names = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        match tokio::fs::remove_dir_all(self.bucket_dir(name)?).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn lookup(&self, name: &str, key: &str) -> Result<Option<Response>> {
        let dir = self.bucket_dir(name)?;
        let stem = Self::entry_stem(key);
        let meta = match tokio::fs::read(dir.join(format!("{stem}.json"))).await {
            Ok(bytes) => serde_json::from_slice::<EntryMeta>(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if meta.key != key {
            return Err(Error::Cache(format!("hash collision for {key}")));
        }
        let body = tokio::fs::read(dir.join(format!("{stem}.body"))).await?;
        Ok(Some(Response {
            status: meta.status,
            headers: meta.headers,
            body: body.into(),
        }))
    }

    async fn put(&self, name: &str, key: &str, response: &Response) -> Result<()> {
        let dir = self.bucket_dir(name)?;
        tokio::fs::create_dir_all(&dir).await?;
        let stem = Self::entry_stem(key);
        let meta = EntryMeta {
            key: key.to_string(),
            status: response.status,
            headers: response.headers.clone(),
            stored_at: Utc::now(),
        };
        Self::write_atomic(&dir.join(format!("{stem}.body")), &response.body).await?;
        Self::write_atomic(&dir.join(format!("{stem}.json")), &serde_json::to_vec(&meta)?).await
    }
}
