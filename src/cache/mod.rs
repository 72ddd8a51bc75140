use std::collections::HashMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{AppError, AppResult};
use crate::models::{normalize_text, CacheEntry};

/// Cache signature for a recommendation query
///
/// The normalized text is the lookup identity; two queries differing only in
/// case or whitespace share a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn from_text(text: &str) -> Self {
        Self(normalize_text(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rec:{}", self.0)
    }
}

/// Per-query snapshot storage
///
/// Failure semantics are degraded, never raised: a corrupt or unreadable
/// entry reads as absent, and a failed write is logged while the
/// recommendation is still returned to the caller.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Option<CacheEntry>;
    async fn put(&self, key: &CacheKey, entry: &CacheEntry);
}

/// File-backed store: one JSON document per cache key
///
/// Writes go to a temp file in the same directory followed by a rename, so a
/// concurrent reader never observes a half-written entry.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl AsRef<Path>) -> AppResult<Self> {
        std::fs::create_dir_all(root.as_ref()).map_err(|e| {
            AppError::Cache(format!(
                "Failed to create cache directory {}: {}",
                root.as_ref().display(),
                e
            ))
        })?;
        Ok(Self {
            root: root.as_ref().to_path_buf(),
        })
    }

    /// Digest-based file name so arbitrary query text maps to a safe path
    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.root
            .join(format!("{:x}.json", md5::compute(key.as_str())))
    }
}

#[async_trait]
impl CacheStore for FileStore {
    async fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let path = self.entry_path(key);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to read cache entry");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Corrupt cache entry treated as miss");
                None
            }
        }
    }

    async fn put(&self, key: &CacheKey, entry: &CacheEntry) {
        let json = match serde_json::to_string(entry) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache serialization failed");
                return;
            }
        };

        let path = self.entry_path(key);
        let tmp = path.with_extension("json.tmp");
        if let Err(e) = std::fs::write(&tmp, json) {
            tracing::warn!(key = %key, error = %e, "Cache write failed");
            return;
        }
        if let Err(e) = std::fs::rename(&tmp, &path) {
            tracing::warn!(key = %key, error = %e, "Cache rename failed");
        }
    }
}

/// In-memory store for tests and cache-less deployments
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries.read().await.get(key.as_str()).cloned()
    }

    async fn put(&self, key: &CacheKey, entry: &CacheEntry) {
        self.entries
            .write()
            .await
            .insert(key.as_str().to_string(), entry.clone());
    }
}
