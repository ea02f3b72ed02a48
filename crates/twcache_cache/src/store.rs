use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::entry::CacheEntry;
use crate::error::CacheError;
use crate::key::CacheKey;

/// Persistent mapping from cache key to the last stored response.
///
/// Implementations must tolerate any number of concurrent callers. A miss
/// covers both "absent" and "present but expired"; callers cannot tell them
/// apart. `Err` is reserved for failures of the backend itself.
#[async_trait]
pub trait CacheStore: Send + Sync + 'static {
    /// Return the entry for `key` if it exists and is valid at `now`.
    async fn lookup(
        &self,
        key: &CacheKey,
        now: DateTime<Utc>,
    ) -> Result<Option<CacheEntry>, CacheError>;

    /// Insert or fully replace the entry stored under `entry.key`.
    async fn upsert(&self, entry: &CacheEntry) -> Result<(), CacheError>;
}

/// Process-local store. Entries are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    inner: DashMap<CacheKey, CacheEntry>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows, expired ones included.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn lookup(
        &self,
        key: &CacheKey,
        now: DateTime<Utc>,
    ) -> Result<Option<CacheEntry>, CacheError> {
        let entry = self
            .inner
            .get(key)
            .filter(|e| e.is_valid_at(now))
            .map(|e| e.value().clone());
        Ok(entry)
    }

    async fn upsert(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        self.inner.insert(entry.key.clone(), entry.clone());
        Ok(())
    }
}
