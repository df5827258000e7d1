//! L2 shared cache (§4.4): a process-external tier (Redis in production) that
//! survives restarts and is shared across replicas, sitting behind L1 in the
//! lookup order.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use thiserror::Error;

use super::types::CacheEntry;

/// Errors returned by a [`SharedCache`] backend.
#[derive(Debug, Error)]
pub enum L2CacheError {
    #[error("shared cache unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("shared cache entry was malformed: {reason}")]
    Malformed { reason: String },
}

/// Contract consumed by [`super::tiered::TieredCache`]; production deployments back
/// this with Redis, tests back it with [`InMemorySharedCache`].
pub trait SharedCache: Send + Sync {
    /// Fetches an entry by its cache fingerprint (hex-encoded key).
    fn get(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<CacheEntry>, L2CacheError>> + Send;

    /// Stores an entry with a TTL, per `cache_ttl_ms` in [`crate::config::Config`].
    fn set_with_ttl(
        &self,
        key: &str,
        entry: CacheEntry,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<(), L2CacheError>> + Send;

    /// Deletes a single entry by its exact key, if present. Used by
    /// [`super::tiered::TieredCache::invalidate_document`] to drop cached rankings
    /// that reference a document whose status just changed — the tiered cache tracks
    /// which keys those are itself, since a shared-cache key alone (a fingerprint
    /// hash) carries no document identity to prefix-match against.
    fn delete(&self, key: &str) -> impl std::future::Future<Output = Result<bool, L2CacheError>> + Send;

    /// Liveness probe for the orchestrator's health aggregation.
    fn health(&self) -> impl std::future::Future<Output = Result<(), L2CacheError>> + Send;
}

struct StoredEntry {
    entry: CacheEntry,
    expires_at: Instant,
}

/// In-memory stand-in for a Redis-backed L2, used in tests and the `mock` feature.
#[cfg(any(test, feature = "mock"))]
pub struct InMemorySharedCache {
    entries: RwLock<HashMap<String, StoredEntry>>,
}

#[cfg(any(test, feature = "mock"))]
impl InMemorySharedCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(any(test, feature = "mock"))]
impl Default for InMemorySharedCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "mock"))]
impl SharedCache for InMemorySharedCache {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, L2CacheError> {
        let mut entries = self.entries.write();
        if let Some(stored) = entries.get(key) {
            if stored.expires_at <= Instant::now() {
                entries.remove(key);
                return Ok(None);
            }
            return Ok(Some(stored.entry.clone()));
        }
        Ok(None)
    }

    async fn set_with_ttl(&self, key: &str, entry: CacheEntry, ttl: Duration) -> Result<(), L2CacheError> {
        self.entries.write().insert(
            key.to_string(),
            StoredEntry {
                entry,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, L2CacheError> {
        Ok(self.entries.write().remove(key).is_some())
    }

    async fn health(&self) -> Result<(), L2CacheError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DocumentStatus, DocumentType, Passage, ScoredPassage};

    fn entry() -> CacheEntry {
        let passage = Passage {
            id: "p1".to_string(),
            content: "noi dung".to_string(),
            document_id: "doc-1".to_string(),
            document_title: "Luat Dau Thau".to_string(),
            hierarchy_path: vec![],
            document_type: DocumentType::Law,
            status: DocumentStatus::Active,
            valid_until: None,
            metadata: Default::default(),
        };
        CacheEntry::from_ranked(&[ScoredPassage::from_retrieval(passage, 0.8)])
    }

    #[tokio::test]
    async fn get_returns_none_before_set() {
        let cache = InMemorySharedCache::new();
        assert!(cache.get("k1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_then_get_roundtrips() {
        let cache = InMemorySharedCache::new();
        cache.set_with_ttl("k1", entry(), Duration::from_secs(60)).await.unwrap();
        let fetched = cache.get("k1").await.unwrap();
        assert!(fetched.is_some());
    }

    #[tokio::test]
    async fn expired_entry_is_not_returned() {
        let cache = InMemorySharedCache::new();
        cache
            .set_with_ttl("k1", entry(), Duration::from_millis(0))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(cache.get("k1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_removes_only_the_named_key() {
        let cache = InMemorySharedCache::new();
        cache.set_with_ttl("a", entry(), Duration::from_secs(60)).await.unwrap();
        cache.set_with_ttl("b", entry(), Duration::from_secs(60)).await.unwrap();

        assert!(cache.delete("a").await.unwrap());
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn delete_of_an_absent_key_returns_false() {
        let cache = InMemorySharedCache::new();
        assert!(!cache.delete("missing").await.unwrap());
    }
}
