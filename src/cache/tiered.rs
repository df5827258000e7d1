//! Tiered cache: L1 exact-fingerprint + L2 shared, in lookup order (§4.4).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, info, instrument};

use super::fingerprint::fingerprint;
use super::l1::L1CacheHandle;
use super::l2::{InMemorySharedCache, L2CacheError, SharedCache};
use super::types::{CacheEntry, CacheLayerHit};
use crate::filter::Filter;
use crate::types::Query;

fn hex_key(fp: [u8; 16]) -> String {
    fp.iter().map(|b| format!("{b:02x}")).collect()
}

/// Result of a tiered lookup: which layer served it, and the entry if any.
#[derive(Debug)]
pub struct TieredLookupResult {
    pub layer: CacheLayerHit,
    pub entry: Option<CacheEntry>,
}

impl TieredLookupResult {
    fn miss() -> Self {
        Self {
            layer: CacheLayerHit::None,
            entry: None,
        }
    }

    pub fn is_hit(&self) -> bool {
        self.layer.is_hit()
    }
}

/// Owns both cache tiers; generic over the L2 backend so tests can swap in
/// [`InMemorySharedCache`] without touching production wiring.
pub struct TieredCache<S: SharedCache> {
    l1: L1CacheHandle,
    l2: Arc<S>,
    ttl: Duration,
    /// `document_id -> L2 keys of entries that ranked a passage from that document`.
    /// A shared-cache key is just a fingerprint hash, so without this index
    /// [`Self::invalidate_document`] would have no way to find which L2 entries to
    /// drop when a document's status changes.
    document_index: RwLock<HashMap<String, HashSet<String>>>,
}

impl<S: SharedCache> std::fmt::Debug for TieredCache<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredCache").field("l1", &self.l1).finish()
    }
}

impl<S: SharedCache> TieredCache<S> {
    pub fn new(l1: L1CacheHandle, l2: Arc<S>, ttl: Duration) -> Self {
        Self {
            l1,
            l2,
            ttl,
            document_index: RwLock::new(HashMap::new()),
        }
    }

    pub fn l1(&self) -> &L1CacheHandle {
        &self.l1
    }

    pub fn l2(&self) -> &Arc<S> {
        &self.l2
    }

    /// Looks up `query`/`k`/`filter` in L1, falling back to L2 on miss. A hit is
    /// never trusted on the cached ranking alone — the caller re-hydrates passage
    /// content from the vector store and filters out anything whose status changed,
    /// per §4.4's correctness rule.
    #[instrument(skip(self, query, filter), fields(k))]
    pub async fn lookup(&self, query: &Query, k: usize, filter: &Filter) -> Result<TieredLookupResult, L2CacheError> {
        let fp = fingerprint(query, k, filter);

        if let Some(entry) = self.l1.lookup(&fp) {
            debug!("L1 cache hit");
            return Ok(TieredLookupResult {
                layer: CacheLayerHit::L1,
                entry: Some(entry),
            });
        }

        let l2_key = hex_key(fp);
        match self.l2.get(&l2_key).await? {
            Some(entry) => {
                info!("L2 cache hit");
                self.l1.insert(fp, entry.clone());
                Ok(TieredLookupResult {
                    layer: CacheLayerHit::L2,
                    entry: Some(entry),
                })
            }
            None => {
                debug!("cache miss on both tiers");
                Ok(TieredLookupResult::miss())
            }
        }
    }

    /// Populates both tiers after a fresh retrieval, keyed by the same fingerprint a
    /// subsequent identical request would compute.
    pub async fn populate(
        &self,
        query: &Query,
        k: usize,
        filter: &Filter,
        entry: CacheEntry,
    ) -> Result<(), L2CacheError> {
        let fp = fingerprint(query, k, filter);
        let key = hex_key(fp);

        {
            let mut index = self.document_index.write();
            for document_id in &entry.document_ids {
                index.entry(document_id.clone()).or_default().insert(key.clone());
            }
        }

        self.l1.insert(fp, entry.clone());
        self.l2.set_with_ttl(&key, entry, self.ttl).await
    }

    /// Cache invalidation for a document whose status just changed: flushes all of
    /// L1 (which carries no per-document index to target selectively) and, for L2,
    /// looks up exactly which entries ranked a passage from `document_id` via
    /// [`Self::document_index`] and deletes each of them by key. Entries populated
    /// before this index existed, or by another process sharing the same L2 backend,
    /// are outside this index's knowledge and are not targeted by this call.
    pub async fn invalidate_document(&self, document_id: &str) -> Result<u64, L2CacheError> {
        self.l1.clear();

        let keys: Vec<String> = self
            .document_index
            .write()
            .remove(document_id)
            .map(|keys| keys.into_iter().collect())
            .unwrap_or_default();

        let mut removed = 0u64;
        for key in keys {
            if self.l2.delete(&key).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub fn l1_len(&self) -> usize {
        self.l1.len()
    }

    pub async fn health(&self) -> Result<(), L2CacheError> {
        self.l2.health().await
    }
}

/// Convenience alias for tests: a [`TieredCache`] backed by
/// [`InMemorySharedCache`].
#[cfg(any(test, feature = "mock"))]
pub type MockTieredCache = TieredCache<InMemorySharedCache>;

#[cfg(any(test, feature = "mock"))]
impl TieredCache<InMemorySharedCache> {
    pub fn new_mock(ttl: Duration) -> Self {
        Self::new(L1CacheHandle::new(), Arc::new(InMemorySharedCache::new()), ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DocumentStatus, DocumentType, Passage, ScoredPassage};

    fn entry() -> CacheEntry {
        entry_for_document("doc-1")
    }

    fn entry_for_document(document_id: &str) -> CacheEntry {
        let passage = Passage {
            id: "p1".to_string(),
            content: "noi dung".to_string(),
            document_id: document_id.to_string(),
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
    async fn miss_then_populate_then_l1_hit() {
        let cache = TieredCache::new_mock(Duration::from_secs(60));
        let query = Query::new("thời hạn bảo đảm");
        let filter = Filter::default_status_active();

        let miss = cache.lookup(&query, 5, &filter).await.unwrap();
        assert_eq!(miss.layer, CacheLayerHit::None);

        cache.populate(&query, 5, &filter, entry()).await.unwrap();

        let hit = cache.lookup(&query, 5, &filter).await.unwrap();
        assert_eq!(hit.layer, CacheLayerHit::L1);
    }

    #[tokio::test]
    async fn l2_hit_backfills_l1() {
        let cache = TieredCache::new_mock(Duration::from_secs(60));
        let query = Query::new("test");
        let filter = Filter::none();
        let fp = fingerprint(&query, 3, &filter);

        cache.l2.set_with_ttl(&hex_key(fp), entry(), Duration::from_secs(60)).await.unwrap();

        let hit = cache.lookup(&query, 3, &filter).await.unwrap();
        assert_eq!(hit.layer, CacheLayerHit::L2);
        assert!(cache.l1.contains(&fp));
    }

    #[tokio::test]
    async fn invalidate_document_clears_l1() {
        let cache = TieredCache::new_mock(Duration::from_secs(60));
        let query = Query::new("test");
        let filter = Filter::none();
        cache.populate(&query, 3, &filter, entry()).await.unwrap();
        assert_eq!(cache.l1_len(), 1);

        cache.invalidate_document("doc-1").await.unwrap();
        assert_eq!(cache.l1_len(), 0);
    }

    #[tokio::test]
    async fn invalidate_document_also_removes_the_matching_l2_entry() {
        let cache = TieredCache::new_mock(Duration::from_secs(60));
        let query = Query::new("test");
        let filter = Filter::none();
        cache.populate(&query, 3, &filter, entry_for_document("doc-1")).await.unwrap();
        assert_eq!(cache.l2.len(), 1);

        let removed = cache.invalidate_document("doc-1").await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(cache.l2.len(), 0);
    }

    #[tokio::test]
    async fn invalidate_document_leaves_other_documents_l2_entries_alone() {
        let cache = TieredCache::new_mock(Duration::from_secs(60));
        let filter = Filter::none();
        cache.populate(&Query::new("q1"), 3, &filter, entry_for_document("doc-1")).await.unwrap();
        cache.populate(&Query::new("q2"), 3, &filter, entry_for_document("doc-2")).await.unwrap();
        assert_eq!(cache.l2.len(), 2);

        let removed = cache.invalidate_document("doc-1").await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(cache.l2.len(), 1);
    }
}
