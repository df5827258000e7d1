//! L1 exact-fingerprint cache (in-memory, §4.4).
//!
//! L1 is keyed by the 16-byte MD5 fingerprint ([`super::fingerprint::fingerprint`])
//! and stores a [`CacheEntry`] — ranked ids and scores, not passage content.

use std::sync::Arc;

use moka::sync::Cache;

use super::types::CacheEntry;

/// In-memory exact-fingerprint cache.
pub struct L1Cache {
    entries: Cache<[u8; 16], CacheEntry>,
}

impl L1Cache {
    const DEFAULT_CAPACITY: u64 = 10_000;

    /// Creates a cache with the default capacity.
    #[inline]
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Creates a cache with a max entry capacity (LRU eviction), per
    /// `cache_l1_capacity` in [`crate::config::Config`].
    #[inline]
    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            entries: Cache::builder().max_capacity(capacity).build(),
        }
    }

    /// Looks up an entry by its cache fingerprint.
    #[inline]
    pub fn lookup(&self, fingerprint: &[u8; 16]) -> Option<CacheEntry> {
        self.entries.get(fingerprint)
    }

    /// Inserts a fingerprint → entry mapping.
    #[inline]
    pub fn insert(&self, fingerprint: [u8; 16], entry: CacheEntry) {
        self.entries.insert(fingerprint, entry);
    }

    /// Removes an entry by fingerprint.
    #[inline]
    pub fn remove(&self, fingerprint: &[u8; 16]) -> Option<CacheEntry> {
        self.entries.remove(fingerprint)
    }

    /// Returns the number of cached entries.
    #[inline]
    pub fn len(&self) -> u64 {
        self.entries.entry_count()
    }

    /// Returns `true` if the cache is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.entry_count() == 0
    }

    /// Clears all entries. Used by [`super::tiered::TieredCache::invalidate_document`]
    /// as its conservative "flush everything" fallback, since L1 entries carry no
    /// document-id index to target individually.
    #[inline]
    pub fn clear(&self) {
        self.entries.invalidate_all();
    }

    /// Returns `true` if the cache contains the given fingerprint.
    #[inline]
    pub fn contains(&self, fingerprint: &[u8; 16]) -> bool {
        self.entries.contains_key(fingerprint)
    }

    /// Runs any pending maintenance tasks in the underlying cache.
    #[inline]
    pub fn run_pending_tasks(&self) {
        self.entries.run_pending_tasks();
    }
}

impl Default for L1Cache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for L1Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("L1Cache")
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}

/// Shared handle to an [`L1Cache`], cloned freely across the orchestrator's tasks.
#[derive(Clone)]
pub struct L1CacheHandle {
    inner: Arc<L1Cache>,
}

impl L1CacheHandle {
    #[inline]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(L1Cache::new()),
        }
    }

    #[inline]
    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            inner: Arc::new(L1Cache::with_capacity(capacity)),
        }
    }

    #[inline]
    pub fn lookup(&self, fingerprint: &[u8; 16]) -> Option<CacheEntry> {
        self.inner.lookup(fingerprint)
    }

    #[inline]
    pub fn insert(&self, fingerprint: [u8; 16], entry: CacheEntry) {
        self.inner.insert(fingerprint, entry)
    }

    #[inline]
    pub fn remove(&self, fingerprint: &[u8; 16]) -> Option<CacheEntry> {
        self.inner.remove(fingerprint)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len() as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    #[inline]
    pub fn clear(&self) {
        self.inner.clear();
    }

    #[inline]
    pub fn contains(&self, fingerprint: &[u8; 16]) -> bool {
        self.inner.contains(fingerprint)
    }

    #[inline]
    pub fn run_pending_tasks(&self) {
        self.inner.run_pending_tasks();
    }

    #[inline]
    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl Default for L1CacheHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for L1CacheHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("L1CacheHandle")
            .field("strong_count", &self.strong_count())
            .finish()
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

    #[test]
    fn lookup_miss_then_hit_after_insert() {
        let cache = L1Cache::new();
        let fp = [1u8; 16];
        assert!(cache.lookup(&fp).is_none());
        cache.insert(fp, entry());
        assert!(cache.lookup(&fp).is_some());
    }

    #[test]
    fn clear_empties_cache() {
        let cache = L1Cache::new();
        cache.insert([2u8; 16], entry());
        cache.run_pending_tasks();
        assert!(!cache.is_empty());
        cache.clear();
        cache.run_pending_tasks();
        assert!(cache.is_empty());
    }

    #[test]
    fn capacity_evicts_lru() {
        let cache = L1Cache::with_capacity(1);
        cache.insert([3u8; 16], entry());
        cache.insert([4u8; 16], entry());
        cache.run_pending_tasks();
        assert_eq!(cache.len(), 1);
    }
}
