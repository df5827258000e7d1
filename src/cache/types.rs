//! Cache value shape and the layer a lookup was served from.

use serde::{Deserialize, Serialize};

use crate::types::PassageId;

/// What the cache actually stores: an ordered list of passage identifiers plus the
/// scores they were retrieved/reranked with, never the passage content itself (§4.4
/// correctness rule — content is always re-hydrated from the store on hit so a
/// passage whose status changed since caching is filtered out post-hoc).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub ranked_ids: Vec<PassageId>,
    pub retrieval_scores: Vec<f32>,
    pub rerank_scores: Vec<Option<f32>>,
    /// Distinct document ids the ranked passages belong to, so a later status change
    /// to one of those documents can find this entry again for invalidation (see
    /// [`super::tiered::TieredCache::invalidate_document`]).
    pub document_ids: Vec<String>,
}

impl CacheEntry {
    /// Builds a cache entry from a final ranked passage list, in ranking order.
    pub fn from_ranked(passages: &[crate::types::ScoredPassage]) -> Self {
        let mut document_ids: Vec<String> = passages.iter().map(|p| p.passage.document_id.clone()).collect();
        document_ids.sort();
        document_ids.dedup();
        Self {
            ranked_ids: passages.iter().map(|p| p.id().to_string()).collect(),
            retrieval_scores: passages.iter().map(|p| p.retrieval_score).collect(),
            rerank_scores: passages.iter().map(|p| p.rerank_score).collect(),
            document_ids,
        }
    }

    pub fn len(&self) -> usize {
        self.ranked_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranked_ids.is_empty()
    }
}

/// Which cache tier (if any) served a given request, surfaced in the orchestrator's
/// response metadata (`stages.cache_layer_hit`, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheLayerHit {
    L1,
    L2,
    None,
}

impl CacheLayerHit {
    pub fn is_hit(&self) -> bool {
        !matches!(self, Self::None)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::L1 => "l1",
            Self::L2 => "l2",
            Self::None => "none",
        }
    }
}

impl std::fmt::Display for CacheLayerHit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_layer_hit_is_hit() {
        assert!(CacheLayerHit::L1.is_hit());
        assert!(CacheLayerHit::L2.is_hit());
        assert!(!CacheLayerHit::None.is_hit());
    }
}
