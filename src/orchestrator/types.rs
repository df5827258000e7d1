//! `Answer` and its supporting response types (§6 `ask()` return shape).

use crate::types::{DocumentId, PassageId};

/// One cited or supporting passage, carrying just enough to render without a
/// second round trip to the store.
#[derive(Debug, Clone)]
pub struct CitationRef {
    pub passage_id: PassageId,
    pub document_id: DocumentId,
    pub document_title: String,
    pub hierarchy_path: Vec<String>,
}

/// Stage-level counters surfaced to the caller (§6 `stages`).
#[derive(Debug, Clone, Default)]
pub struct StageSummary {
    pub retrieved_n: usize,
    pub reranked_n: usize,
    pub enhanced_n: usize,
    pub cache_layer_hit: Option<crate::cache::CacheLayerHit>,
}

/// Per-stage timings in milliseconds (§6 `latency_ms_breakdown`).
#[derive(Debug, Clone, Default)]
pub struct LatencyBreakdown {
    pub enhance_ms: u64,
    pub retrieve_ms: u64,
    pub rerank_ms: u64,
    pub compose_ms: u64,
    pub total_ms: u64,
}

/// The `ask()` result. Returned even on a degraded or partially-failed request —
/// `generation_failed` and `warnings` carry the degradation, not a separate error
/// type (§4.8, §7 PartialFailure).
#[derive(Debug, Clone)]
pub struct Answer {
    pub answer_text: String,
    pub citations: Vec<CitationRef>,
    pub supporting_context: Vec<CitationRef>,
    pub stages: StageSummary,
    pub latency_ms_breakdown: LatencyBreakdown,
    pub warnings: Vec<String>,
    pub generation_failed: bool,
}

/// `health()` response (§6 auxiliary operations).
#[derive(Debug, Clone)]
pub struct HealthReport {
    pub reranker_loaded: bool,
    pub embedder_loaded: bool,
    pub store_dimension: usize,
    pub queue_depth: usize,
}
