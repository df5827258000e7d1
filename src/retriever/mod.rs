//! Retriever family (§4.6): four compositions of the same embed → search primitive,
//! differing only in how many queries they search with and how they combine the
//! results. All share an [`EmbeddingClient`] and a [`VectorStoreAdapter`] via `Arc`.

mod adaptive;
mod base;
mod enhanced;
mod error;
mod fusion;

pub use adaptive::{complexity_score, interpolate_k, AdaptiveKRetriever};
pub use base::BaseRetriever;
pub use enhanced::EnhancedRetriever;
pub use error::RetrieveError;
pub use fusion::FusionRetriever;

/// Shared low-level primitives re-exposed for the orchestrator, which needs
/// finer-grained bookkeeping (variant counts, per-stage timings) than the retriever
/// wrapper types above surface on their own.
pub(crate) use enhanced::{reciprocal_rank_fusion, search_variants};
