use thiserror::Error;

use crate::embedding::EmbeddingClientError;
use crate::scoring::ScoringError;

/// Errors returned by [`super::ModelRegistry`] slot accessors.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The slot failed to initialize recently and is in its cooldown window
    /// (`registry_backoff_ms`); the caller should treat this the same as a
    /// dependency-unavailable failure rather than retrying immediately.
    #[error("{slot} is in backoff, retry after {retry_after_ms}ms")]
    Backoff { slot: &'static str, retry_after_ms: u64 },

    /// The embedding client failed to construct.
    #[error("embedder initialization failed: {0}")]
    EmbedderInitFailed(#[source] EmbeddingClientError),

    /// The reranker failed to load its model.
    #[error("reranker initialization failed: {0}")]
    RerankerInitFailed(#[source] ScoringError),
}
