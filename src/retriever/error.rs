use thiserror::Error;

use crate::embedding::EmbeddingClientError;
use crate::vectordb::VectorDbError;

/// Errors surfaced by any retriever composition in this module.
#[derive(Debug, Error)]
pub enum RetrieveError {
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingClientError),

    #[error("vector store search failed: {0}")]
    VectorStore(#[from] VectorDbError),

    #[error("invalid retrieval input: {reason}")]
    InvalidInput { reason: String },
}
