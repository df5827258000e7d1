use thiserror::Error;

use crate::embedding::RerankerError;

/// Errors returned by [`super::CrossEncoderReranker`].
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("reranker error: {0}")]
    Reranker(#[from] RerankerError),

    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },
}
