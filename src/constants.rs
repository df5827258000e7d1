//! Cross-cutting, shared constants.
//!
//! Prefer deriving secondary constants from primary ones to avoid drift.
//!
//! # Dimension invariant
//!
//! The embedding dimension is a deployment invariant, not a compile-time one: the
//! store and the embedding model must agree, and the process refuses to start if
//! they don't. [`DimConfig`] carries the configured dimension through startup and
//! [`validate_embedding_dim`] is the single check point for that invariant.

/// Fallback embedding dimension used only when no explicit configuration is supplied
/// (tests, examples). Real deployments set `embed_dim` explicitly.
pub const DEFAULT_EMBEDDING_DIM: usize = 1536;

/// Default cross-encoder acceptance threshold (§4.7); scores at or above this are
/// considered confidently relevant when a caller needs a boolean cutoff.
pub const DEFAULT_RERANK_THRESHOLD: f32 = 0.50;

/// Default reciprocal-rank-fusion constant (§4.6, §9 Open Question — see DESIGN.md).
pub const DEFAULT_RRF_CONSTANT: f64 = 60.0;

/// Default cross-encoder max sequence length (query + passage, in tokens).
pub const DEFAULT_MAX_SEQ_LEN: usize = 512;

/// Runtime dimension configuration shared by the embedding client and the vector store
/// adapter at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimConfig {
    /// The embedding vector dimension (number of floats).
    pub embedding_dim: usize,
}

impl Default for DimConfig {
    fn default() -> Self {
        Self {
            embedding_dim: DEFAULT_EMBEDDING_DIM,
        }
    }
}

impl DimConfig {
    /// Creates a new dimension configuration with the specified embedding dimension.
    pub fn new(embedding_dim: usize) -> Self {
        Self { embedding_dim }
    }

    /// Validates that this configuration is usable.
    ///
    /// Returns an error if `embedding_dim` is zero.
    pub fn validate(&self) -> Result<(), DimValidationError> {
        if self.embedding_dim == 0 {
            return Err(DimValidationError::ZeroDimension);
        }
        Ok(())
    }
}

/// Error returned when dimension validation fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DimValidationError {
    /// Embedding dimension cannot be zero.
    #[error("embedding dimension cannot be zero")]
    ZeroDimension,
    /// Runtime dimension does not match expected dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension the store (or configuration) expects.
        expected: usize,
        /// Dimension actually reported by the embedding model/client.
        actual: usize,
    },
}

/// Validates that a runtime embedding dimension matches the expected dimension.
///
/// This is the single enforcement point for the spec's startup invariant: "the core
/// must refuse to start if the embedding model's dimension disagrees with the store's."
///
/// # Example
///
/// ```
/// use lexvi::constants::{validate_embedding_dim, DEFAULT_EMBEDDING_DIM};
///
/// let embedder_dim = 1536;
/// validate_embedding_dim(embedder_dim, DEFAULT_EMBEDDING_DIM).unwrap();
/// ```
pub fn validate_embedding_dim(actual: usize, expected: usize) -> Result<(), DimValidationError> {
    if actual != expected {
        return Err(DimValidationError::DimensionMismatch { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dim_config_default() {
        let config = DimConfig::default();
        assert_eq!(config.embedding_dim, DEFAULT_EMBEDDING_DIM);
    }

    #[test]
    fn dim_config_validate_success() {
        let config = DimConfig::new(768);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn dim_config_validate_zero() {
        let config = DimConfig::new(0);
        assert_eq!(config.validate(), Err(DimValidationError::ZeroDimension));
    }

    #[test]
    fn validate_embedding_dim_match() {
        assert!(validate_embedding_dim(1536, 1536).is_ok());
    }

    #[test]
    fn validate_embedding_dim_mismatch() {
        assert_eq!(
            validate_embedding_dim(768, 1536),
            Err(DimValidationError::DimensionMismatch {
                expected: 1536,
                actual: 768
            })
        );
    }

    #[test]
    fn error_display() {
        let err = DimValidationError::ZeroDimension;
        assert_eq!(err.to_string(), "embedding dimension cannot be zero");

        let err = DimValidationError::DimensionMismatch {
            expected: 1536,
            actual: 768,
        };
        assert!(err.to_string().contains("1536"));
        assert!(err.to_string().contains("768"));
    }
}
