//! Embedding + reranking model wrappers.
//!
//! - [`client`] is the external embedding provider contract (§6): an HTTP-backed
//!   `EmbeddingClient` plus a mock for tests, owned as a process singleton by
//!   [`crate::registry::ModelRegistry`].
//! - [`reranker`] is the in-process cross-encoder used by [`crate::scoring`], the
//!   other singleton the registry guards.

/// BERT classifier wrapper used by the reranker.
pub mod bert;
/// External embedding provider client (§6 Embedding provider contract).
pub mod client;
/// Device selection (CPU / Metal / CUDA).
pub mod device;
mod error;
/// Cross-encoder reranker (§4.7).
pub mod reranker;
/// Tokenizer/model loading helpers.
pub mod utils;

pub use client::{EmbeddingClient, EmbeddingClientError, HttpEmbeddingClient};
#[cfg(any(test, feature = "mock"))]
pub use client::MockEmbeddingClient;
pub use error::EmbeddingError;
pub use reranker::{DEFAULT_THRESHOLD, Reranker, RerankerConfig, RerankerError};
