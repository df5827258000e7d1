//! Cross-encoder reranking (§4.7): the wrapper the orchestrator dispatches onto a
//! blocking thread, scoring and reordering a candidate passage list against the
//! query before composition.

pub mod error;
pub mod scorer;
pub mod types;

pub use error::ScoringError;
pub use scorer::CrossEncoderReranker;
pub use types::RerankOutcome;
