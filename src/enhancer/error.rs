use thiserror::Error;

use crate::llm::ChatLlmError;

/// Per-strategy enhancement failure. The enhancer never propagates these out of
/// [`super::QueryEnhancer::enhance`] — a failing strategy is just dropped from the
/// result, logged, and the original query survives regardless (§4.5).
#[derive(Debug, Error)]
pub enum EnhanceError {
    #[error("chat LLM call failed: {0}")]
    Llm(#[from] ChatLlmError),

    #[error("strategy timed out")]
    TimedOut,

    #[error("model returned no usable variants")]
    NoVariants,
}
