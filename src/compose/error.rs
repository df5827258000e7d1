use thiserror::Error;

/// Composition failures. Per §4.8's failure semantics, these never propagate past
/// [`super::AnswerComposer::compose`] — they're folded into a [`super::ComposeResult`]
/// with `generation_failed = true` instead, so a chat outage downgrades rather than
/// discards an otherwise-successful retrieval.
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("chat LLM call failed: {0}")]
    Llm(#[from] crate::llm::ChatLlmError),
}
