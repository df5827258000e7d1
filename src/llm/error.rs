use thiserror::Error;

/// Errors returned by [`super::ChatLlm::complete`].
#[derive(Debug, Error)]
pub enum ChatLlmError {
    #[error("chat request failed: {reason}")]
    RequestFailed { reason: String },

    #[error("chat response contained no text content")]
    EmptyResponse,
}
