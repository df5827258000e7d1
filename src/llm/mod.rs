//! Chat LLM contract shared by the enhancer (query rewriting, §4.5) and the
//! composer (answer generation, §4.8) — both only ever need "send this prompt, get
//! text back", so they share one thin seam over [`genai::Client`] instead of each
//! rolling its own.

mod error;

pub use error::ChatLlmError;

use genai::Client;
use genai::chat::{ChatMessage, ChatRequest};

/// Single-turn chat completion contract.
pub trait ChatLlm: Send + Sync {
    /// Sends `prompt` as a single user message and returns the model's text
    /// response.
    fn complete(
        &self,
        prompt: &str,
    ) -> impl std::future::Future<Output = Result<String, ChatLlmError>> + Send;
}

/// Default implementation backed by `genai`, which itself multiplexes to whichever
/// provider the configured model id belongs to.
pub struct GenaiChatLlm {
    client: Client,
    model: String,
}

impl GenaiChatLlm {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: Client::default(),
            model: model.into(),
        }
    }
}

impl ChatLlm for GenaiChatLlm {
    async fn complete(&self, prompt: &str) -> Result<String, ChatLlmError> {
        let request = ChatRequest::new(vec![ChatMessage::user(prompt)]);
        let response = self
            .client
            .exec_chat(&self.model, request, None)
            .await
            .map_err(|e| ChatLlmError::RequestFailed {
                reason: e.to_string(),
            })?;

        response
            .content_text_as_str()
            .map(str::to_string)
            .ok_or_else(|| ChatLlmError::EmptyResponse)
    }
}

/// Deterministic in-memory chat backend for tests: echoes a configurable response,
/// ignoring the prompt.
#[cfg(any(test, feature = "mock"))]
pub struct MockChatLlm {
    response: String,
    fail: bool,
}

#[cfg(any(test, feature = "mock"))]
impl MockChatLlm {
    pub fn respond_with(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            response: String::new(),
            fail: true,
        }
    }
}

#[cfg(any(test, feature = "mock"))]
impl ChatLlm for MockChatLlm {
    async fn complete(&self, _prompt: &str) -> Result<String, ChatLlmError> {
        if self.fail {
            Err(ChatLlmError::RequestFailed {
                reason: "mock configured to fail".to_string(),
            })
        } else {
            Ok(self.response.clone())
        }
    }
}
