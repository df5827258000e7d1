//! External embedding provider client (§6 "Embedding provider contract (consumed)").
//!
//! The embedding model itself lives outside the core's process boundary (an
//! external API); what the core owns is this HTTP client, which is why it is one
//! of the two [`crate::registry::ModelRegistry`] singleton slots — a client pools a
//! connection and, in a production deployment, warms up DNS/TLS state that is
//! wasteful to redo per request.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors returned by [`EmbeddingClient`] implementations.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// The provider could not be reached, or returned a non-2xx status after
    /// exhausting retries. Distinguished from [`Self::InvalidResponse`] because the
    /// orchestrator maps this to `DependencyUnavailable`.
    #[error("embedding provider unavailable: {reason}")]
    Unavailable { reason: String },

    /// The provider responded but the payload didn't decode, or returned a vector
    /// of the wrong dimension.
    #[error("invalid embedding response: {reason}")]
    InvalidResponse { reason: String },

    /// The request timed out against the configured per-call timeout.
    #[error("embedding request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// Contract consumed by the retriever family and the enhancer's variant-embedding
/// fan-out: `embed_one`/`embed_many`, caller-managed rate limits and retries with
/// jitter (§6).
pub trait EmbeddingClient: Send + Sync {
    /// Embeds a single text, returning a vector of [`Self::dimension`] floats.
    fn embed_one(
        &self,
        text: &str,
    ) -> impl std::future::Future<Output = Result<Vec<f32>, EmbeddingClientError>> + Send;

    /// Embeds a batch of texts in one round trip where the provider supports it.
    fn embed_many(
        &self,
        texts: &[String],
    ) -> impl std::future::Future<Output = Result<Vec<Vec<f32>>, EmbeddingClientError>> + Send;

    /// The fixed dimension this client's embeddings are produced in; checked
    /// against the vector store's dimension at startup (§3 Embedding invariant).
    fn dimension(&self) -> usize;
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbedDatum {
    embedding: Vec<f32>,
}

/// Default reqwest-backed implementation, hitting an OpenAI-embeddings-shaped
/// `POST {base_url}/embeddings` endpoint. Retries transient failures with
/// jittered backoff; the caller (this crate) manages rate limiting, per the
/// contract note that rate limits and retries are caller-managed.
pub struct HttpEmbeddingClient {
    http: reqwest::Client,
    base_url: String,
    model_id: String,
    dimension: usize,
    max_retries: u32,
}

impl HttpEmbeddingClient {
    /// Builds a client against `base_url`, configured for `model_id` producing
    /// `dimension`-wide vectors, with a per-call `timeout`.
    pub fn new(base_url: impl Into<String>, model_id: impl Into<String>, dimension: usize, timeout: Duration) -> Result<Self, EmbeddingClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmbeddingClientError::Unavailable {
                reason: e.to_string(),
            })?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            model_id: model_id.into(),
            dimension,
            max_retries: 3,
        })
    }

    async fn post_embed(&self, input: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        let url = format!("{}/embeddings", self.base_url.trim_end_matches('/'));
        let body = EmbedRequest {
            model: &self.model_id,
            input,
        };

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let result = self.http.post(&url).json(&body).send().await;
            match result {
                Ok(resp) if resp.status().is_success() => {
                    let parsed: EmbedResponse =
                        resp.json().await.map_err(|e| EmbeddingClientError::InvalidResponse {
                            reason: e.to_string(),
                        })?;
                    let vectors: Vec<Vec<f32>> =
                        parsed.data.into_iter().map(|d| d.embedding).collect();
                    for v in &vectors {
                        if v.len() != self.dimension {
                            return Err(EmbeddingClientError::InvalidResponse {
                                reason: format!(
                                    "provider returned {}-dim vector, expected {}",
                                    v.len(),
                                    self.dimension
                                ),
                            });
                        }
                    }
                    return Ok(vectors);
                }
                Ok(resp) if resp.status().is_client_error() => {
                    return Err(EmbeddingClientError::InvalidResponse {
                        reason: format!("provider returned {}", resp.status()),
                    });
                }
                Ok(resp) => {
                    warn!(status = %resp.status(), attempt, "embedding provider transient error");
                }
                Err(e) if e.is_timeout() => {
                    return Err(EmbeddingClientError::Timeout {
                        timeout_ms: self.http.get(&url).build().ok().and_then(|r| r.timeout().map(|d| d.as_millis() as u64)).unwrap_or(0),
                    });
                }
                Err(e) => {
                    warn!(error = %e, attempt, "embedding provider request failed");
                }
            }

            if attempt >= self.max_retries {
                return Err(EmbeddingClientError::Unavailable {
                    reason: format!("exhausted {attempt} attempts against {url}"),
                });
            }
            let jitter_ms = rand::thread_rng().gen_range(20..=120);
            let backoff_ms = 50u64 * (1 << (attempt - 1)) + jitter_ms;
            tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
        }
    }
}

impl EmbeddingClient for HttpEmbeddingClient {
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingClientError> {
        debug!(text_len = text.len(), "embedding single text");
        let mut vectors = self.post_embed(std::slice::from_ref(&text.to_string())).await?;
        vectors
            .pop()
            .ok_or_else(|| EmbeddingClientError::InvalidResponse {
                reason: "provider returned no embeddings".to_string(),
            })
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        debug!(count = texts.len(), "embedding batch");
        self.post_embed(texts).await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Deterministic in-memory embedder for tests: derives a pseudo-random but
/// repeatable vector from a hash of the input text, so identical queries embed
/// identically without a live provider.
#[cfg(any(test, feature = "mock"))]
pub struct MockEmbeddingClient {
    dimension: usize,
}

#[cfg(any(test, feature = "mock"))]
impl MockEmbeddingClient {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let seed = crate::hashing::hash_to_u64(text.as_bytes());
        let mut state = seed;
        (0..self.dimension)
            .map(|_| {
                // xorshift64*, deterministic and cheap.
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                ((state % 2000) as f32 / 1000.0) - 1.0
            })
            .collect()
    }
}

#[cfg(any(test, feature = "mock"))]
impl EmbeddingClient for MockEmbeddingClient {
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingClientError> {
        Ok(self.embed(text))
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
