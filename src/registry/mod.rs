//! Model registry (§4.9, §5 implementation notes): the process-wide singleton home
//! for the two in-process model handles — the embedding client and the cross-encoder
//! reranker. Each lives behind a [`tokio::sync::RwLock`]-guarded slot, so the first
//! request pays the load cost and every later request reuses the handle; a failed
//! first load is remembered for `registry_backoff_ms` before the next request is
//! allowed to retry it, so one bad request doesn't turn into a reload storm.
//!
//! Unlike a bare `OnceCell`, a slot can also be torn down explicitly via
//! [`ModelRegistry::teardown_embedder`]/[`ModelRegistry::teardown_reranker`] — the
//! capability the "at most one concurrently live reranker instance" invariant
//! depends on: a caller that needs to replace a loaded model (a config reload, a
//! device eviction) drops the returned handle and the next `get_*` call reloads a
//! fresh one, instead of the process being stuck with whatever loaded first.

mod error;

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::RwLock;
use tracing::warn;

pub use error::RegistryError;

use crate::embedding::EmbeddingClient;
use crate::scoring::CrossEncoderReranker;

/// Owns the embedder and reranker singleton slots. Generic over the embedding
/// client implementation so tests can register a [`crate::embedding::MockEmbeddingClient`]
/// factory without touching production wiring.
pub struct ModelRegistry<E: EmbeddingClient + 'static> {
    embedder: RwLock<Option<Arc<E>>>,
    reranker: RwLock<Option<Arc<CrossEncoderReranker>>>,
    embedder_last_failure: Mutex<Option<Instant>>,
    reranker_last_failure: Mutex<Option<Instant>>,
    backoff: Duration,
    embedder_init: Box<dyn Fn() -> Result<E, crate::embedding::EmbeddingClientError> + Send + Sync>,
    reranker_init: Box<dyn Fn() -> Result<CrossEncoderReranker, crate::scoring::ScoringError> + Send + Sync>,
}

impl<E: EmbeddingClient + 'static> std::fmt::Debug for ModelRegistry<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("embedder_loaded", &self.is_embedder_loaded())
            .field("reranker_loaded", &self.is_reranker_loaded())
            .finish()
    }
}

impl<E: EmbeddingClient + 'static> ModelRegistry<E> {
    /// Builds a registry with `backoff` as the post-failure cooldown
    /// (`registry_backoff_ms`), given the factories each slot lazily invokes on
    /// first access.
    pub fn new(
        backoff: Duration,
        embedder_init: impl Fn() -> Result<E, crate::embedding::EmbeddingClientError> + Send + Sync + 'static,
        reranker_init: impl Fn() -> Result<CrossEncoderReranker, crate::scoring::ScoringError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            embedder: RwLock::new(None),
            reranker: RwLock::new(None),
            embedder_last_failure: Mutex::new(None),
            reranker_last_failure: Mutex::new(None),
            backoff,
            embedder_init: Box::new(embedder_init),
            reranker_init: Box::new(reranker_init),
        }
    }

    /// Returns the embedder, loading it on first call (or the first call after a
    /// [`Self::teardown_embedder`]). Independent of the reranker's load state and
    /// backoff clock.
    pub async fn get_embedder(&self) -> Result<Arc<E>, RegistryError> {
        if let Some(handle) = self.embedder.read().await.as_ref() {
            return Ok(handle.clone());
        }
        check_backoff("embedder", &self.embedder_last_failure, self.backoff)?;

        let mut slot = self.embedder.write().await;
        if let Some(handle) = slot.as_ref() {
            return Ok(handle.clone());
        }

        match (self.embedder_init)() {
            Ok(client) => {
                let handle = Arc::new(client);
                *slot = Some(handle.clone());
                Ok(handle)
            }
            Err(err) => {
                *self.embedder_last_failure.lock() = Some(Instant::now());
                warn!(error = %err, "embedder initialization failed, entering backoff");
                Err(RegistryError::EmbedderInitFailed(err))
            }
        }
    }

    /// Returns the reranker, loading it on first call (or the first call after a
    /// [`Self::teardown_reranker`]). Independent of the embedder's load state and
    /// backoff clock.
    pub async fn get_reranker(&self) -> Result<Arc<CrossEncoderReranker>, RegistryError> {
        if let Some(handle) = self.reranker.read().await.as_ref() {
            return Ok(handle.clone());
        }
        check_backoff("reranker", &self.reranker_last_failure, self.backoff)?;

        let mut slot = self.reranker.write().await;
        if let Some(handle) = slot.as_ref() {
            return Ok(handle.clone());
        }

        match (self.reranker_init)() {
            Ok(reranker) => {
                let handle = Arc::new(reranker);
                *slot = Some(handle.clone());
                Ok(handle)
            }
            Err(err) => {
                *self.reranker_last_failure.lock() = Some(Instant::now());
                warn!(error = %err, "reranker initialization failed, entering backoff");
                Err(RegistryError::RerankerInitFailed(err))
            }
        }
    }

    /// Evicts the embedder slot, returning the outgoing handle (if one was loaded)
    /// so the caller can observe it drop. The next [`Self::get_embedder`] call
    /// reloads from scratch, ignoring any backoff left over from before the
    /// teardown — a teardown is a deliberate reset, not a failure.
    pub async fn teardown_embedder(&self) -> Option<Arc<E>> {
        let outgoing = self.embedder.write().await.take();
        *self.embedder_last_failure.lock() = None;
        outgoing
    }

    /// Evicts the reranker slot, returning the outgoing handle (if one was loaded).
    /// This is what lets the registry honor "at most one concurrently live reranker
    /// instance": a caller that wants to load a new reranker first tears down the
    /// old one, drops its own reference, and only then calls [`Self::get_reranker`]
    /// again — at no point are two reranker instances reachable through the
    /// registry at once.
    pub async fn teardown_reranker(&self) -> Option<Arc<CrossEncoderReranker>> {
        let outgoing = self.reranker.write().await.take();
        *self.reranker_last_failure.lock() = None;
        outgoing
    }

    /// `true` once both slots have successfully loaded at least once; used by the
    /// orchestrator's health aggregation to report device/model readiness. A
    /// contended slot (a load or teardown in flight) reports as not-yet-loaded
    /// rather than blocking.
    pub fn is_fully_loaded(&self) -> bool {
        self.is_embedder_loaded() && self.is_reranker_loaded()
    }

    /// `true` if the embedder slot currently holds a loaded handle, independent of
    /// the reranker's state.
    pub fn is_embedder_loaded(&self) -> bool {
        self.embedder.try_read().map(|slot| slot.is_some()).unwrap_or(false)
    }

    /// `true` if the reranker slot currently holds a loaded handle, independent of
    /// the embedder's state.
    pub fn is_reranker_loaded(&self) -> bool {
        self.reranker.try_read().map(|slot| slot.is_some()).unwrap_or(false)
    }
}

fn check_backoff(slot: &'static str, last_failure: &Mutex<Option<Instant>>, backoff: Duration) -> Result<(), RegistryError> {
    if let Some(last) = *last_failure.lock() {
        let elapsed = last.elapsed();
        if elapsed < backoff {
            return Err(RegistryError::Backoff {
                slot,
                retry_after_ms: (backoff - elapsed).as_millis() as u64,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::MockEmbeddingClient;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registry_with_failing_embedder(attempts: Arc<AtomicUsize>, backoff: Duration) -> ModelRegistry<MockEmbeddingClient> {
        ModelRegistry::new(
            backoff,
            move || {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(crate::embedding::EmbeddingClientError::Unavailable {
                    reason: "simulated failure".to_string(),
                })
            },
            || crate::scoring::CrossEncoderReranker::stub(8).map_err(Into::into),
        )
    }

    #[tokio::test]
    async fn successful_load_is_cached() {
        let registry = ModelRegistry::new(
            Duration::from_secs(30),
            || Ok(MockEmbeddingClient::new(8)),
            || crate::scoring::CrossEncoderReranker::stub(8).map_err(Into::into),
        );

        let a = registry.get_embedder().await.unwrap();
        let b = registry.get_embedder().await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn failed_load_enters_backoff() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let registry = registry_with_failing_embedder(attempts.clone(), Duration::from_secs(30));

        assert!(registry.get_embedder().await.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);

        let err = registry.get_embedder().await.unwrap_err();
        assert!(matches!(err, RegistryError::Backoff { slot: "embedder", .. }));
        assert_eq!(attempts.load(Ordering::SeqCst), 1, "backoff should prevent a second attempt");
    }

    #[tokio::test]
    async fn backoff_expires_and_allows_retry() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let registry = registry_with_failing_embedder(attempts.clone(), Duration::from_millis(1));

        assert!(registry.get_embedder().await.is_err());
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(registry.get_embedder().await.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn slots_are_independent() {
        let registry = ModelRegistry::new(
            Duration::from_secs(30),
            || Ok(MockEmbeddingClient::new(8)),
            || crate::scoring::CrossEncoderReranker::stub(8).map_err(Into::into),
        );

        assert!(registry.get_reranker().await.is_ok());
        assert!(!registry.is_fully_loaded());
        assert!(registry.get_embedder().await.is_ok());
        assert!(registry.is_fully_loaded());
    }

    #[tokio::test]
    async fn teardown_embedder_evicts_the_slot_and_allows_a_fresh_load() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let registry = ModelRegistry::new(
            Duration::from_secs(30),
            {
                let attempts = attempts.clone();
                move || {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Ok(MockEmbeddingClient::new(8))
                }
            },
            || crate::scoring::CrossEncoderReranker::stub(8).map_err(Into::into),
        );

        let first = registry.get_embedder().await.unwrap();
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(registry.is_embedder_loaded());

        let evicted = registry.teardown_embedder().await.unwrap();
        assert!(Arc::ptr_eq(&first, &evicted));
        assert!(!registry.is_embedder_loaded());

        let second = registry.get_embedder().await.unwrap();
        assert_eq!(attempts.load(Ordering::SeqCst), 2, "a torn-down slot reloads on the next access");
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn teardown_of_an_unloaded_slot_is_a_no_op() {
        let registry = ModelRegistry::new(
            Duration::from_secs(30),
            || Ok(MockEmbeddingClient::new(8)),
            || crate::scoring::CrossEncoderReranker::stub(8).map_err(Into::into),
        );
        assert!(registry.teardown_reranker().await.is_none());
    }

    #[tokio::test]
    async fn teardown_clears_a_pending_backoff() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let registry = registry_with_failing_embedder(attempts.clone(), Duration::from_secs(30));

        assert!(registry.get_embedder().await.is_err());
        assert!(matches!(
            registry.get_embedder().await.unwrap_err(),
            RegistryError::Backoff { slot: "embedder", .. }
        ));

        registry.teardown_embedder().await;
        assert_eq!(attempts.load(Ordering::SeqCst), 1, "teardown itself must not trigger a reload");

        assert!(registry.get_embedder().await.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 2, "teardown clears backoff so the next call retries immediately");
    }
}
