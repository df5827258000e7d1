//! Hand-rolled per-dependency circuit breaker (§9 back-pressure, §4.9 implementation
//! notes): a sliding window of recent call outcomes feeds a three-state machine
//! (closed → open → half-open) so a failing dependency short-circuits to
//! `DependencyUnavailable` instead of piling up timeouts under load.

mod error;

pub use error::BreakerError;

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{info, warn};

const CLOSED: u8 = 0;
const OPEN: u8 = 1;
const HALF_OPEN: u8 = 2;

/// One circuit breaker instance per external dependency (vector store, embedding
/// provider, chat LLM, shared cache — §9).
pub struct CircuitBreaker {
    name: &'static str,
    window: usize,
    threshold: f64,
    cooloff: Duration,
    state: AtomicU8,
    outcomes: Mutex<VecDeque<bool>>,
    opened_at: StdMutex<Option<Instant>>,
}

impl CircuitBreaker {
    pub fn new(name: &'static str, window: usize, threshold: f64, cooloff: Duration) -> Self {
        Self {
            name,
            window: window.max(1),
            threshold,
            cooloff,
            state: AtomicU8::new(CLOSED),
            outcomes: Mutex::new(VecDeque::with_capacity(window.max(1))),
            opened_at: StdMutex::new(None),
        }
    }

    /// Runs `f` if the breaker allows it, recording the outcome. Returns
    /// [`BreakerError::Open`] without calling `f` at all when the circuit is open
    /// and the cool-off hasn't elapsed yet.
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.allow_request() {
            return Err(BreakerError::Open { dependency: self.name });
        }

        match f().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                self.record_failure();
                Err(BreakerError::Inner(err))
            }
        }
    }

    /// `true` if a call may proceed right now: closed or half-open always allow it;
    /// open allows it only once the cool-off has elapsed, at which point the
    /// breaker transitions itself to half-open for a single trial call.
    fn allow_request(&self) -> bool {
        match self.state.load(Ordering::Acquire) {
            CLOSED | HALF_OPEN => true,
            OPEN => {
                let elapsed = self.opened_at.lock().unwrap().map(|at| at.elapsed());
                match elapsed {
                    Some(elapsed) if elapsed >= self.cooloff => {
                        self.state.store(HALF_OPEN, Ordering::Release);
                        info!(dependency = self.name, "breaker entering half-open trial");
                        true
                    }
                    _ => false,
                }
            }
            _ => unreachable!("breaker state is one of CLOSED, OPEN, HALF_OPEN"),
        }
    }

    fn record_success(&self) {
        self.push_outcome(true);
        if self.state.load(Ordering::Acquire) == HALF_OPEN {
            self.state.store(CLOSED, Ordering::Release);
            info!(dependency = self.name, "breaker closed after successful half-open trial");
        }
    }

    fn record_failure(&self) {
        self.push_outcome(false);

        if self.state.load(Ordering::Acquire) == HALF_OPEN {
            self.open();
            return;
        }

        let failure_rate = self.failure_rate();
        if failure_rate >= self.threshold {
            self.open();
        }
    }

    fn open(&self) {
        self.state.store(OPEN, Ordering::Release);
        *self.opened_at.lock().unwrap() = Some(Instant::now());
        warn!(dependency = self.name, "breaker opened");
    }

    fn push_outcome(&self, success: bool) {
        let mut outcomes = self.outcomes.lock();
        if outcomes.len() == self.window {
            outcomes.pop_front();
        }
        outcomes.push_back(success);
    }

    fn failure_rate(&self) -> f64 {
        let outcomes = self.outcomes.lock();
        if outcomes.is_empty() {
            return 0.0;
        }
        let failures = outcomes.iter().filter(|ok| !**ok).count();
        failures as f64 / outcomes.len() as f64
    }

    pub fn is_open(&self) -> bool {
        self.state.load(Ordering::Acquire) == OPEN
    }

    /// Manual gate for call sites that can't express their work as a
    /// `FnOnce() -> Future<Output = Result<T, E>>` (e.g. [`AnswerComposer::compose`],
    /// which always returns a value and folds its own failure into a flag). Pair
    /// with [`Self::observe`] to report the outcome back into the sliding window.
    pub fn allow(&self) -> bool {
        self.allow_request()
    }

    /// Reports the outcome of a call gated by [`Self::allow`].
    pub fn observe(&self, success: bool) {
        if success {
            self.record_success();
        } else {
            self.record_failure();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct TestError;

    #[tokio::test]
    async fn closed_breaker_allows_calls() {
        let breaker = CircuitBreaker::new("test", 10, 0.5, Duration::from_millis(10));
        let result: Result<_, BreakerError<TestError>> = breaker.call(|| async { Ok::<_, TestError>(1) }).await;
        assert_eq!(result.unwrap(), 1);
    }

    #[tokio::test]
    async fn opens_after_threshold_failure_rate() {
        let breaker = CircuitBreaker::new("test", 4, 0.5, Duration::from_secs(30));
        for _ in 0..3 {
            let _: Result<(), BreakerError<TestError>> = breaker.call(|| async { Err(TestError) }).await;
        }
        assert!(breaker.is_open());

        let result: Result<(), BreakerError<TestError>> = breaker.call(|| async { Ok(()) }).await;
        assert!(matches!(result, Err(BreakerError::Open { .. })));
    }

    #[tokio::test]
    async fn half_open_trial_closes_on_success() {
        let breaker = CircuitBreaker::new("test", 2, 0.5, Duration::from_millis(5));
        for _ in 0..2 {
            let _: Result<(), BreakerError<TestError>> = breaker.call(|| async { Err(TestError) }).await;
        }
        assert!(breaker.is_open());

        tokio::time::sleep(Duration::from_millis(10)).await;
        let result: Result<_, BreakerError<TestError>> = breaker.call(|| async { Ok::<_, TestError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
        assert!(!breaker.is_open());
    }

    #[tokio::test]
    async fn half_open_trial_reopens_on_failure() {
        let breaker = CircuitBreaker::new("test", 2, 0.5, Duration::from_millis(5));
        for _ in 0..2 {
            let _: Result<(), BreakerError<TestError>> = breaker.call(|| async { Err(TestError) }).await;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        let _: Result<(), BreakerError<TestError>> = breaker.call(|| async { Err(TestError) }).await;
        assert!(breaker.is_open());
    }
}
