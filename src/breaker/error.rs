use thiserror::Error;

/// Wraps either a short-circuited call (breaker open) or the inner error the
/// wrapped call itself produced.
#[derive(Debug, Error)]
pub enum BreakerError<E: std::error::Error + 'static> {
    #[error("circuit breaker open for {dependency}")]
    Open { dependency: &'static str },

    #[error(transparent)]
    Inner(#[from] E),
}
