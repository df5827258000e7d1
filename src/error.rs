//! Top-level error taxonomy (§7). `AskError` is the only error type that crosses
//! the [`crate::orchestrator::PipelineOrchestrator::ask`] boundary; every internal
//! module error converts into it at the orchestrator seam.

use thiserror::Error;

/// Stage the orchestrator had reached when a request failed, used both for the
/// `Failed(stage)` state-machine edge (§4.9) and for user-visible diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestStage {
    Admission,
    CacheLookup,
    Enhancement,
    Retrieval,
    Reranking,
    Composition,
    CachePopulation,
}

impl RequestStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admission => "admission",
            Self::CacheLookup => "cache_lookup",
            Self::Enhancement => "enhancement",
            Self::Retrieval => "retrieval",
            Self::Reranking => "reranking",
            Self::Composition => "composition",
            Self::CachePopulation => "cache_population",
        }
    }
}

impl std::fmt::Display for RequestStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The error-kind taxonomy from §7, kinds not types: every fallible path in the
/// core eventually maps into one of these six variants.
#[derive(Debug, Error)]
pub enum AskError {
    /// Empty query, unsupported mode, malformed filter. No retry.
    #[error("invalid input at {stage}: {message}")]
    InputInvalid {
        stage: RequestStage,
        message: String,
    },

    /// Admission semaphore saturated within the admission deadline. Caller may retry
    /// after back-off.
    #[error("overloaded: no admission permit within deadline")]
    Overloaded,

    /// Vector store, embedding provider, chat LLM, or shared cache failed or is
    /// breakered, on a stage that does not tolerate degradation.
    #[error("dependency unavailable at {stage}: {message}")]
    DependencyUnavailable {
        stage: RequestStage,
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// The reranker could not be loaded. The orchestrator degrades to the equivalent
    /// non-reranking mode rather than returning this in the common case; it surfaces
    /// only when degradation itself is not possible.
    #[error("model unavailable: {message}")]
    ModelUnavailable { message: String },

    /// Total deadline hit before retrieval completed (if retrieval had completed, the
    /// orchestrator instead returns a partial [`crate::orchestrator::Answer`] with
    /// `generation_failed = true`, not this error).
    #[error("deadline exceeded at {stage}")]
    DeadlineExceeded { stage: RequestStage },

    /// Dimension mismatch, duplicate identifiers, cache corruption: the process is
    /// unhealthy and the caller should not retry.
    #[error("internal invariant violated: {message}")]
    InternalInvariantViolation { message: String },
}

impl AskError {
    /// Stable, wire-independent error-kind code for callers that branch on kind
    /// rather than parsing the `Display` message.
    pub fn kind_code(&self) -> &'static str {
        match self {
            Self::InputInvalid { .. } => "input_invalid",
            Self::Overloaded => "overloaded",
            Self::DependencyUnavailable { .. } => "dependency_unavailable",
            Self::ModelUnavailable { .. } => "model_unavailable",
            Self::DeadlineExceeded { .. } => "deadline_exceeded",
            Self::InternalInvariantViolation { .. } => "internal_invariant_violation",
        }
    }

    pub fn stage(&self) -> Option<RequestStage> {
        match self {
            Self::InputInvalid { stage, .. } => Some(*stage),
            Self::DependencyUnavailable { stage, .. } => Some(*stage),
            Self::DeadlineExceeded { stage } => Some(*stage),
            Self::Overloaded | Self::ModelUnavailable { .. } | Self::InternalInvariantViolation { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_codes_are_stable() {
        assert_eq!(
            AskError::InputInvalid {
                stage: RequestStage::Admission,
                message: "empty query".into()
            }
            .kind_code(),
            "input_invalid"
        );
        assert_eq!(AskError::Overloaded.kind_code(), "overloaded");
    }

    #[test]
    fn stage_is_reported_where_applicable() {
        let err = AskError::DeadlineExceeded {
            stage: RequestStage::Retrieval,
        };
        assert_eq!(err.stage(), Some(RequestStage::Retrieval));
        assert_eq!(AskError::Overloaded.stage(), None);
    }
}
