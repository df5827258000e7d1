use tracing::{debug, warn};

use crate::embedding::{Reranker, RerankerConfig};
use crate::types::ScoredPassage;

use super::error::ScoringError;
use super::types::RerankOutcome;

/// Cross-encoder reranker wrapping [`Reranker`] for passage-level use (§4.7):
/// scores `(query, passage.content)` pairs in batches sized to the device, and
/// degrades gracefully — unchanged input order plus a warning — rather than failing
/// the whole request when a batch errors.
pub struct CrossEncoderReranker {
    reranker: Reranker,
    batch_size: usize,
}

impl std::fmt::Debug for CrossEncoderReranker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrossEncoderReranker")
            .field("reranker", &self.reranker)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl CrossEncoderReranker {
    /// Creates a reranker from a config and a device-appropriate batch size
    /// (`reranker_batch_size` in [`crate::config::Config`] — larger on an
    /// accelerator, smaller on CPU).
    pub fn new(config: RerankerConfig, batch_size: usize) -> Result<Self, ScoringError> {
        let reranker = Reranker::load(config)?;
        Ok(Self {
            reranker,
            batch_size: batch_size.max(1),
        })
    }

    /// Creates a reranker in stub mode (lexical-overlap heuristic, no model files
    /// required) — used when no model path is configured.
    pub fn stub(batch_size: usize) -> Result<Self, ScoringError> {
        Ok(Self {
            reranker: Reranker::stub()?,
            batch_size: batch_size.max(1),
        })
    }

    pub fn is_model_loaded(&self) -> bool {
        self.reranker.is_model_loaded()
    }

    pub fn threshold(&self) -> f32 {
        self.reranker.threshold()
    }

    /// Scores and reorders `passages` against `query_text`, keeping only the top
    /// `top_n`. Ties are broken by retrieval score, then passage id, via
    /// [`ScoredPassage::ranking_cmp`]. The first scoring failure aborts the rest of
    /// the pass: no further passages are scored, the sort is skipped, and `passages`
    /// is returned truncated but otherwise in its original (pre-rerank) order with
    /// [`RerankOutcome::Degraded`] — an unreordered result beats a failed request,
    /// but a partially-reordered one would be worse than either.
    pub fn rerank(&self, query_text: &str, passages: Vec<ScoredPassage>, top_n: usize) -> (Vec<ScoredPassage>, RerankOutcome) {
        rerank_with(passages, self.batch_size, top_n, |content| {
            self.reranker.score(query_text, content).map_err(ScoringError::from)
        })
    }
}

/// Scores `passages` in chunks of `batch_size`, aborting the whole pass — no further
/// chunks scored, sort skipped — on the first failure anywhere. Factored out of
/// [`CrossEncoderReranker::rerank`] so the abort/preserve-order semantics can be
/// exercised against a scoring closure that fails on demand, without needing a real
/// model load to fail.
fn rerank_with(
    mut passages: Vec<ScoredPassage>,
    batch_size: usize,
    top_n: usize,
    mut score: impl FnMut(&str) -> Result<f32, ScoringError>,
) -> (Vec<ScoredPassage>, RerankOutcome) {
    let mut outcome = RerankOutcome::Scored;

    'chunks: for chunk in passages.chunks_mut(batch_size.max(1)) {
        for passage in chunk.iter_mut() {
            match score(&passage.passage.content) {
                Ok(s) => passage.rerank_score = Some(s),
                Err(err) => {
                    warn!(error = %err, passage_id = passage.id(), "reranker_unavailable");
                    outcome = RerankOutcome::Degraded;
                    break 'chunks;
                }
            }
        }
    }

    if outcome.is_degraded() {
        debug!("reranking aborted after a scoring failure; returning passages in upstream order");
        passages.truncate(top_n);
        return (passages, outcome);
    }

    passages.sort_by(|a, b| a.ranking_cmp(b));
    passages.truncate(top_n);
    (passages, outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DocumentStatus, DocumentType, Passage};

    fn passage(id: &str, content: &str, retrieval_score: f32) -> ScoredPassage {
        ScoredPassage::from_retrieval(
            Passage {
                id: id.to_string(),
                content: content.to_string(),
                document_id: "doc-1".to_string(),
                document_title: "Luat Dau Thau".to_string(),
                hierarchy_path: vec![],
                document_type: DocumentType::Law,
                status: DocumentStatus::Active,
                valid_until: None,
                metadata: Default::default(),
            },
            retrieval_score,
        )
    }

    #[test]
    fn stub_reranker_scores_every_passage() {
        let reranker = CrossEncoderReranker::stub(8).unwrap();
        let passages = vec![
            passage("p1", "thời hạn bảo đảm dự thầu", 0.5),
            passage("p2", "không liên quan", 0.9),
        ];

        let (ranked, outcome) = reranker.rerank("thời hạn bảo đảm dự thầu", passages, 2);
        assert_eq!(outcome, RerankOutcome::Scored);
        assert!(ranked.iter().all(|p| p.rerank_score.is_some()));
    }

    #[test]
    fn rerank_truncates_to_top_n() {
        let reranker = CrossEncoderReranker::stub(8).unwrap();
        let passages = vec![
            passage("p1", "a", 0.1),
            passage("p2", "b", 0.2),
            passage("p3", "c", 0.3),
        ];

        let (ranked, _) = reranker.rerank("query", passages, 1);
        assert_eq!(ranked.len(), 1);
    }

    #[test]
    fn batching_covers_all_passages_across_multiple_chunks() {
        let reranker = CrossEncoderReranker::stub(1).unwrap();
        let passages = vec![passage("p1", "a", 0.1), passage("p2", "b", 0.2), passage("p3", "c", 0.3)];

        let (ranked, outcome) = reranker.rerank("query", passages, 10);
        assert_eq!(outcome, RerankOutcome::Scored);
        assert_eq!(ranked.len(), 3);
        assert!(ranked.iter().all(|p| p.rerank_score.is_some()));
    }

    #[test]
    fn scoring_failure_aborts_and_preserves_upstream_order() {
        let passages = vec![passage("p1", "a", 0.1), passage("p2", "b", 0.2), passage("p3", "c", 0.3)];
        let mut calls = 0;
        let (ranked, outcome) = rerank_with(passages, 1, 10, |_| {
            calls += 1;
            if calls == 2 {
                Err(ScoringError::InvalidInput { reason: "simulated failure".to_string() })
            } else {
                Ok(1.0)
            }
        });

        assert_eq!(outcome, RerankOutcome::Degraded);
        assert_eq!(calls, 2, "scoring must stop at the first failure instead of continuing to later chunks");
        assert_eq!(ranked.iter().map(|p| p.id()).collect::<Vec<_>>(), vec!["p1", "p2", "p3"], "order must be unchanged on degradation");
        assert_eq!(ranked[0].rerank_score, Some(1.0));
        assert!(ranked[1].rerank_score.is_none());
        assert!(ranked[2].rerank_score.is_none(), "passages past the failing chunk must never be scored");
    }

    #[test]
    fn scoring_failure_still_truncates_to_top_n() {
        let passages = vec![passage("p1", "a", 0.1), passage("p2", "b", 0.2), passage("p3", "c", 0.3)];
        let (ranked, outcome) = rerank_with(passages, 1, 2, |_| Err(ScoringError::InvalidInput { reason: "always fails".to_string() }));

        assert_eq!(outcome, RerankOutcome::Degraded);
        assert_eq!(ranked.iter().map(|p| p.id()).collect::<Vec<_>>(), vec!["p1", "p2"]);
    }
}
