use std::sync::Arc;

use crate::constants::DEFAULT_RRF_CONSTANT;
use crate::embedding::EmbeddingClient;
use crate::enhancer::QueryEnhancer;
use crate::filter::Filter;
use crate::llm::ChatLlm;
use crate::types::{Query, ScoredPassage, StrategyTag};
use crate::vectordb::VectorStoreAdapter;

use super::enhanced::{reciprocal_rank_fusion, search_variants};
use super::error::RetrieveError;

/// Combines Enhanced's per-variant result lists with reciprocal rank fusion
/// (`C = `[`DEFAULT_RRF_CONSTANT`]) instead of a plain union — passages that rank
/// highly across several variants outrank a passage that ranks first in only one.
pub struct FusionRetriever<E: EmbeddingClient, V: VectorStoreAdapter, L: ChatLlm> {
    embedder: Arc<E>,
    store: Arc<V>,
    enhancer: Arc<QueryEnhancer<L>>,
    strategies: Vec<StrategyTag>,
    fanout_limit: usize,
    rrf_constant: f64,
}

impl<E: EmbeddingClient, V: VectorStoreAdapter, L: ChatLlm> FusionRetriever<E, V, L> {
    pub fn new(embedder: Arc<E>, store: Arc<V>, enhancer: Arc<QueryEnhancer<L>>, strategies: Vec<StrategyTag>, fanout_limit: usize) -> Self {
        Self {
            embedder,
            store,
            enhancer,
            strategies,
            fanout_limit,
            rrf_constant: DEFAULT_RRF_CONSTANT,
        }
    }

    pub async fn retrieve(&self, query: &Query, k: usize, filter: Option<&Filter>) -> Result<Vec<ScoredPassage>, RetrieveError> {
        if query.is_empty() {
            return Err(RetrieveError::InvalidInput {
                reason: "query text is empty".to_string(),
            });
        }

        let variants = self.enhancer.enhance(query, &self.strategies).await;
        let texts: Vec<String> = variants.texts().map(str::to_string).collect();

        let lists = search_variants(self.embedder.as_ref(), self.store.as_ref(), &texts, k, filter, self.fanout_limit).await?;

        let accumulated = reciprocal_rank_fusion(&lists, self.rrf_constant);

        let mut fused: Vec<ScoredPassage> = accumulated
            .into_values()
            .map(|(mut scored, acc)| {
                scored.fusion_score = Some(acc.rrf_score);
                scored.retrieval_score = acc.max_retrieval_score;
                scored
            })
            .collect();

        fused.sort_by(|a, b| {
            b.fusion_score
                .partial_cmp(&a.fusion_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.retrieval_score.partial_cmp(&a.retrieval_score).unwrap_or(std::cmp::Ordering::Equal))
                .then_with(|| a.id().cmp(b.id()))
        });
        fused.truncate(k);
        Ok(fused)
    }
}
