use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::warn;

use crate::embedding::EmbeddingClient;
use crate::enhancer::QueryEnhancer;
use crate::filter::Filter;
use crate::llm::ChatLlm;
use crate::types::{dedup_by_max_retrieval_score, Query, ScoredPassage, StrategyTag};
use crate::vectordb::VectorStoreAdapter;

use super::error::RetrieveError;

/// Embeds and searches every variant in an [`crate::types::EnhancedQuerySet`]
/// concurrently, bounded by `fanout_limit` in-flight requests. Returns one result
/// list per variant, in variant order — callers decide how to combine them (union
/// for [`EnhancedRetriever`], RRF for [`super::FusionRetriever`]).
pub(crate) async fn search_variants<E: EmbeddingClient, V: VectorStoreAdapter>(
    embedder: &E,
    store: &V,
    variant_texts: &[String],
    k: usize,
    filter: Option<&Filter>,
    fanout_limit: usize,
) -> Result<Vec<Vec<ScoredPassage>>, RetrieveError> {
    let semaphore = Arc::new(Semaphore::new(fanout_limit.max(1)));
    let mut lists = Vec::with_capacity(variant_texts.len());

    let tasks = variant_texts.iter().map(|text| {
        let semaphore = Arc::clone(&semaphore);
        async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
            let embedding = embedder.embed_one(text).await?;
            store.search(embedding, k, filter).await.map_err(RetrieveError::from)
        }
    });

    for result in futures_util::future::join_all(tasks).await {
        lists.push(result?);
    }
    Ok(lists)
}

/// Enhances the query, fans embed+search out over every variant, unions the
/// results, dedups by passage identifier keeping the maximum retrieval score, and
/// truncates to `k`.
pub struct EnhancedRetriever<E: EmbeddingClient, V: VectorStoreAdapter, L: ChatLlm> {
    embedder: Arc<E>,
    store: Arc<V>,
    enhancer: Arc<QueryEnhancer<L>>,
    strategies: Vec<StrategyTag>,
    fanout_limit: usize,
}

impl<E: EmbeddingClient, V: VectorStoreAdapter, L: ChatLlm> EnhancedRetriever<E, V, L> {
    pub fn new(embedder: Arc<E>, store: Arc<V>, enhancer: Arc<QueryEnhancer<L>>, strategies: Vec<StrategyTag>, fanout_limit: usize) -> Self {
        Self {
            embedder,
            store,
            enhancer,
            strategies,
            fanout_limit,
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

        if lists.iter().all(Vec::is_empty) {
            warn!(variant_count = texts.len(), "enhanced retrieval found no results across any variant");
        }

        let union: Vec<ScoredPassage> = lists.into_iter().flatten().collect();
        let mut deduped = dedup_by_max_retrieval_score(union);
        deduped.sort_by(|a, b| b.retrieval_score.partial_cmp(&a.retrieval_score).unwrap_or(std::cmp::Ordering::Equal));
        deduped.truncate(k);
        Ok(deduped)
    }
}

/// Per-passage RRF accumulator: the rank each variant's list assigned the passage.
pub(crate) struct FusionAccumulator {
    pub max_retrieval_score: f32,
    pub rrf_score: f64,
}

pub(crate) fn reciprocal_rank_fusion(lists: &[Vec<ScoredPassage>], rrf_constant: f64) -> HashMap<String, (ScoredPassage, FusionAccumulator)> {
    let mut accumulators: HashMap<String, (ScoredPassage, FusionAccumulator)> = HashMap::new();

    for list in lists {
        for (rank, scored) in list.iter().enumerate() {
            let contribution = 1.0 / (rank as f64 + 1.0 + rrf_constant);
            accumulators
                .entry(scored.id().to_string())
                .and_modify(|(existing, acc)| {
                    acc.rrf_score += contribution;
                    if scored.retrieval_score > existing.retrieval_score {
                        *existing = scored.clone();
                    }
                    acc.max_retrieval_score = acc.max_retrieval_score.max(scored.retrieval_score);
                })
                .or_insert_with(|| {
                    (
                        scored.clone(),
                        FusionAccumulator {
                            max_retrieval_score: scored.retrieval_score,
                            rrf_score: contribution,
                        },
                    )
                });
        }
    }

    accumulators
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::MockEmbeddingClient;
    use crate::llm::MockChatLlm;
    use crate::types::{DocumentStatus, DocumentType, Passage};
    use crate::vectordb::MockVectorStoreAdapter;
    use std::time::Duration;

    fn passage(id: &str) -> Passage {
        Passage {
            id: id.to_string(),
            content: format!("nội dung {id}"),
            document_id: "doc-1".to_string(),
            document_title: "Luật Đấu Thầu".to_string(),
            hierarchy_path: vec![],
            document_type: DocumentType::Law,
            status: DocumentStatus::Active,
            valid_until: None,
            metadata: Default::default(),
        }
    }

    #[tokio::test]
    async fn unions_and_dedups_across_variants() {
        let embedder = Arc::new(MockEmbeddingClient::new(8));
        let store = Arc::new(MockVectorStoreAdapter::new(8));
        for i in 0..10 {
            let text = format!("p{i}");
            store.insert(passage(&text), embedder.embed_one(&text).await.unwrap());
        }

        let enhancer = Arc::new(QueryEnhancer::new(Arc::new(MockChatLlm::respond_with("p1\np2")), 4, Duration::from_millis(200)));
        let retriever = EnhancedRetriever::new(embedder, store, enhancer, vec![StrategyTag::MultiQuery], 4);

        let results = retriever.retrieve(&Query::new("p0"), 5, None).await.unwrap();
        assert!(results.len() <= 5);
        let ids: std::collections::HashSet<_> = results.iter().map(|r| r.id().to_string()).collect();
        assert_eq!(ids.len(), results.len(), "no duplicate ids");
    }

    #[test]
    fn rrf_accumulates_across_lists() {
        let list_a = vec![ScoredPassage::from_retrieval(passage("p1"), 0.9), ScoredPassage::from_retrieval(passage("p2"), 0.5)];
        let list_b = vec![ScoredPassage::from_retrieval(passage("p2"), 0.6), ScoredPassage::from_retrieval(passage("p1"), 0.4)];

        let accumulated = reciprocal_rank_fusion(&[list_a, list_b], 60.0);
        assert_eq!(accumulated.len(), 2);
        let (_, p1_acc) = &accumulated["p1"];
        assert!(p1_acc.rrf_score > 0.0);
    }
}
