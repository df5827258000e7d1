//! Top-level pipeline assembly (§4.9): `ask()` drives the eight sequential stages
//! (admission, cache lookup, enhancement, retrieval, reranking, composition, cache
//! population, permit release) and maps every internal module error into the
//! [`crate::error::AskError`] taxonomy that alone crosses this boundary.

mod types;

pub use types::{Answer, CitationRef, HealthReport, LatencyBreakdown, StageSummary};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tracing::instrument;

use crate::breaker::{BreakerError, CircuitBreaker};
use crate::cache::{CacheEntry, CacheLayerHit, SharedCache, TieredCache};
use crate::compose::AnswerComposer;
use crate::config::{Config, Mode, ModeProfile};
use crate::embedding::EmbeddingClient;
use crate::enhancer::QueryEnhancer;
use crate::error::{AskError, RequestStage};
use crate::filter::Filter;
use crate::llm::ChatLlm;
use crate::registry::ModelRegistry;
use crate::retriever::{self, complexity_score, interpolate_k};
use crate::types::{dedup_by_max_retrieval_score, Passage, Query, ScoredPassage, StrategyTag};
use crate::vectordb::VectorStoreAdapter;

/// Below this complexity, adaptive mode retrieves at the ramp's low end without
/// enhancement; at or above it, enhancement runs (mirrors `retriever::adaptive`'s
/// own threshold — duplicated here because the orchestrator needs the enhanced
/// variant count for `stages.enhanced_n`, which the retriever wrapper doesn't
/// surface on its own).
const ADAPTIVE_ENHANCEMENT_THRESHOLD: f64 = 0.4;
const ADAPTIVE_RERANK_MIN_K: usize = 5;

/// Owns every long-lived dependency handle and drives `ask()`. Generic over the
/// embedding client, vector store, shared-cache, and chat-LLM implementations so
/// production wiring and test wiring (mock feature) share one code path.
pub struct PipelineOrchestrator<E, V, S, L>
where
    E: EmbeddingClient + 'static,
    V: VectorStoreAdapter + 'static,
    S: SharedCache + 'static,
    L: ChatLlm + 'static,
{
    config: Config,
    registry: Arc<ModelRegistry<E>>,
    store: Arc<V>,
    cache: Arc<TieredCache<S>>,
    enhancer: Arc<QueryEnhancer<L>>,
    composer: AnswerComposer<L>,
    admission: Arc<Semaphore>,
    breaker_store: CircuitBreaker,
    breaker_llm: CircuitBreaker,
    breaker_cache: CircuitBreaker,
}

impl<E, V, S, L> PipelineOrchestrator<E, V, S, L>
where
    E: EmbeddingClient + 'static,
    V: VectorStoreAdapter + 'static,
    S: SharedCache + 'static,
    L: ChatLlm + 'static,
{
    /// Construction order mirrors the teacher's bootstrap discipline: the registry
    /// and store are built by the caller first, then the cache, then this — and this
    /// constructor is the single check point that actually enforces the startup
    /// invariant that the embedder and store dimensions agree
    /// ([`crate::constants::validate_embedding_dim`]); the process refuses to start
    /// with a mismatched pair rather than surfacing it later as a confusing
    /// per-request [`crate::vectordb::VectorDbError::InvalidDimension`].
    pub fn new(config: Config, registry: Arc<ModelRegistry<E>>, store: Arc<V>, cache: Arc<TieredCache<S>>, llm: Arc<L>) -> Result<Self, AskError> {
        crate::constants::validate_embedding_dim(store.dimension(), config.embed_dim).map_err(|err| AskError::InternalInvariantViolation {
            message: err.to_string(),
        })?;

        let admission = Arc::new(Semaphore::new(config.concurrency_limit));
        let enhancer = Arc::new(QueryEnhancer::new(Arc::clone(&llm), config.enhancement_fanout_limit, Duration::from_millis(config.deadline_ms_enhance)));
        let composer = AnswerComposer::new(Arc::clone(&llm));
        let cooloff = Duration::from_millis(config.breaker_cooloff_ms);
        let breaker_store = CircuitBreaker::new("vector_store", config.breaker_window, config.breaker_threshold, cooloff);
        let breaker_llm = CircuitBreaker::new("chat_llm", config.breaker_window, config.breaker_threshold, cooloff);
        let breaker_cache = CircuitBreaker::new("shared_cache", config.breaker_window, config.breaker_threshold, cooloff);

        Ok(Self {
            config,
            registry,
            store,
            cache,
            enhancer,
            composer,
            admission,
            breaker_store,
            breaker_llm,
            breaker_cache,
        })
    }

    /// The single primary operation (§6): retrieves, optionally reranks, and
    /// composes a grounded answer. Never panics and never lets an error escape
    /// other than an [`AskError`] — degradations (cache unavailable, reranker
    /// unavailable, composition failure) are folded into `warnings` and
    /// `generation_failed` on a best-effort [`Answer`] instead.
    #[instrument(skip(self, conversation_summary), fields(mode = mode.as_str()))]
    pub async fn ask(&self, query_text: &str, mode: Mode, filter: Option<Filter>, conversation_summary: Option<String>) -> Result<Answer, AskError> {
        let start = Instant::now();
        let mut warnings = Vec::new();

        if query_text.trim().is_empty() {
            return Err(AskError::InputInvalid {
                stage: RequestStage::Admission,
                message: "query text is empty".to_string(),
            });
        }

        let _permit = tokio::time::timeout(Duration::from_millis(self.config.admission_deadline_ms), self.admission.acquire())
            .await
            .map_err(|_| AskError::Overloaded)?
            .map_err(|_| AskError::InternalInvariantViolation {
                message: "admission semaphore closed".to_string(),
            })?;

        let profile = self.config.mode_profile(mode);
        let filter_resolved = filter.unwrap_or_else(|| {
            if self.config.filter_default_status {
                Filter::default_status_active()
            } else {
                Filter::none()
            }
        });
        let query = match conversation_summary {
            Some(summary) => Query::new(query_text).with_summary(summary),
            None => Query::new(query_text),
        };

        let mut stages = StageSummary::default();
        let mut latency = LatencyBreakdown::default();

        let cache_k = match mode {
            Mode::Adaptive => interpolate_k(complexity_score(&query)),
            _ => profile.retrieve_k,
        };

        let mut passages = self.lookup_cache(&query, cache_k, &filter_resolved, &mut stages, &mut warnings).await?;

        let mut k_used = cache_k;
        if passages.is_none() {
            let retrieve_start = Instant::now();
            let embedder = self.fetch_embedder().await?;
            let (retrieved, enhanced_n, k) = self.retrieve_for_mode(mode, &profile, &query, &embedder, &filter_resolved).await?;
            latency.retrieve_ms = retrieve_start.elapsed().as_millis() as u64;
            stages.enhanced_n = enhanced_n;
            stages.retrieved_n = retrieved.len();
            k_used = k;
            passages = Some(retrieved);
        }

        let mut ranked = passages.unwrap_or_default();

        let rerank_enabled = match mode {
            Mode::Adaptive => profile.rerank && k_used >= ADAPTIVE_RERANK_MIN_K,
            _ => profile.rerank,
        };

        if rerank_enabled && !ranked.is_empty() {
            let rerank_start = Instant::now();
            match self.registry.get_reranker().await {
                Ok(reranker) => {
                    let query_text_owned = query.text.clone();
                    let top_n = profile.top_n;
                    let (reranked, outcome) = tokio::task::spawn_blocking(move || reranker.rerank(&query_text_owned, ranked, top_n))
                        .await
                        .map_err(|_| AskError::InternalInvariantViolation {
                            message: "reranker task panicked".to_string(),
                        })?;
                    if outcome.is_degraded() {
                        warnings.push("reranker_unavailable".to_string());
                    }
                    stages.reranked_n = reranked.len();
                    ranked = reranked;
                }
                Err(err) => {
                    warnings.push(format!("model_unavailable: {err}"));
                    ranked.truncate(profile.top_n);
                }
            }
            latency.rerank_ms = rerank_start.elapsed().as_millis() as u64;
        } else {
            ranked.truncate(profile.top_n);
        }

        if ranked.is_empty() {
            warnings.push("no_context".to_string());
        }

        let compose_start = Instant::now();
        let compose_result = if !self.breaker_llm.allow() {
            warnings.push("chat_llm_unavailable: breaker open".to_string());
            crate::compose::ComposeResult {
                answer_text: String::new(),
                citations: Default::default(),
                supporting_context: ranked.iter().map(|p| p.id().to_string()).collect(),
                generation_failed: true,
            }
        } else {
            let result = self.composer.compose(&query, &ranked).await;
            self.breaker_llm.observe(!result.generation_failed);
            result
        };
        latency.compose_ms = compose_start.elapsed().as_millis() as u64;

        let generation_failed = compose_result.generation_failed;
        if generation_failed {
            warnings.push("composition_failed".to_string());
        }

        let by_id: HashMap<&str, &ScoredPassage> = ranked.iter().map(|p| (p.id(), p)).collect();
        let to_ref = |id: &str| -> Option<CitationRef> {
            by_id.get(id).map(|p| CitationRef {
                passage_id: p.id().to_string(),
                document_id: p.passage.document_id.clone(),
                document_title: p.passage.document_title.clone(),
                hierarchy_path: p.passage.hierarchy_path.clone(),
            })
        };
        let citations: Vec<CitationRef> = compose_result.citations.iter().filter_map(|id| to_ref(id)).collect();
        let supporting_context: Vec<CitationRef> = compose_result.supporting_context.iter().filter_map(|id| to_ref(id)).collect();

        if !generation_failed {
            let cache_entry = CacheEntry::from_ranked(&ranked);
            if let Err(err) = self.breaker_cache.call(|| self.cache.populate(&query, k_used, &filter_resolved, cache_entry)).await {
                warnings.push(format!("cache_population_failed: {err}"));
            }
        }

        latency.total_ms = start.elapsed().as_millis() as u64;

        Ok(Answer {
            answer_text: compose_result.answer_text,
            citations,
            supporting_context,
            stages,
            latency_ms_breakdown: latency,
            warnings,
            generation_failed,
        })
    }

    /// Invalidates every cache entry referencing `document_id` (§4.4 conservative
    /// flush).
    pub async fn invalidate_document(&self, document_id: &str) -> Result<u64, AskError> {
        self.cache.invalidate_document(document_id).await.map_err(|err| AskError::DependencyUnavailable {
            stage: RequestStage::CachePopulation,
            message: err.to_string(),
            source: Some(anyhow::Error::new(err)),
        })
    }

    /// Tears down the loaded reranker, if any, enforcing that at most one instance
    /// is ever reachable through the registry: the next request to need reranking
    /// pays a fresh load cost instead of reusing a stale handle. Used when a model
    /// path is rotated or a device needs the memory back.
    pub async fn teardown_reranker(&self) {
        self.registry.teardown_reranker().await;
    }

    /// Tears down the loaded embedder, if any. The next request needing embeddings
    /// pays a fresh load cost.
    pub async fn teardown_embedder(&self) {
        self.registry.teardown_embedder().await;
    }

    /// `health()` (§6 auxiliary operations): reports model load state and current
    /// admission queue pressure without making any external calls.
    pub fn health(&self) -> HealthReport {
        HealthReport {
            reranker_loaded: self.registry.is_reranker_loaded(),
            embedder_loaded: self.registry.is_embedder_loaded(),
            store_dimension: self.store.dimension(),
            queue_depth: self.config.concurrency_limit.saturating_sub(self.admission.available_permits()),
        }
    }

    async fn lookup_cache(
        &self,
        query: &Query,
        k: usize,
        filter: &Filter,
        stages: &mut StageSummary,
        warnings: &mut Vec<String>,
    ) -> Result<Option<Vec<ScoredPassage>>, AskError> {
        let result = self.breaker_cache.call(|| self.cache.lookup(query, k, filter)).await;

        match result {
            Ok(lookup) if lookup.is_hit() => {
                stages.cache_layer_hit = Some(lookup.layer);
                if let Some(entry) = lookup.entry {
                    let rehydrated = self.rehydrate(&entry, filter).await?;
                    if rehydrated.len() < entry.len() {
                        warnings.push("cache_post_filter_shrank".to_string());
                    }
                    return Ok(Some(rehydrated));
                }
                Ok(None)
            }
            Ok(_) => {
                stages.cache_layer_hit = Some(CacheLayerHit::None);
                Ok(None)
            }
            Err(err) => {
                warnings.push(format!("cache_unavailable: {err}"));
                Ok(None)
            }
        }
    }

    async fn rehydrate(&self, entry: &CacheEntry, filter: &Filter) -> Result<Vec<ScoredPassage>, AskError> {
        let fetched = self
            .breaker_store
            .call(|| self.store.fetch(&entry.ranked_ids))
            .await
            .map_err(|e| self.dependency_error(RequestStage::CacheLookup, e))?;

        let by_id: HashMap<&str, &Passage> = fetched.iter().map(|p| (p.id.as_str(), p)).collect();

        let mut rehydrated = Vec::with_capacity(entry.ranked_ids.len());
        for (idx, id) in entry.ranked_ids.iter().enumerate() {
            let Some(passage) = by_id.get(id.as_str()) else { continue };
            if !filter.matches(passage.status.as_str(), &passage.metadata) {
                continue;
            }
            let mut scored = ScoredPassage::from_retrieval((*passage).clone(), entry.retrieval_scores.get(idx).copied().unwrap_or(0.0));
            scored.rerank_score = entry.rerank_scores.get(idx).copied().flatten();
            rehydrated.push(scored);
        }
        Ok(rehydrated)
    }

    async fn fetch_embedder(&self) -> Result<Arc<E>, AskError> {
        self.registry.get_embedder().await.map_err(|err| AskError::DependencyUnavailable {
            stage: RequestStage::Retrieval,
            message: err.to_string(),
            source: Some(anyhow::Error::new(err)),
        })
    }

    /// Chooses the retriever composition for `mode` and returns `(passages,
    /// enhanced_n, k_used)`. Balanced/Quality/complex-Adaptive share the enhance →
    /// fan-out-search shape; only the combination step (union-dedup vs. RRF)
    /// differs.
    async fn retrieve_for_mode(
        &self,
        mode: Mode,
        profile: &ModeProfile,
        query: &Query,
        embedder: &Arc<E>,
        filter: &Filter,
    ) -> Result<(Vec<ScoredPassage>, usize, usize), AskError> {
        match mode {
            Mode::Fast => {
                let (results, k) = self.base_retrieve(query, profile.retrieve_k, embedder, filter).await?;
                Ok((results, 1, k))
            }
            Mode::Balanced => {
                let (results, enhanced_n) = self.enhanced_retrieve(query, &profile.enhance_strategies, profile.retrieve_k, embedder, filter).await?;
                Ok((results, enhanced_n, profile.retrieve_k))
            }
            Mode::Quality => {
                let (results, enhanced_n) = self.fusion_retrieve(query, &profile.enhance_strategies, profile.retrieve_k, embedder, filter).await?;
                Ok((results, enhanced_n, profile.retrieve_k))
            }
            Mode::Adaptive => {
                let complexity = complexity_score(query);
                let k = interpolate_k(complexity);
                if complexity >= ADAPTIVE_ENHANCEMENT_THRESHOLD {
                    let strategies = vec![StrategyTag::MultiQuery, StrategyTag::StepBack];
                    let (results, enhanced_n) = self.enhanced_retrieve(query, &strategies, k, embedder, filter).await?;
                    Ok((results, enhanced_n, k))
                } else {
                    let (results, _) = self.base_retrieve(query, k, embedder, filter).await?;
                    Ok((results, 1, k))
                }
            }
        }
    }

    async fn base_retrieve(&self, query: &Query, k: usize, embedder: &Arc<E>, filter: &Filter) -> Result<(Vec<ScoredPassage>, usize), AskError> {
        let embedding = self
            .breaker_store
            .call(|| embedder.embed_one(&query.text))
            .await
            .map_err(|e| self.dependency_error(RequestStage::Retrieval, e))?;
        let results = self
            .breaker_store
            .call(|| self.store.search(embedding, k, Some(filter)))
            .await
            .map_err(|e| self.dependency_error(RequestStage::Retrieval, e))?;
        Ok((results, k))
    }

    // `search_variants` fans out one embed+search pair per variant; wrapping each
    // individually in `breaker_store` would need threading the breaker through a
    // generic free function, so these paths call the store directly and let a
    // whole-stage failure count as one dependency error instead of per-variant.
    async fn enhanced_retrieve(
        &self,
        query: &Query,
        strategies: &[StrategyTag],
        k: usize,
        embedder: &Arc<E>,
        filter: &Filter,
    ) -> Result<(Vec<ScoredPassage>, usize), AskError> {
        let variants = self.enhancer.enhance(query, strategies).await;
        let texts: Vec<String> = variants.texts().map(str::to_string).collect();

        let lists = retriever::search_variants(embedder.as_ref(), self.store.as_ref(), &texts, k, Some(filter), self.config.enhancement_fanout_limit)
            .await
            .map_err(|e| AskError::DependencyUnavailable {
                stage: RequestStage::Retrieval,
                message: e.to_string(),
                source: Some(anyhow::Error::new(e)),
            })?;

        let union: Vec<ScoredPassage> = lists.into_iter().flatten().collect();
        let mut deduped = dedup_by_max_retrieval_score(union);
        deduped.sort_by(|a, b| b.retrieval_score.partial_cmp(&a.retrieval_score).unwrap_or(std::cmp::Ordering::Equal));
        deduped.truncate(k);
        Ok((deduped, texts.len()))
    }

    async fn fusion_retrieve(
        &self,
        query: &Query,
        strategies: &[StrategyTag],
        k: usize,
        embedder: &Arc<E>,
        filter: &Filter,
    ) -> Result<(Vec<ScoredPassage>, usize), AskError> {
        let variants = self.enhancer.enhance(query, strategies).await;
        let texts: Vec<String> = variants.texts().map(str::to_string).collect();

        let lists = retriever::search_variants(embedder.as_ref(), self.store.as_ref(), &texts, k, Some(filter), self.config.enhancement_fanout_limit)
            .await
            .map_err(|e| AskError::DependencyUnavailable {
                stage: RequestStage::Retrieval,
                message: e.to_string(),
                source: Some(anyhow::Error::new(e)),
            })?;

        let accumulated = retriever::reciprocal_rank_fusion(&lists, crate::constants::DEFAULT_RRF_CONSTANT);
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
        Ok((fused, texts.len()))
    }

    fn dependency_error<Err: std::error::Error + Send + Sync + 'static>(&self, stage: RequestStage, err: BreakerError<Err>) -> AskError {
        let message = err.to_string();
        let source = match err {
            BreakerError::Open { dependency } => anyhow::anyhow!("circuit breaker open for {dependency}"),
            BreakerError::Inner(inner) => anyhow::Error::new(inner),
        };
        AskError::DependencyUnavailable {
            stage,
            message,
            source: Some(source),
        }
    }
}
