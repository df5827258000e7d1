//! End-to-end scenarios (§8) exercised against mock backends: no live Qdrant,
//! embedding provider, or chat LLM is required. Module-local invariants (dedup,
//! fingerprint equality, rerank ordering) live next to the code they describe;
//! this file only covers the orchestrator's top-level request/response contract.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use lexvi::{
    CacheLayerHit, Config, DocumentStatus, DocumentType, Filter, InMemorySharedCache, L1CacheHandle, Mode, MockChatLlm, MockEmbeddingClient,
    ModelRegistry, Passage, PassageId, PipelineOrchestrator, ScoredPassage, TieredCache, VectorDbError, VectorStoreAdapter,
};
use lexvi::error::AskError;
use lexvi::llm::ChatLlm;
use lexvi::scoring::CrossEncoderReranker;

const DIM: usize = 8;

fn passage(id: &str, hierarchy: &str, content: &str) -> Passage {
    Passage {
        id: id.to_string(),
        content: content.to_string(),
        document_id: "luat-dau-thau-2023".to_string(),
        document_title: "Luật Đấu Thầu".to_string(),
        hierarchy_path: vec![hierarchy.to_string()],
        document_type: DocumentType::Law,
        status: DocumentStatus::Active,
        valid_until: None,
        metadata: Default::default(),
    }
}

type TestOrchestrator = PipelineOrchestrator<MockEmbeddingClient, lexvi::MockVectorStoreAdapter, InMemorySharedCache, MockChatLlm>;

fn build(chat: MockChatLlm, concurrency_limit: usize, admission_deadline_ms: u64) -> (TestOrchestrator, Arc<lexvi::MockVectorStoreAdapter>) {
    let config = Config {
        embed_dim: DIM,
        concurrency_limit,
        admission_deadline_ms,
        ..Config::default()
    };
    let store = Arc::new(lexvi::MockVectorStoreAdapter::new(DIM));
    let registry = Arc::new(ModelRegistry::new(
        Duration::from_secs(30),
        || Ok(MockEmbeddingClient::new(DIM)),
        || CrossEncoderReranker::stub(8).map_err(Into::into),
    ));
    let cache = Arc::new(TieredCache::new(L1CacheHandle::new(), Arc::new(InMemorySharedCache::new()), Duration::from_secs(60)));
    let orchestrator = PipelineOrchestrator::new(config, registry, Arc::clone(&store), cache, Arc::new(chat)).unwrap();
    (orchestrator, store)
}

/// Scenario 1 (§8): balanced mode surfaces the lexically closest passage as the
/// top citation, with enhancement and reranking both having run.
#[tokio::test]
async fn balanced_mode_surfaces_relevant_citation_with_enhancement_and_rerank() {
    let (orchestrator, store) = build(
        MockChatLlm::respond_with("Theo [[passage:dieu-14]], thời hạn hiệu lực bảo đảm dự thầu là 30 ngày."),
        10,
        1_000,
    );
    let embedder = MockEmbeddingClient::new(DIM);

    store.insert(
        passage("dieu-14", "Điều 14", "Thời hạn hiệu lực bảo đảm dự thầu tối đa là ba mươi ngày kể từ thời điểm đóng thầu."),
        embedder.embed_one("dieu-14-vec").await.unwrap(),
    );
    for (idx, (hierarchy, content)) in [
        ("Điều 5", "Nguyên tắc chung trong hoạt động đấu thầu."),
        ("Điều 9", "Điều kiện tham gia đấu thầu của nhà thầu."),
        ("Điều 22", "Phương thức lựa chọn nhà thầu."),
        ("Điều 30", "Trình tự tổ chức lựa chọn nhà thầu."),
        ("Điều 41", "Hợp đồng và bảo đảm thực hiện hợp đồng."),
    ]
    .into_iter()
    .enumerate()
    {
        let id = format!("distractor-{idx}");
        store.insert(passage(&id, hierarchy, content), embedder.embed_one(&id).await.unwrap());
    }

    let answer = orchestrator
        .ask("Thời hạn hiệu lực bảo đảm dự thầu là bao lâu?", Mode::Balanced, None, None)
        .await
        .unwrap();

    assert_eq!(answer.stages.reranked_n, 5, "balanced top_n is 5");
    assert!(answer.stages.enhanced_n >= 3, "enhanced_n was {}", answer.stages.enhanced_n);
    assert_eq!(answer.citations.first().map(|c| c.hierarchy_path.last().cloned()).flatten().as_deref(), Some("Điều 14"));
}

/// Scenario 2 (§8): fast mode skips enhancement and reranking entirely.
#[tokio::test]
async fn fast_mode_retrieves_without_enhancement_or_rerank() {
    let (orchestrator, store) = build(MockChatLlm::respond_with("Theo [[passage:p0]], 30 ngày."), 10, 1_000);
    let embedder = MockEmbeddingClient::new(DIM);
    for i in 0..5 {
        let id = format!("p{i}");
        store.insert(passage(&id, "Điều 14", "điều kiện tham gia đấu thầu"), embedder.embed_one(&id).await.unwrap());
    }

    let answer = orchestrator.ask("điều kiện tham gia đấu thầu", Mode::Fast, None, None).await.unwrap();

    assert_eq!(answer.stages.enhanced_n, 1);
    assert_eq!(answer.stages.reranked_n, 0);
    assert_eq!(answer.stages.retrieved_n, 5);
}

/// Scenario 3 (§8): the same query issued twice within TTL hits the cache the
/// second time and returns the same citation set.
#[tokio::test]
async fn repeated_query_within_ttl_hits_cache_with_stable_citations() {
    let (orchestrator, store) = build(MockChatLlm::respond_with("Theo [[passage:p0]], 30 ngày."), 10, 1_000);
    let embedder = MockEmbeddingClient::new(DIM);
    for i in 0..5 {
        let id = format!("p{i}");
        store.insert(passage(&id, "Điều 14", "điều kiện tham gia đấu thầu"), embedder.embed_one(&id).await.unwrap());
    }

    let first = orchestrator.ask("điều kiện tham gia đấu thầu", Mode::Fast, None, None).await.unwrap();
    assert_eq!(first.stages.cache_layer_hit, Some(CacheLayerHit::None));

    let second = orchestrator.ask("điều kiện tham gia đấu thầu", Mode::Fast, None, None).await.unwrap();
    assert!(second.stages.cache_layer_hit.map(|l| l.is_hit()).unwrap_or(false));

    let first_ids: Vec<&str> = first.citations.iter().map(|c| c.passage_id.as_str()).collect();
    let second_ids: Vec<&str> = second.citations.iter().map(|c| c.passage_id.as_str()).collect();
    assert_eq!(first_ids, second_ids);
}

/// Scenario 4 (§8): an empty query is rejected before any retrieval occurs.
#[tokio::test]
async fn empty_query_is_rejected_before_retrieval() {
    let (orchestrator, _store) = build(MockChatLlm::respond_with("unused"), 10, 1_000);
    let err = orchestrator.ask("   ", Mode::Fast, None, None).await.unwrap_err();
    assert!(matches!(err, AskError::InputInvalid { .. }));
}

/// Scenario 5 (§8): concurrency beyond `concurrency_limit` yields `Overloaded`
/// for the overflow instead of queuing indefinitely or panicking.
#[tokio::test]
async fn overload_beyond_concurrency_limit_rejects_cleanly() {
    struct SlowEchoLlm;
    impl ChatLlm for SlowEchoLlm {
        async fn complete(&self, _prompt: &str) -> Result<String, lexvi::ChatLlmError> {
            tokio::time::sleep(Duration::from_millis(150)).await;
            Ok("Theo [[passage:p0]], 30 ngày.".to_string())
        }
    }

    let (orchestrator, store) = {
        let config = Config {
            embed_dim: DIM,
            concurrency_limit: 2,
            admission_deadline_ms: 20,
            ..Config::default()
        };
        let store = Arc::new(lexvi::MockVectorStoreAdapter::new(DIM));
        let registry = Arc::new(ModelRegistry::new(
            Duration::from_secs(30),
            || Ok(MockEmbeddingClient::new(DIM)),
            || CrossEncoderReranker::stub(8).map_err(Into::into),
        ));
        let cache = Arc::new(TieredCache::new(L1CacheHandle::new(), Arc::new(InMemorySharedCache::new()), Duration::from_secs(60)));
        let orchestrator = Arc::new(PipelineOrchestrator::new(config, registry, Arc::clone(&store), cache, Arc::new(SlowEchoLlm)).unwrap());
        (orchestrator, store)
    };
    let embedder = MockEmbeddingClient::new(DIM);
    for i in 0..3 {
        let id = format!("p{i}");
        store.insert(passage(&id, "Điều 14", "điều kiện tham gia đấu thầu"), embedder.embed_one(&id).await.unwrap());
    }

    let mut handles = Vec::new();
    for i in 0..6 {
        let orchestrator = Arc::clone(&orchestrator);
        let query = format!("điều kiện tham gia đấu thầu lần {i}");
        handles.push(tokio::spawn(async move { orchestrator.ask(&query, Mode::Fast, None, None).await }));
    }

    let mut overloaded = 0;
    let mut ok = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(AskError::Overloaded) => overloaded += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert!(overloaded > 0, "expected at least one request to be rejected as overloaded, got 0/{}", ok + overloaded);
    assert!(ok > 0, "expected at least one request to succeed");
}

/// A store whose passages can flip status after insertion, so a cached ranking
/// can go stale between two requests (scenario 6, §8) the way [`lexvi::MockVectorStoreAdapter`]
/// — insert-only — cannot express.
struct ExpiringStore {
    dimension: usize,
    points: RwLock<Vec<(Passage, Vec<f32>)>>,
}

impl ExpiringStore {
    fn new(dimension: usize) -> Self {
        Self {
            dimension,
            points: RwLock::new(Vec::new()),
        }
    }

    fn insert(&self, passage: Passage, embedding: Vec<f32>) {
        self.points.write().push((passage, embedding));
    }

    fn expire(&self, id: &str) {
        for (passage, _) in self.points.write().iter_mut() {
            if passage.id == id {
                passage.status = DocumentStatus::Expired;
            }
        }
    }
}

impl VectorStoreAdapter for ExpiringStore {
    async fn search(&self, embedding: Vec<f32>, k: usize, filter: Option<&Filter>) -> Result<Vec<ScoredPassage>, VectorDbError> {
        if embedding.len() != self.dimension {
            return Err(VectorDbError::InvalidDimension {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }
        let points = self.points.read();
        let mut scored: Vec<ScoredPassage> = points
            .iter()
            .filter(|(p, _)| filter.map(|f| f.matches(p.status.as_str(), &p.metadata)).unwrap_or(true))
            .map(|(p, v)| ScoredPassage::from_retrieval(p.clone(), lexvi::vectordb::cosine_similarity(&embedding, v)))
            .collect();
        scored.sort_by(|a, b| b.retrieval_score.partial_cmp(&a.retrieval_score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    async fn fetch(&self, ids: &[PassageId]) -> Result<Vec<Passage>, VectorDbError> {
        let points = self.points.read();
        Ok(points.iter().filter(|(p, _)| ids.contains(&p.id)).map(|(p, _)| p.clone()).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Scenario 6 (§8): a document expiring between a cache-populating request and a
/// cache-hit request is filtered back out at re-hydration, with a warning and a
/// shorter-than-cached result rather than stale content.
#[tokio::test]
async fn document_expiring_between_requests_is_filtered_out_of_a_cache_hit() {
    let store = Arc::new(ExpiringStore::new(DIM));
    let embedder = MockEmbeddingClient::new(DIM);
    for i in 0..3 {
        let id = format!("p{i}");
        store.insert(passage(&id, "Điều 14", "điều kiện tham gia đấu thầu"), embedder.embed_one(&id).await.unwrap());
    }

    let config = Config {
        embed_dim: DIM,
        ..Config::default()
    };
    let registry = Arc::new(ModelRegistry::new(
        Duration::from_secs(30),
        || Ok(MockEmbeddingClient::new(DIM)),
        || CrossEncoderReranker::stub(8).map_err(Into::into),
    ));
    let cache = Arc::new(TieredCache::new(L1CacheHandle::new(), Arc::new(InMemorySharedCache::new()), Duration::from_secs(60)));
    let orchestrator =
        PipelineOrchestrator::new(config, registry, Arc::clone(&store), cache, Arc::new(MockChatLlm::respond_with("Theo [[passage:p0]], 30 ngày."))).unwrap();

    let first = orchestrator.ask("điều kiện tham gia đấu thầu", Mode::Fast, None, None).await.unwrap();
    assert_eq!(first.stages.retrieved_n, 3);

    store.expire("p1");

    let second = orchestrator.ask("điều kiện tham gia đấu thầu", Mode::Fast, None, None).await.unwrap();
    assert!(second.stages.cache_layer_hit.map(|l| l.is_hit()).unwrap_or(false));
    assert!(second.warnings.contains(&"cache_post_filter_shrank".to_string()));
    assert!(!second.citations.iter().any(|c| c.passage_id == "p1"));
    assert!(!second.supporting_context.iter().any(|c| c.passage_id == "p1"));
}
