//! # Lexvi
//!
//! Retrieval-augmented question answering core for Vietnamese statutory and
//! regulatory text (laws, decrees, circulars, bidding forms).
//!
//! Lexvi sits between a client (chat UI, agent) and the passage store + chat LLM:
//!
//! ```text
//! Query → Cache (L1/L2) → Enhance → Retrieve → Rerank → Compose → Answer
//! ```
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use lexvi::Config;
//!
//! # fn run() -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! config.validate()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//!
//! | Feature | Purpose |
//! |---------|---------|
//! | `mock` | In-memory mock backends for tests/examples, without a live Qdrant/chat provider |
//!
//! ## Modules
//!
//! - [`orchestrator`] - Pipeline assembly: `ask()`, health, document invalidation
//! - [`retriever`] - Base/Enhanced/Fusion/AdaptiveK retrieval compositions
//! - [`enhancer`] - Query rewriting strategies (multi-query, HyDE, step-back, decomposition)
//! - [`compose`] - Grounded-answer composition and citation parsing
//! - [`cache`] - Tiered response cache (L1 exact + L2 shared)
//! - [`scoring`] - Cross-encoder reranking
//! - [`breaker`] - Per-dependency circuit breaker
//! - [`registry`] - Lazy singleton homes for the embedder and reranker
//! - [`vectordb`] - Qdrant-backed passage store
//! - [`embedding`] - Embedding provider client
//! - [`llm`] - Chat LLM client shared by the enhancer and composer
//! - [`filter`] - Metadata filter predicates
//! - [`config`] - Environment-backed configuration
//!
//! Links: repo/issues at the crate `repository` URL.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod breaker;
pub mod cache;
pub mod compose;
pub mod config;
pub mod constants;
pub mod embedding;
pub mod enhancer;
pub mod error;
pub mod filter;
pub mod hashing;
pub mod llm;
pub mod orchestrator;
pub mod registry;
pub mod retriever;
pub mod scoring;
pub mod types;
pub mod vectordb;

pub use breaker::{BreakerError, CircuitBreaker};
pub use cache::{CacheEntry, CacheLayerHit, L1Cache, L1CacheHandle, L2CacheError, SharedCache, TieredCache, TieredLookupResult};
#[cfg(any(test, feature = "mock"))]
pub use cache::{InMemorySharedCache, MockTieredCache};

pub use compose::{AnswerComposer, ComposeError, ComposeResult};
pub use config::{Config, ConfigError, Mode, ModeProfile};
pub use constants::{DEFAULT_EMBEDDING_DIM, DEFAULT_MAX_SEQ_LEN, DEFAULT_RERANK_THRESHOLD, DEFAULT_RRF_CONSTANT, DimConfig, DimValidationError, validate_embedding_dim};
pub use embedding::{EmbeddingClient, EmbeddingClientError, HttpEmbeddingClient};
#[cfg(any(test, feature = "mock"))]
pub use embedding::MockEmbeddingClient;

pub use enhancer::{DecompositionStrategy, EnhanceError, EnhanceStrategy, HydeStrategy, MultiQueryStrategy, QueryEnhancer, StepBackStrategy};
pub use error::{AskError, RequestStage};
pub use filter::{Filter, FilterBuilder, FilterClause};
pub use hashing::hash_to_u64;
pub use llm::{ChatLlm, ChatLlmError, GenaiChatLlm};
#[cfg(any(test, feature = "mock"))]
pub use llm::MockChatLlm;

pub use orchestrator::{Answer, CitationRef, HealthReport, LatencyBreakdown, PipelineOrchestrator, StageSummary};
pub use registry::{ModelRegistry, RegistryError};
pub use retriever::{AdaptiveKRetriever, BaseRetriever, EnhancedRetriever, FusionRetriever, RetrieveError, complexity_score, interpolate_k};
pub use scoring::{CrossEncoderReranker, RerankOutcome, ScoringError};
pub use types::{
    DocumentId, DocumentStatus, DocumentType, EnhancedQuerySet, Passage, PassageId, Query, QueryVariant, ScoredPassage, StrategyTag,
    dedup_by_max_retrieval_score,
};
pub use vectordb::{QdrantVectorStoreAdapter, VectorDbError, VectorStoreAdapter};
#[cfg(any(test, feature = "mock"))]
pub use vectordb::MockVectorStoreAdapter;
