//! Query enhancement (§4.5): fans the original query out across a bounded set of
//! LLM-backed rewriting strategies, running them concurrently and tolerating any
//! subset failing or timing out — the original query always survives into the
//! returned [`EnhancedQuerySet`].

mod error;
mod strategies;

pub use error::EnhanceError;
pub use strategies::{DecompositionStrategy, EnhanceStrategy, HydeStrategy, MultiQueryStrategy, StepBackStrategy};

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::Semaphore;
use tracing::warn;

use crate::llm::ChatLlm;
use crate::types::{EnhancedQuerySet, Query, QueryVariant, StrategyTag};

/// Drives the four strategies behind a shared fan-out budget and per-strategy
/// deadline. Generic over the chat backend so orchestration can swap in
/// [`crate::llm::MockChatLlm`] for tests.
pub struct QueryEnhancer<L: ChatLlm> {
    llm: Arc<L>,
    fanout_limit: usize,
    deadline: Duration,
}

impl<L: ChatLlm> QueryEnhancer<L> {
    /// `fanout_limit` bounds how many strategies may be in flight at once
    /// (`enhancement_fanout_limit`); `deadline` is the per-strategy timeout
    /// (`deadline_ms_enhance`).
    pub fn new(llm: Arc<L>, fanout_limit: usize, deadline: Duration) -> Self {
        Self {
            llm,
            fanout_limit: fanout_limit.max(1),
            deadline,
        }
    }

    /// Runs `strategies` concurrently, each gated by the fan-out semaphore and
    /// wrapped in a timeout. A strategy that errors or times out is dropped and
    /// logged; it never fails the overall call. The original query is always
    /// included as the first variant, regardless of what strategies were
    /// requested or how many of them succeeded.
    pub async fn enhance(&self, query: &Query, strategies: &[StrategyTag]) -> EnhancedQuerySet {
        let semaphore = Arc::new(Semaphore::new(self.fanout_limit));

        let tasks = strategies.iter().copied().map(|tag| {
            let llm = Arc::clone(&self.llm);
            let semaphore = Arc::clone(&semaphore);
            let deadline = self.deadline;
            let query = query.clone();
            async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (tag, None),
                };
                let result = tokio::time::timeout(deadline, run_strategy(tag, llm.as_ref(), &query)).await;
                match result {
                    Ok(Ok(texts)) => (tag, Some(texts)),
                    Ok(Err(err)) => {
                        warn!(strategy = ?tag, error = %err, "enhancement strategy failed");
                        (tag, None)
                    }
                    Err(_) => {
                        warn!(strategy = ?tag, "enhancement strategy timed out");
                        (tag, None)
                    }
                }
            }
        });

        let results = join_all(tasks).await;

        let mut variants = vec![QueryVariant {
            text: query.text.clone(),
            strategy: StrategyTag::Original,
        }];
        for (tag, texts) in results {
            if let Some(texts) = texts {
                variants.extend(texts.into_iter().map(|text| QueryVariant { text, strategy: tag }));
            }
        }

        dedup_variants(variants)
    }
}

/// Dispatches to the concrete strategy implementation. Static (match-based)
/// dispatch rather than `Box<dyn EnhanceStrategy>`: the trait's async method
/// puts it outside object safety, same as [`crate::llm::ChatLlm`] and friends.
async fn run_strategy<L: ChatLlm>(tag: StrategyTag, llm: &L, query: &Query) -> Result<Vec<String>, EnhanceError> {
    match tag {
        StrategyTag::Original => Ok(vec![query.text.clone()]),
        StrategyTag::MultiQuery => MultiQueryStrategy.generate(llm, query).await,
        StrategyTag::Hyde => HydeStrategy.generate(llm, query).await,
        StrategyTag::StepBack => StepBackStrategy.generate(llm, query).await,
        StrategyTag::Decomposition => DecompositionStrategy.generate(llm, query).await,
    }
}

/// Deduplicates by case-insensitive, trimmed exact text match, preserving the
/// order variants first appeared in (the original query always wins the slot).
fn dedup_variants(variants: Vec<QueryVariant>) -> EnhancedQuerySet {
    let mut seen = std::collections::HashSet::new();
    let mut deduped = Vec::with_capacity(variants.len());
    for variant in variants {
        let key = variant.text.trim().to_lowercase();
        if key.is_empty() || !seen.insert(key) {
            continue;
        }
        deduped.push(variant);
    }
    EnhancedQuerySet { variants: deduped }
}
