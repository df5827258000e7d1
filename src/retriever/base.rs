use std::sync::Arc;

use crate::embedding::EmbeddingClient;
use crate::filter::Filter;
use crate::types::{Query, ScoredPassage};
use crate::vectordb::VectorStoreAdapter;

use super::error::RetrieveError;

/// Direct vector search, no enhancement: embed the query once, search once.
pub struct BaseRetriever<E: EmbeddingClient, V: VectorStoreAdapter> {
    embedder: Arc<E>,
    store: Arc<V>,
}

impl<E: EmbeddingClient, V: VectorStoreAdapter> BaseRetriever<E, V> {
    pub fn new(embedder: Arc<E>, store: Arc<V>) -> Self {
        Self { embedder, store }
    }

    pub async fn retrieve(&self, query: &Query, k: usize, filter: Option<&Filter>) -> Result<Vec<ScoredPassage>, RetrieveError> {
        if query.is_empty() {
            return Err(RetrieveError::InvalidInput {
                reason: "query text is empty".to_string(),
            });
        }
        let embedding = self.embedder.embed_one(&query.text).await?;
        let results = self.store.search(embedding, k, filter).await?;
        Ok(results)
    }
}
