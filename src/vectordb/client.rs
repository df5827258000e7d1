use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, Distance, Filter as QdrantFilter, GetPointsBuilder,
    SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
};

use super::error::VectorDbError;
use super::model::{passage_to_point, payload_to_passage, point_id_for_lookup, scored_point_parts};
use crate::filter::{Filter, FilterClause};
use crate::types::{Passage, PassageId, ScoredPassage};

/// Contract the retriever family and the orchestrator depend on (§4.2): the core
/// never talks to Qdrant directly outside this module.
pub trait VectorStoreAdapter: Send + Sync {
    /// Returns the `k` nearest passages to `embedding`, optionally restricted by
    /// `filter`. `filter: None` applies no predicate at all — callers pass
    /// [`Filter::default_status_active()`] to get the spec's default.
    fn search(
        &self,
        embedding: Vec<f32>,
        k: usize,
        filter: Option<&Filter>,
    ) -> impl std::future::Future<Output = Result<Vec<ScoredPassage>, VectorDbError>> + Send;

    /// Fetches passages by id, for cache-hit re-hydration (§4.4). Ids that no longer
    /// exist in the store are silently dropped from the result.
    fn fetch(
        &self,
        ids: &[PassageId],
    ) -> impl std::future::Future<Output = Result<Vec<Passage>, VectorDbError>> + Send;

    /// The dimension vectors in this store are indexed at; checked against the
    /// embedding client's dimension at startup.
    fn dimension(&self) -> usize;
}

/// Qdrant-backed implementation.
#[derive(Clone)]
pub struct QdrantVectorStoreAdapter {
    client: Qdrant,
    collection: String,
    dimension: usize,
}

impl QdrantVectorStoreAdapter {
    /// Connects to `url` and targets `collection`, which is expected to already hold
    /// `dimension`-wide vectors (this adapter never creates the collection implicitly
    /// outside [`Self::ensure_collection`]).
    pub async fn new(url: &str, collection: impl Into<String>, dimension: usize) -> Result<Self, VectorDbError> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| VectorDbError::ConnectionFailed {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            collection: collection.into(),
            dimension,
        })
    }

    /// Creates the backing collection with cosine distance if it doesn't exist yet.
    pub async fn ensure_collection(&self) -> Result<(), VectorDbError> {
        let exists = self.client.collection_exists(&self.collection).await.map_err(|e| {
            VectorDbError::CreateCollectionFailed {
                collection: self.collection.clone(),
                message: e.to_string(),
            }
        })?;
        if exists {
            return Ok(());
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(VectorParamsBuilder::new(self.dimension as u64, Distance::Cosine))
                    .on_disk_payload(true),
            )
            .await
            .map_err(|e| VectorDbError::CreateCollectionFailed {
                collection: self.collection.clone(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    /// Indexes a batch of passages with their embeddings. Preprocessing/ingestion is
    /// out of this crate's scope (§1 Non-goals); this exists so tests and tooling can
    /// populate a real collection without a second write path.
    pub async fn upsert(&self, passages: &[(Passage, Vec<f32>)]) -> Result<(), VectorDbError> {
        if passages.is_empty() {
            return Ok(());
        }
        let points = passages
            .iter()
            .map(|(p, v)| passage_to_point(p, v.clone()))
            .collect::<Vec<_>>();

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
            .await
            .map_err(|e| VectorDbError::CreateCollectionFailed {
                collection: self.collection.clone(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    /// Basic liveness check used by the orchestrator's health aggregation.
    pub async fn health_check(&self) -> Result<(), VectorDbError> {
        self.client
            .health_check()
            .await
            .map_err(|e| VectorDbError::ConnectionFailed {
                url: String::new(),
                message: e.to_string(),
            })?;
        Ok(())
    }
}

fn translate_filter(filter: &Filter) -> Option<QdrantFilter> {
    if filter.is_empty() {
        return None;
    }
    let conditions: Vec<Condition> = filter
        .clauses()
        .iter()
        .map(|clause| match clause {
            FilterClause::Eq { field, value } => Condition::matches(qdrant_field(field), value.clone()),
            FilterClause::In { field, values } => Condition::matches(qdrant_field(field), values.clone()),
        })
        .collect();
    Some(QdrantFilter::must(conditions))
}

/// `status` is stored as a top-level payload key; everything else lives under a
/// `meta_` prefix (see [`super::model::passage_to_payload`]).
fn qdrant_field(field: &str) -> String {
    if field == "status" {
        "status".to_string()
    } else {
        format!("meta_{field}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterBuilder;

    #[test]
    fn qdrant_field_leaves_status_unprefixed() {
        assert_eq!(qdrant_field("status"), "status");
        assert_eq!(qdrant_field("doc_type"), "meta_doc_type");
    }

    #[test]
    fn translate_filter_is_none_for_an_empty_filter() {
        assert!(translate_filter(&Filter::none()).is_none());
    }

    #[test]
    fn translate_filter_builds_a_must_condition_per_clause() {
        let filter = FilterBuilder::new().eq("status", "active").r#in("doc_type", vec!["law".into(), "decree".into()]).build();
        let translated = translate_filter(&filter).expect("non-empty filter translates to a condition");
        assert_eq!(translated.must.len(), 2);
    }
}

impl VectorStoreAdapter for QdrantVectorStoreAdapter {
    async fn search(
        &self,
        embedding: Vec<f32>,
        k: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<ScoredPassage>, VectorDbError> {
        if embedding.len() != self.dimension {
            return Err(VectorDbError::InvalidDimension {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        let mut builder = SearchPointsBuilder::new(&self.collection, embedding, k as u64).with_payload(true);
        if let Some(f) = filter.and_then(translate_filter) {
            builder = builder.filter(f);
        }

        let response = self
            .client
            .search_points(builder)
            .await
            .map_err(|e| VectorDbError::SearchFailed {
                collection: self.collection.clone(),
                message: e.to_string(),
            })?;

        response
            .result
            .into_iter()
            .filter_map(scored_point_parts)
            .map(|(id, score, payload)| {
                payload_to_passage(&id, &payload).map(|passage| ScoredPassage::from_retrieval(passage, score))
            })
            .collect()
    }

    async fn fetch(&self, ids: &[PassageId]) -> Result<Vec<Passage>, VectorDbError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        let response = self
            .client
            .get_points(
                GetPointsBuilder::new(&self.collection, ids.iter().map(|id| point_id_for_lookup(id)).collect())
                    .with_payload(true),
            )
            .await
            .map_err(|e| VectorDbError::FetchFailed {
                collection: self.collection.clone(),
                message: e.to_string(),
            })?;

        let passages = response
            .result
            .into_iter()
            .filter_map(|p| {
                let id = match p.id.and_then(|pid| pid.point_id_options) {
                    Some(qdrant_client::qdrant::point_id::PointIdOptions::Uuid(u)) => u,
                    Some(qdrant_client::qdrant::point_id::PointIdOptions::Num(n)) => n.to_string(),
                    None => return None,
                };
                payload_to_passage(&id, &p.payload).ok()
            })
            .collect();
        Ok(passages)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
