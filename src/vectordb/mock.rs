use parking_lot::RwLock;

use super::client::VectorStoreAdapter;
use super::error::VectorDbError;
use crate::filter::Filter;
use crate::types::{Passage, PassageId, ScoredPassage};

/// Brute-force cosine-similarity store for tests: no index, no collection
/// management, just a `Vec` scanned linearly per search.
#[cfg(any(test, feature = "mock"))]
pub struct MockVectorStoreAdapter {
    dimension: usize,
    points: RwLock<Vec<(Passage, Vec<f32>)>>,
}

#[cfg(any(test, feature = "mock"))]
impl MockVectorStoreAdapter {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            points: RwLock::new(Vec::new()),
        }
    }

    /// Seeds the store with a passage and its embedding.
    pub fn insert(&self, passage: Passage, embedding: Vec<f32>) {
        self.points.write().push((passage, embedding));
    }

    pub fn len(&self) -> usize {
        self.points.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(any(test, feature = "mock"))]
impl VectorStoreAdapter for MockVectorStoreAdapter {
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

        let points = self.points.read();
        let mut scored: Vec<ScoredPassage> = points
            .iter()
            .filter(|(passage, _)| {
                filter
                    .map(|f| f.matches(passage.status.as_str(), &passage.metadata))
                    .unwrap_or(true)
            })
            .map(|(passage, vector)| {
                let score = cosine_similarity(&embedding, vector);
                ScoredPassage::from_retrieval(passage.clone(), score)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.retrieval_score
                .partial_cmp(&a.retrieval_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        Ok(scored)
    }

    async fn fetch(&self, ids: &[PassageId]) -> Result<Vec<Passage>, VectorDbError> {
        let points = self.points.read();
        Ok(points
            .iter()
            .filter(|(p, _)| ids.contains(&p.id))
            .map(|(p, _)| p.clone())
            .collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Exposed for the reranker's placeholder scorer and other cosine-distance call
/// sites that don't need a full store.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product / (norm_a * norm_b)
    }
}
