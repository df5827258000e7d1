//! Core data model shared across retrieval, caching, and composition: [`Passage`],
//! [`Query`], [`ScoredPassage`], and their small supporting enums.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Stable identifier for a [`Passage`], unique within the store.
pub type PassageId = String;

/// Stable identifier for a source document (a passage's parent).
pub type DocumentId = String;

/// Document-type tag, one of a small closed enum per the source corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Law,
    Decree,
    Circular,
    Decision,
    BiddingForm,
    Other,
}

/// Lifecycle status of a document; only `Active` passages are returned under the
/// default filter (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Active,
    Expired,
    Superseded,
}

impl DocumentStatus {
    /// Parses the wire representation used by filter predicates and store metadata.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "expired" => Some(Self::Expired),
            "superseded" => Some(Self::Superseded),
            _ => None,
        }
    }

    /// Renders the canonical wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Superseded => "superseded",
        }
    }
}

/// A content-addressed unit of legal text produced by preprocessing (out of core scope),
/// held by the core only by identifier plus the fields needed to render citations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub id: PassageId,
    pub content: String,
    pub document_id: DocumentId,
    pub document_title: String,
    /// Ordered structural labels, e.g. `["Chương II", "Điều 14", "Khoản 1"]`.
    pub hierarchy_path: Vec<String>,
    pub document_type: DocumentType,
    pub status: DocumentStatus,
    /// Validity end date (RFC 3339), `None` if open-ended.
    pub valid_until: Option<String>,
    /// Free-form metadata carried through unchanged, used by filter predicates.
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Passage {
    /// Renders the hierarchy path the way citations display it, e.g. `"Chương II > Điều 14"`.
    pub fn hierarchy_display(&self) -> String {
        self.hierarchy_path.join(" > ")
    }
}

/// The raw user question plus an optional caller-supplied conversation summary.
/// Transient: never persisted by the core.
#[derive(Debug, Clone)]
pub struct Query {
    pub text: String,
    pub conversation_summary: Option<String>,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            conversation_summary: None,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.conversation_summary = Some(summary.into());
        self
    }

    /// Normalized form used for cache fingerprinting (§4.4): lowercased, surrounding
    /// whitespace stripped. Internal whitespace is left untouched since Vietnamese
    /// diacritics and word boundaries are meaning-bearing.
    pub fn normalize(&self) -> String {
        self.text.trim().to_lowercase()
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Which strategy produced a given query variant (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyTag {
    Original,
    MultiQuery,
    Hyde,
    StepBack,
    Decomposition,
}

/// A single derived query string plus the strategy that produced it (§3 EnhancedQuerySet).
#[derive(Debug, Clone)]
pub struct QueryVariant {
    pub text: String,
    pub strategy: StrategyTag,
}

/// A finite, deduplicated set of query variants derived from a [`Query`]. The original
/// is always present, even on total enhancement failure.
#[derive(Debug, Clone, Default)]
pub struct EnhancedQuerySet {
    pub variants: Vec<QueryVariant>,
}

impl EnhancedQuerySet {
    pub fn original_only(query: &Query) -> Self {
        Self {
            variants: vec![QueryVariant {
                text: query.text.clone(),
                strategy: StrategyTag::Original,
            }],
        }
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.variants.iter().map(|v| v.text.as_str())
    }
}

/// A [`Passage`] paired with the scores accumulated across retrieval, fusion, and
/// reranking. Ordering key is rerank → fusion → retrieval, in that precedence (§3).
#[derive(Debug, Clone)]
pub struct ScoredPassage {
    pub passage: Passage,
    pub retrieval_score: f32,
    pub fusion_score: Option<f64>,
    pub rerank_score: Option<f32>,
}

impl ScoredPassage {
    pub fn from_retrieval(passage: Passage, retrieval_score: f32) -> Self {
        Self {
            passage,
            retrieval_score,
            fusion_score: None,
            rerank_score: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.passage.id
    }

    /// Compares two scored passages by the spec's ordering precedence: rerank score
    /// descending, then fusion score descending, then retrieval score descending, then
    /// passage id ascending for determinism. Ties are broken so sorts are total and
    /// reproducible across runs.
    pub fn ranking_cmp(&self, other: &Self) -> Ordering {
        match (self.rerank_score, other.rerank_score) {
            (Some(a), Some(b)) => {
                return b
                    .partial_cmp(&a)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| self.tie_break(other));
            }
            (Some(_), None) => return Ordering::Less,
            (None, Some(_)) => return Ordering::Greater,
            (None, None) => {}
        }
        match (self.fusion_score, other.fusion_score) {
            (Some(a), Some(b)) => b
                .partial_cmp(&a)
                .unwrap_or(Ordering::Equal)
                .then_with(|| self.tie_break(other)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => other
                .retrieval_score
                .partial_cmp(&self.retrieval_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| self.tie_break(other)),
        }
    }

    fn tie_break(&self, other: &Self) -> Ordering {
        other
            .retrieval_score
            .partial_cmp(&self.retrieval_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.passage.id.cmp(&other.passage.id))
    }
}

/// Deduplicates by passage identifier, keeping the entry with the higher
/// retrieval score on conflict (§4.6 Enhanced retriever contract).
pub fn dedup_by_max_retrieval_score(passages: Vec<ScoredPassage>) -> Vec<ScoredPassage> {
    use std::collections::HashMap;

    let mut by_id: HashMap<String, ScoredPassage> = HashMap::with_capacity(passages.len());
    for sp in passages {
        by_id
            .entry(sp.id().to_string())
            .and_modify(|existing| {
                if sp.retrieval_score > existing.retrieval_score {
                    *existing = sp.clone();
                }
            })
            .or_insert(sp);
    }
    by_id.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(id: &str, status: DocumentStatus, score: f32) -> ScoredPassage {
        ScoredPassage::from_retrieval(
            Passage {
                id: id.to_string(),
                content: "noi dung".to_string(),
                document_id: "doc-1".to_string(),
                document_title: "Luat Dau Thau".to_string(),
                hierarchy_path: vec!["Dieu 14".to_string()],
                document_type: DocumentType::Law,
                status,
                valid_until: None,
                metadata: Default::default(),
            },
            score,
        )
    }

    #[test]
    fn query_normalize_trims_and_lowercases() {
        let q = Query::new("  Thời Hạn Bảo Đảm  ");
        assert_eq!(q.normalize(), "thời hạn bảo đảm");
    }

    #[test]
    fn query_is_empty_detects_whitespace_only() {
        assert!(Query::new("   ").is_empty());
        assert!(!Query::new("a").is_empty());
    }

    #[test]
    fn dedup_keeps_max_retrieval_score() {
        let a = passage("p1", DocumentStatus::Active, 0.4);
        let b = passage("p1", DocumentStatus::Active, 0.9);
        let deduped = dedup_by_max_retrieval_score(vec![a, b]);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].retrieval_score, 0.9);
    }

    #[test]
    fn ranking_cmp_prefers_rerank_then_fusion_then_retrieval() {
        let mut high_rerank = passage("p1", DocumentStatus::Active, 0.1);
        high_rerank.rerank_score = Some(0.9);
        let mut low_rerank = passage("p2", DocumentStatus::Active, 0.9);
        low_rerank.rerank_score = Some(0.2);

        assert_eq!(high_rerank.ranking_cmp(&low_rerank), Ordering::Less);
    }

    #[test]
    fn ranking_cmp_ties_break_on_id() {
        let a = passage("a", DocumentStatus::Active, 0.5);
        let b = passage("b", DocumentStatus::Active, 0.5);
        assert_eq!(a.ranking_cmp(&b), Ordering::Less);
    }
}
