//! Answer composition (§4.8): builds the grounded-QA prompt, invokes the chat LLM,
//! and parses citation markers back out of the response.

mod error;
mod prompt;

pub use error::ComposeError;

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::llm::ChatLlm;
use crate::types::{PassageId, Query, ScoredPassage};

static CITATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[\[passage:([^\]]+)\]\]").expect("static citation regex is valid"));

/// Parses `[[passage:<id>]]` markers out of composed text.
pub fn parse_citations(text: &str) -> HashSet<PassageId> {
    CITATION_PATTERN.captures_iter(text).map(|cap| cap[1].to_string()).collect()
}

/// Result of a composition attempt. Returned unconditionally — even when the LLM
/// call itself failed — so a chat outage downgrades an otherwise-successful
/// retrieval instead of discarding it (§4.8 failure semantics, §7 PartialFailure).
#[derive(Debug, Clone)]
pub struct ComposeResult {
    pub answer_text: String,
    pub citations: HashSet<PassageId>,
    pub supporting_context: Vec<PassageId>,
    pub generation_failed: bool,
}

/// Invokes the shared [`ChatLlm`] contract with a grounded-QA prompt built from the
/// query and retrieved passages.
pub struct AnswerComposer<L: ChatLlm> {
    llm: std::sync::Arc<L>,
}

impl<L: ChatLlm> AnswerComposer<L> {
    pub fn new(llm: std::sync::Arc<L>) -> Self {
        Self { llm }
    }

    pub async fn compose(&self, query: &Query, passages: &[ScoredPassage]) -> ComposeResult {
        let all_ids: Vec<PassageId> = passages.iter().map(|p| p.id().to_string()).collect();
        let prompt_text = prompt::build_prompt(query, passages);

        match self.llm.complete(&prompt_text).await {
            Ok(answer_text) => {
                let citations = parse_citations(&answer_text);
                let supporting_context = all_ids.into_iter().filter(|id| !citations.contains(id)).collect();
                ComposeResult {
                    answer_text,
                    citations,
                    supporting_context,
                    generation_failed: false,
                }
            }
            Err(err) => {
                warn!(error = %err, "answer composition failed, returning retrieved passages without a generated answer");
                ComposeResult {
                    answer_text: String::new(),
                    citations: HashSet::new(),
                    supporting_context: all_ids,
                    generation_failed: true,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockChatLlm;
    use crate::types::{DocumentStatus, DocumentType, Passage};

    fn passage(id: &str) -> ScoredPassage {
        ScoredPassage::from_retrieval(
            Passage {
                id: id.to_string(),
                content: "noi dung".to_string(),
                document_id: "doc-1".to_string(),
                document_title: "Luat".to_string(),
                hierarchy_path: vec![],
                document_type: DocumentType::Law,
                status: DocumentStatus::Active,
                valid_until: None,
                metadata: Default::default(),
            },
            0.5,
        )
    }

    #[test]
    fn parse_citations_extracts_ids() {
        let ids = parse_citations("Theo [[passage:p1]] và [[passage:p2]], ...");
        assert_eq!(ids.len(), 2);
        assert!(ids.contains("p1"));
        assert!(ids.contains("p2"));
    }

    #[tokio::test]
    async fn successful_compose_splits_cited_and_supporting() {
        let composer = AnswerComposer::new(std::sync::Arc::new(MockChatLlm::respond_with("Theo [[passage:p1]], thoi han la 30 ngay.")));
        let result = composer.compose(&Query::new("q"), &[passage("p1"), passage("p2")]).await;
        assert!(!result.generation_failed);
        assert!(result.citations.contains("p1"));
        assert_eq!(result.supporting_context, vec!["p2".to_string()]);
    }

    #[tokio::test]
    async fn failed_compose_preserves_passages_as_supporting_context() {
        let composer = AnswerComposer::new(std::sync::Arc::new(MockChatLlm::failing()));
        let result = composer.compose(&Query::new("q"), &[passage("p1"), passage("p2")]).await;
        assert!(result.generation_failed);
        assert!(result.answer_text.is_empty());
        assert_eq!(result.supporting_context.len(), 2);
    }
}
