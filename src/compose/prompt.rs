use crate::types::{Query, ScoredPassage};

/// Builds the single-prompt text sent to the chat LLM: a system framing, a context
/// block with one citation-markable entry per passage, then the user's question.
/// The shared [`crate::llm::ChatLlm`] contract is single-turn-single-message, so all
/// three sections are folded into one prompt rather than a multi-message exchange.
pub fn build_prompt(query: &Query, passages: &[ScoredPassage]) -> String {
    let mut prompt = String::from(
        "Bạn là một trợ lý pháp lý. Chỉ trả lời dựa trên các đoạn trích dẫn được cung cấp bên dưới, \
         bằng tiếng Việt. Khi sử dụng thông tin từ một đoạn trích, hãy chèn ngay sau câu đó một \
         dấu trích dẫn theo đúng định dạng [[passage:<id>]] với <id> là mã số của đoạn trích. \
         Nếu không có đoạn trích nào trả lời được câu hỏi, hãy nói rõ là không tìm thấy căn cứ.\n\n",
    );

    prompt.push_str("Các đoạn trích:\n");
    for scored in passages {
        prompt.push_str(&format!(
            "[[passage:{id}]] ({hierarchy}) {content}\n",
            id = scored.id(),
            hierarchy = scored.passage.hierarchy_display(),
            content = scored.passage.content,
        ));
    }

    if let Some(summary) = &query.conversation_summary {
        prompt.push_str(&format!("\nTóm tắt hội thoại trước đó: {summary}\n"));
    }

    prompt.push_str(&format!("\nCâu hỏi: {}\n", query.text));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DocumentStatus, DocumentType, Passage};

    #[test]
    fn prompt_includes_citation_markers_and_question() {
        let passage = ScoredPassage::from_retrieval(
            Passage {
                id: "p1".to_string(),
                content: "noi dung".to_string(),
                document_id: "doc-1".to_string(),
                document_title: "Luat".to_string(),
                hierarchy_path: vec!["Dieu 14".to_string()],
                document_type: DocumentType::Law,
                status: DocumentStatus::Active,
                valid_until: None,
                metadata: Default::default(),
            },
            0.5,
        );
        let prompt = build_prompt(&Query::new("Thoi han la bao lau?"), &[passage]);
        assert!(prompt.contains("[[passage:p1]]"));
        assert!(prompt.contains("Thoi han la bao lau?"));
    }
}
