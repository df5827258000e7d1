//! The four enhancement strategies (§4.5), each a thin prompt template over the
//! shared [`ChatLlm`] contract.

use crate::llm::ChatLlm;
use crate::types::Query;

use super::error::EnhanceError;

/// One query-rewriting strategy: given the original query, produces zero or more
/// derived query strings.
pub trait EnhanceStrategy<L: ChatLlm>: Send + Sync {
    fn generate(
        &self,
        llm: &L,
        query: &Query,
    ) -> impl std::future::Future<Output = Result<Vec<String>, EnhanceError>> + Send;
}

fn non_empty_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|l| l.trim().trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c == '-' || c == ')').trim())
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Generates paraphrases that preserve meaning but vary phrasing, to widen recall
/// over lexical variation in how the corpus phrases the same provision.
pub struct MultiQueryStrategy;

impl<L: ChatLlm> EnhanceStrategy<L> for MultiQueryStrategy {
    async fn generate(&self, llm: &L, query: &Query) -> Result<Vec<String>, EnhanceError> {
        let prompt = format!(
            "Bạn là trợ lý pháp lý. Hãy viết lại câu hỏi sau thành 3 cách diễn đạt khác nhau \
             nhưng giữ nguyên ý nghĩa, mỗi cách trên một dòng, không đánh số:\n\n{}",
            query.text
        );
        let response = llm.complete(&prompt).await?;
        let variants = non_empty_lines(&response);
        if variants.is_empty() {
            return Err(EnhanceError::NoVariants);
        }
        Ok(variants)
    }
}

/// Hypothetical Document Embeddings: asks the model to sketch what an answering
/// passage would look like, then uses that hypothetical text itself as the query
/// surrogate embedded for retrieval (closer, in embedding space, to real passages
/// than a short question is).
pub struct HydeStrategy;

impl<L: ChatLlm> EnhanceStrategy<L> for HydeStrategy {
    async fn generate(&self, llm: &L, query: &Query) -> Result<Vec<String>, EnhanceError> {
        let prompt = format!(
            "Bạn là một văn bản pháp luật Việt Nam. Hãy viết một đoạn văn giả định (3-4 câu) \
             trả lời trực tiếp câu hỏi sau, theo văn phong luật định, không cần chính xác tuyệt đối:\n\n{}",
            query.text
        );
        let response = llm.complete(&prompt).await?;
        let trimmed = response.trim().to_string();
        if trimmed.is_empty() {
            return Err(EnhanceError::NoVariants);
        }
        Ok(vec![trimmed])
    }
}

/// Step-back prompting: asks a single broader, more abstract question the original
/// is an instance of, to retrieve governing-principle passages a narrow query would
/// miss.
pub struct StepBackStrategy;

impl<L: ChatLlm> EnhanceStrategy<L> for StepBackStrategy {
    async fn generate(&self, llm: &L, query: &Query) -> Result<Vec<String>, EnhanceError> {
        let prompt = format!(
            "Câu hỏi sau đây là một trường hợp cụ thể. Hãy đặt một câu hỏi tổng quát hơn, \
             bao trùm nguyên tắc pháp lý đứng sau câu hỏi cụ thể này. Chỉ trả lời bằng một câu hỏi duy nhất:\n\n{}",
            query.text
        );
        let response = llm.complete(&prompt).await?;
        let trimmed = response.trim().to_string();
        if trimmed.is_empty() {
            return Err(EnhanceError::NoVariants);
        }
        Ok(vec![trimmed])
    }
}

/// Decomposes a compound question into independently-answerable sub-questions.
pub struct DecompositionStrategy;

impl<L: ChatLlm> EnhanceStrategy<L> for DecompositionStrategy {
    async fn generate(&self, llm: &L, query: &Query) -> Result<Vec<String>, EnhanceError> {
        let prompt = format!(
            "Hãy phân tách câu hỏi sau thành các câu hỏi con độc lập, mỗi câu có thể trả lời \
             riêng biệt bằng một điều khoản pháp luật. Mỗi câu hỏi con trên một dòng, không đánh số:\n\n{}",
            query.text
        );
        let response = llm.complete(&prompt).await?;
        let variants = non_empty_lines(&response);
        if variants.is_empty() {
            return Err(EnhanceError::NoVariants);
        }
        Ok(variants)
    }
}
