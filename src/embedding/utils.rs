//! Tokenizer/model loading helpers shared by the reranker and, potentially, any
//! future in-process embedding backend.

use std::path::Path;

use tokenizers::{PaddingParams, Tokenizer, TruncationParams};

/// Loads a `tokenizer.json` from `model_dir` and configures it to pad/truncate to
/// `max_seq_len`, matching the sequence-pair encoding the reranker's cross-encoder
/// forward pass expects.
pub fn load_tokenizer_with_truncation<P: AsRef<Path>>(
    model_dir: P,
    max_seq_len: usize,
) -> Result<Tokenizer, String> {
    let tokenizer_path = model_dir.as_ref().join("tokenizer.json");
    let mut tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| e.to_string())?;

    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length: max_seq_len,
            ..Default::default()
        }))
        .map_err(|e| e.to_string())?;
    tokenizer.with_padding(Some(PaddingParams::default()));

    Ok(tokenizer)
}
