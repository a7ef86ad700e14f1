//! Token-bounded chunking.
//!
//! Blocks that fit the token budget pass through verbatim; longer blocks are
//! split into consecutive token windows and each window is decoded back to
//! text. When no block produces a chunk the whole-page text is windowed the
//! same way, so any document with text yields at least one chunk.

pub mod tokenizer;

pub use tokenizer::{BpeTokenizer, Tokenizer};

use tracing::debug;

use crate::ingestion::Document;
use crate::types::SearchError;

/// Splits an extracted document into chunks of at most `max_tokens` tokens.
///
/// Returns [`SearchError::EmptyDocument`] when the source produced no text
/// at all.
pub fn chunk_document(
    tokenizer: &dyn Tokenizer,
    document: &Document,
    max_tokens: usize,
) -> Result<Vec<String>, SearchError> {
    let mut chunks = Vec::new();

    for block in &document.blocks {
        let tokens = tokenizer.encode(block);
        if tokens.is_empty() {
            continue;
        }
        if tokens.len() <= max_tokens {
            chunks.push(block.clone());
        } else {
            split_token_windows(tokenizer, &tokens, max_tokens, &mut chunks)?;
        }
    }

    // Whole-page fallback for documents whose text lives outside the block
    // elements the extractor targets.
    if chunks.is_empty() {
        if document.full_text.trim().is_empty() {
            return Err(SearchError::EmptyDocument);
        }
        let tokens = tokenizer.encode(&document.full_text);
        split_token_windows(tokenizer, &tokens, max_tokens, &mut chunks)?;
    }

    debug!(
        blocks = document.blocks.len(),
        chunks = chunks.len(),
        max_tokens,
        "chunked document"
    );
    Ok(chunks)
}

fn split_token_windows(
    tokenizer: &dyn Tokenizer,
    tokens: &[u32],
    max_tokens: usize,
    out: &mut Vec<String>,
) -> Result<(), SearchError> {
    let mut start = 0;
    while start < tokens.len() {
        let limit = usize::min(start + max_tokens, tokens.len());
        let mut end = limit;
        // BPE represents rare characters as byte-level tokens, so a window
        // boundary can land inside a multi-byte character and fail to decode.
        // Pull the boundary back to the last decodable position; when a
        // single character needs more tokens than the budget, push forward
        // and emit it whole instead.
        while end > start + 1 && tokenizer.decode(&tokens[start..end]).is_err() {
            end -= 1;
        }
        if tokenizer.decode(&tokens[start..end]).is_err() {
            end = limit;
            while end < tokens.len() && tokenizer.decode(&tokens[start..end]).is_err() {
                end += 1;
            }
        }
        let text = tokenizer.decode(&tokens[start..end])?;
        if !text.trim().is_empty() {
            out.push(text);
        }
        start = end;
    }
    Ok(())
}
