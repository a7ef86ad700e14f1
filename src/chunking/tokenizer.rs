//! Tokenizer seam for the chunker.
//!
//! The chunker's window arithmetic only needs `encode` and `decode`; the
//! concrete vocabulary is an implementation detail behind this trait, which
//! also keeps tests free to substitute a deterministic toy tokenizer.

use tiktoken_rs::CoreBPE;

use crate::types::SearchError;

/// Encode/decode contract the chunker relies on.
///
/// Decoding a contiguous token window and re-encoding the result must not
/// exceed the window's length; chunk boundaries are defined in token space
/// precisely to preserve that property.
pub trait Tokenizer: Send + Sync {
    fn encode(&self, text: &str) -> Vec<u32>;
    fn decode(&self, tokens: &[u32]) -> Result<String, SearchError>;

    fn count(&self, text: &str) -> usize {
        self.encode(text).len()
    }
}

/// BPE tokenizer backed by `tiktoken-rs`.
pub struct BpeTokenizer {
    bpe: CoreBPE,
}

impl BpeTokenizer {
    /// Builds the default `cl100k_base` tokenizer.
    pub fn new() -> Result<Self, SearchError> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|err| SearchError::Chunking(format!("failed to load tokenizer: {err}")))?;
        Ok(Self { bpe })
    }
}

impl Tokenizer for BpeTokenizer {
    fn encode(&self, text: &str) -> Vec<u32> {
        self.bpe.encode_ordinary(text)
    }

    fn decode(&self, tokens: &[u32]) -> Result<String, SearchError> {
        self.bpe
            .decode(tokens.to_vec())
            .map_err(|err| SearchError::Chunking(format!("token decode failed: {err}")))
    }
}
