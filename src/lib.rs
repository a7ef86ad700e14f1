//! ```text
//! POST /search {url, query}
//!        │
//!        ▼
//! ingestion::fetch ──► Document (text blocks + whole-page fallback text)
//!        │
//!        ▼
//! chunking::chunk_document ──► token-bounded chunks
//!        │
//!        ▼
//! embeddings::EmbeddingProvider ──► fixed-dimension vectors
//!        │
//!        ▼
//! index::VectorIndex (reset ► insert ► query) ──► ranked SearchResults
//! ```
//!
//! The pipeline treats its collaborators as replaceable services: the
//! tokenizer, the embedding model, and the vector index all sit behind
//! traits, with production implementations (tiktoken, an HTTP inference
//! endpoint, Milvus over REST) and deterministic in-process substitutes
//! for tests.

pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod index;
pub mod ingestion;
pub mod pipeline;
pub mod server;
pub mod types;

pub use config::SearchConfig;
pub use pipeline::SearchPipeline;
pub use types::{SearchError, SearchResult};
