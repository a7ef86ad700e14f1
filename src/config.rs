//! Pipeline configuration.
//!
//! All knobs are fixed for the lifetime of the process; there is no dynamic
//! reconfiguration. Defaults mirror the reference deployment (500-token
//! chunks, 384-dimension embeddings, IVF_FLAT/IP index, top-10 retrieval)
//! and every field can be overridden through `PAGESIFT_*` environment
//! variables, loaded after `dotenvy::dotenv()` in the binary.

use std::time::Duration;

use crate::types::SearchError;

/// Similarity metric configured on the vector index.
///
/// Determines both the index build parameters and the ordering convention of
/// returned scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Metric {
    /// Inner product: higher score = more similar.
    #[default]
    InnerProduct,
    /// Cosine similarity: higher score = more similar.
    Cosine,
    /// Euclidean distance: lower score = more similar.
    L2,
}

impl Metric {
    /// Wire name understood by the index service.
    pub fn as_str(self) -> &'static str {
        match self {
            Metric::InnerProduct => "IP",
            Metric::Cosine => "COSINE",
            Metric::L2 => "L2",
        }
    }

    fn parse(raw: &str) -> Result<Self, SearchError> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "IP" => Ok(Metric::InnerProduct),
            "COSINE" => Ok(Metric::Cosine),
            "L2" => Ok(Metric::L2),
            other => Err(SearchError::Config(format!("unknown metric '{other}'"))),
        }
    }
}

/// Configuration constants for the whole pipeline.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Maximum tokens per chunk, as measured by the tokenizer.
    pub max_tokens_per_chunk: usize,
    /// Fixed dimension D of every embedding vector.
    pub embedding_dim: usize,
    /// Name of the index collection holding the current document's chunks.
    pub collection_name: String,
    /// Similarity metric for index build and score ordering.
    pub metric: Metric,
    /// IVF partition count used when building the index.
    pub index_nlist: u32,
    /// Partitions probed per query.
    pub query_nprobe: u32,
    /// Number of nearest neighbors returned per search.
    pub top_k: usize,
    /// Connection attempts before giving up on the index service.
    pub connect_attempts: usize,
    /// Delay between connection attempts. Zero = immediate retry, which is
    /// the reference behavior.
    pub connect_backoff: Duration,
    /// Network timeout for the document fetch.
    pub fetch_timeout: Duration,
    /// Capacity of the index's text field, in characters. Longer chunk text
    /// is truncated before insert.
    pub max_text_chars: usize,
    /// Base URL of the Milvus REST endpoint.
    pub milvus_endpoint: String,
    /// URL of the embedding inference endpoint.
    pub embedding_endpoint: String,
    /// Model identifier sent to the inference endpoint.
    pub embedding_model: String,
    /// Address the HTTP server binds to.
    pub bind_addr: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_tokens_per_chunk: 500,
            embedding_dim: 384,
            collection_name: "html_chunks".to_string(),
            metric: Metric::InnerProduct,
            index_nlist: 128,
            query_nprobe: 10,
            top_k: 10,
            connect_attempts: 3,
            connect_backoff: Duration::ZERO,
            fetch_timeout: Duration::from_secs(10),
            max_text_chars: 5000,
            milvus_endpoint: "http://localhost:19530".to_string(),
            embedding_endpoint: "http://localhost:8080/embed".to_string(),
            embedding_model: "all-MiniLM-L6-v2".to_string(),
            bind_addr: "0.0.0.0:8000".to_string(),
        }
    }
}

impl SearchConfig {
    /// Builds a configuration from defaults plus `PAGESIFT_*` environment
    /// overrides.
    pub fn from_env() -> Result<Self, SearchError> {
        let mut config = Self::default();

        if let Some(v) = env_var("PAGESIFT_MAX_TOKENS") {
            config.max_tokens_per_chunk = parse_num("PAGESIFT_MAX_TOKENS", &v)?;
        }
        if let Some(v) = env_var("PAGESIFT_EMBEDDING_DIM") {
            config.embedding_dim = parse_num("PAGESIFT_EMBEDDING_DIM", &v)?;
        }
        if let Some(v) = env_var("PAGESIFT_COLLECTION") {
            config.collection_name = v;
        }
        if let Some(v) = env_var("PAGESIFT_METRIC") {
            config.metric = Metric::parse(&v)?;
        }
        if let Some(v) = env_var("PAGESIFT_NLIST") {
            config.index_nlist = parse_num("PAGESIFT_NLIST", &v)?;
        }
        if let Some(v) = env_var("PAGESIFT_NPROBE") {
            config.query_nprobe = parse_num("PAGESIFT_NPROBE", &v)?;
        }
        if let Some(v) = env_var("PAGESIFT_TOP_K") {
            config.top_k = parse_num("PAGESIFT_TOP_K", &v)?;
        }
        if let Some(v) = env_var("PAGESIFT_CONNECT_ATTEMPTS") {
            config.connect_attempts = parse_num("PAGESIFT_CONNECT_ATTEMPTS", &v)?;
        }
        if let Some(v) = env_var("PAGESIFT_CONNECT_BACKOFF_MS") {
            config.connect_backoff =
                Duration::from_millis(parse_num("PAGESIFT_CONNECT_BACKOFF_MS", &v)?);
        }
        if let Some(v) = env_var("PAGESIFT_FETCH_TIMEOUT_SECS") {
            config.fetch_timeout =
                Duration::from_secs(parse_num("PAGESIFT_FETCH_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = env_var("PAGESIFT_MAX_TEXT_CHARS") {
            config.max_text_chars = parse_num("PAGESIFT_MAX_TEXT_CHARS", &v)?;
        }
        if let Some(v) = env_var("PAGESIFT_MILVUS_ENDPOINT") {
            config.milvus_endpoint = v;
        }
        if let Some(v) = env_var("PAGESIFT_EMBEDDING_ENDPOINT") {
            config.embedding_endpoint = v;
        }
        if let Some(v) = env_var("PAGESIFT_EMBEDDING_MODEL") {
            config.embedding_model = v;
        }
        if let Some(v) = env_var("PAGESIFT_BIND_ADDR") {
            config.bind_addr = v;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), SearchError> {
        if self.max_tokens_per_chunk == 0 {
            return Err(SearchError::Config(
                "max tokens per chunk must be positive".into(),
            ));
        }
        if self.embedding_dim == 0 {
            return Err(SearchError::Config("embedding dimension must be positive".into()));
        }
        if self.connect_attempts == 0 {
            return Err(SearchError::Config(
                "at least one connection attempt is required".into(),
            ));
        }
        if self.top_k == 0 {
            return Err(SearchError::Config("top_k must be positive".into()));
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_num<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, SearchError> {
    raw.trim()
        .parse()
        .map_err(|_| SearchError::Config(format!("{name} has invalid value '{raw}'")))
}
