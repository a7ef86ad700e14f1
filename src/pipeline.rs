//! The search orchestrator.
//!
//! Coordinates fetch → chunk → embed → index → query as strictly sequential
//! stages, each a hard dependency on the previous one succeeding. No stage
//! retries transparently (index connection retry happens at construction),
//! and no partial results are ever returned.

use std::sync::Arc;

use reqwest::Client;
use tokio::sync::Mutex;
use tracing::{info, instrument};
use url::Url;

use crate::chunking::{Tokenizer, chunk_document};
use crate::config::SearchConfig;
use crate::embeddings::EmbeddingProvider;
use crate::index::{VectorIndex, fit_text_capacity};
use crate::ingestion::fetch_document;
use crate::types::{SearchError, SearchResult};

/// Explicitly constructed service context: the pipeline owns its injected
/// collaborators instead of reaching for shared globals, which keeps
/// lifecycle and test substitution explicit.
pub struct SearchPipeline {
    client: Client,
    tokenizer: Arc<dyn Tokenizer>,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    config: SearchConfig,
    /// Serializes {reset, insert, query} across requests: the index holds a
    /// single document's working set, so one request's clear must never
    /// interleave with another's insert or query.
    ingest_lock: Mutex<()>,
}

impl SearchPipeline {
    pub fn builder() -> SearchPipelineBuilder {
        SearchPipelineBuilder::default()
    }

    /// Runs the whole pipeline for one `(location, query)` request and
    /// returns up to `top_k` results in descending-similarity order.
    #[instrument(skip(self), fields(location = %location))]
    pub async fn search(
        &self,
        location: &str,
        query: &str,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let url = Url::parse(location).map_err(|err| SearchError::Fetch {
            status: None,
            detail: format!("invalid location '{location}': {err}"),
        })?;

        let document = fetch_document(&self.client, &url, self.config.fetch_timeout).await?;

        let mut chunks =
            chunk_document(self.tokenizer.as_ref(), &document, self.config.max_tokens_per_chunk)?;
        if chunks.is_empty() {
            return Err(SearchError::NoChunks);
        }
        fit_text_capacity(&mut chunks, self.config.max_text_chars);

        let embeddings = self.embedder.embed_batch(&chunks).await?;

        self.index.ensure_collection().await?;

        // Critical section: clear-then-insert-then-query must not interleave
        // with a concurrent request against the same collection.
        let _guard = self.ingest_lock.lock().await;
        self.index.reset().await?;
        self.index.insert(&chunks, &embeddings).await?;

        let query_embedding = self.embedder.embed_one(query).await?;
        let hits = self.index.query(&query_embedding, self.config.top_k).await?;
        drop(_guard);

        info!(
            chunks = chunks.len(),
            hits = hits.len(),
            "search pipeline completed"
        );

        Ok(hits
            .into_iter()
            .map(|hit| SearchResult {
                text: hit.text,
                score: hit.score,
            })
            .collect())
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }
}

/// Builder wiring the pipeline's collaborators.
#[derive(Default)]
pub struct SearchPipelineBuilder {
    client: Option<Client>,
    tokenizer: Option<Arc<dyn Tokenizer>>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    index: Option<Arc<dyn VectorIndex>>,
    config: Option<SearchConfig>,
}

impl SearchPipelineBuilder {
    #[must_use]
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    #[must_use]
    pub fn tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.tokenizer = Some(tokenizer);
        self
    }

    #[must_use]
    pub fn embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    #[must_use]
    pub fn index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    #[must_use]
    pub fn config(mut self, config: SearchConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Builds the pipeline, failing if any collaborator is missing.
    pub fn build(self) -> Result<SearchPipeline, SearchError> {
        Ok(SearchPipeline {
            client: self.client.unwrap_or_default(),
            tokenizer: self
                .tokenizer
                .ok_or_else(|| SearchError::Config("pipeline requires a tokenizer".into()))?,
            embedder: self
                .embedder
                .ok_or_else(|| SearchError::Config("pipeline requires an embedding provider".into()))?,
            index: self
                .index
                .ok_or_else(|| SearchError::Config("pipeline requires a vector index".into()))?,
            config: self.config.unwrap_or_default(),
            ingest_lock: Mutex::new(()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_requires_all_collaborators() {
        let result = SearchPipeline::builder().build();
        assert!(matches!(result, Err(SearchError::Config(_))));
    }

    #[tokio::test]
    async fn invalid_location_is_a_fetch_error() {
        use crate::embeddings::MockEmbeddingProvider;
        use crate::index::MemoryIndex;

        struct NoopTokenizer;
        impl Tokenizer for NoopTokenizer {
            fn encode(&self, _text: &str) -> Vec<u32> {
                Vec::new()
            }
            fn decode(&self, _tokens: &[u32]) -> Result<String, SearchError> {
                Ok(String::new())
            }
        }

        let pipeline = SearchPipeline::builder()
            .tokenizer(Arc::new(NoopTokenizer))
            .embedder(Arc::new(MockEmbeddingProvider::new(8)))
            .index(Arc::new(MemoryIndex::new()))
            .build()
            .unwrap();

        let result = pipeline.search("not a url", "query").await;
        assert!(matches!(result, Err(SearchError::Fetch { status: None, .. })));
    }
}
