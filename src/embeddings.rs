//! Embedding providers.
//!
//! The pipeline embeds all chunks of a document in one batch and the query
//! as a single item. Providers are deterministic for a fixed model version;
//! nothing here caches because each document is processed once per request.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::SearchError;

/// Maps text to fixed-dimension vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds a batch of texts, one vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError>;

    /// Embeds a single text (the query path).
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| SearchError::Embedding("provider returned no vector".into()))
    }

    /// Fixed dimension D of every vector this provider produces.
    fn dimension(&self) -> usize;
}

/// Checks a provider response against the batch it was produced for.
fn validate_vectors(
    vectors: &[Vec<f32>],
    expected_len: usize,
    dimension: usize,
) -> Result<(), SearchError> {
    if vectors.len() != expected_len {
        return Err(SearchError::Embedding(format!(
            "expected {expected_len} vectors, model returned {}",
            vectors.len()
        )));
    }
    for (idx, vector) in vectors.iter().enumerate() {
        if vector.len() != dimension {
            return Err(SearchError::Embedding(format!(
                "vector {idx} has dimension {}, expected {dimension}",
                vector.len()
            )));
        }
    }
    Ok(())
}

/// Client for a JSON embedding inference endpoint.
///
/// Accepts both common payload shapes: an OpenAI-style `data` array with
/// per-item `embedding`/`index`, or a bare `embeddings` matrix.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dimension: usize,
}

impl HttpEmbeddingProvider {
    pub fn new(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        model: impl Into<String>,
        dimension: usize,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
            dimension,
        }
    }
}

#[derive(Serialize)]
struct InferenceRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct InferenceResponse {
    #[serde(default)]
    data: Vec<InferenceItem>,
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

#[derive(Deserialize)]
struct InferenceItem {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

impl InferenceResponse {
    fn into_vectors(self) -> Result<Vec<Vec<f32>>, SearchError> {
        if !self.data.is_empty() {
            let mut data = self.data;
            data.sort_by_key(|item| item.index.unwrap_or(0));
            return Ok(data.into_iter().map(|item| item.embedding).collect());
        }
        if !self.embeddings.is_empty() {
            return Ok(self.embeddings);
        }
        Err(SearchError::Embedding(
            "inference response carried no embeddings".into(),
        ))
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = InferenceRequest {
            model: &self.model,
            input: texts,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|err| SearchError::Embedding(format!("inference request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Embedding(format!(
                "inference endpoint returned {status}: {body}"
            )));
        }

        let payload: InferenceResponse = response
            .json()
            .await
            .map_err(|err| SearchError::Embedding(format!("malformed inference response: {err}")))?;
        let vectors = payload.into_vectors()?;
        validate_vectors(&vectors, texts.len(), self.dimension)?;
        debug!(batch = texts.len(), dimension = self.dimension, "embedded batch");
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Deterministic in-process provider for tests and offline development.
///
/// Each text becomes a unit-normalized hashed bag-of-words vector, so texts
/// sharing words score higher under an inner-product metric than unrelated
/// ones. Identical inputs always produce identical vectors.
pub struct MockEmbeddingProvider {
    dimension: usize,
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new(384)
    }
}

impl MockEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for word in text.split_whitespace() {
            let cleaned: String = word
                .chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(|c| c.to_lowercase())
                .collect();
            if cleaned.is_empty() {
                continue;
            }
            let mut hash = 2166136261u32;
            for byte in cleaned.bytes() {
                hash ^= u32::from(byte);
                hash = hash.wrapping_mul(16777619);
            }
            vector[(hash as usize) % self.dimension] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_provider_is_deterministic() {
        let provider = MockEmbeddingProvider::new(64);
        let inputs = vec![
            "hello world".to_string(),
            "goodbye world".to_string(),
            "hello world".to_string(),
        ];

        let first = provider.embed_batch(&inputs).await.unwrap();
        let second = provider.embed_batch(&inputs).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first[0], first[2]);
        assert_ne!(first[0], first[1]);
    }

    #[tokio::test]
    async fn mock_vectors_have_configured_dimension() {
        let provider = MockEmbeddingProvider::new(32);
        let vector = provider.embed_one("some text").await.unwrap();
        assert_eq!(vector.len(), 32);
        assert_eq!(provider.dimension(), 32);
    }

    #[tokio::test]
    async fn shared_words_score_higher_than_disjoint_ones() {
        let provider = MockEmbeddingProvider::new(128);
        let query = provider.embed_one("cats").await.unwrap();
        let about_cats = provider.embed_one("a paragraph about cats").await.unwrap();
        let about_rust = provider.embed_one("ownership and borrowing").await.unwrap();

        let dot = |a: &[f32], b: &[f32]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
        assert!(dot(&query, &about_cats) > dot(&query, &about_rust));
    }

    #[test]
    fn validate_rejects_wrong_dimension() {
        let vectors = vec![vec![0.0; 4], vec![0.0; 3]];
        assert!(validate_vectors(&vectors, 2, 4).is_err());
        let vectors = vec![vec![0.0; 4], vec![0.0; 4]];
        assert!(validate_vectors(&vectors, 2, 4).is_ok());
        assert!(validate_vectors(&vectors, 3, 4).is_err());
    }
}
