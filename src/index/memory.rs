//! In-process vector index.
//!
//! Backs tests and index-service-less development with the same trait
//! surface as the Milvus client: full clear before ingest, paired inserts,
//! inner-product top-k queries.

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{IndexHit, VectorIndex};
use crate::types::SearchError;

#[derive(Debug, Default)]
struct Collection {
    records: Vec<(String, Vec<f32>)>,
}

/// Trait-complete in-memory index.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    collection: Mutex<Option<Collection>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records. Test helper.
    pub fn len(&self) -> usize {
        self.collection
            .lock()
            .as_ref()
            .map_or(0, |collection| collection.records.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn require_collection<'a>(
        guard: &'a mut Option<Collection>,
    ) -> Result<&'a mut Collection, SearchError> {
        guard
            .as_mut()
            .ok_or_else(|| SearchError::Index("collection has not been created".into()))
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn ensure_collection(&self) -> Result<(), SearchError> {
        let mut guard = self.collection.lock();
        if guard.is_none() {
            *guard = Some(Collection::default());
        }
        Ok(())
    }

    async fn reset(&self) -> Result<(), SearchError> {
        let mut guard = self.collection.lock();
        Self::require_collection(&mut guard)?.records.clear();
        Ok(())
    }

    async fn insert(&self, chunks: &[String], embeddings: &[Vec<f32>]) -> Result<(), SearchError> {
        if chunks.len() != embeddings.len() {
            return Err(SearchError::BatchMismatch {
                chunks: chunks.len(),
                embeddings: embeddings.len(),
            });
        }
        let mut guard = self.collection.lock();
        let collection = Self::require_collection(&mut guard)?;
        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            collection
                .records
                .push((chunk.clone(), embedding.clone()));
        }
        Ok(())
    }

    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<IndexHit>, SearchError> {
        let mut guard = self.collection.lock();
        let collection = Self::require_collection(&mut guard)?;

        let mut hits: Vec<IndexHit> = collection
            .records
            .iter()
            .map(|(text, vector)| IndexHit {
                text: text.clone(),
                score: inner_product(embedding, vector),
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);
        Ok(hits)
    }
}

fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
