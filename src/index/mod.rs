//! Vector index management.
//!
//! The index is a disposable per-query working set: it holds at most one
//! document's chunks, and every ingestion starts with a full clear. Both
//! implementations sit behind [`VectorIndex`]:
//!
//! * [`milvus::MilvusIndex`] — Milvus over its REST v2 API.
//! * [`memory::MemoryIndex`] — in-process storage for tests and local runs.

pub mod memory;
pub mod milvus;

use async_trait::async_trait;
use tracing::warn;

pub use memory::MemoryIndex;
pub use milvus::MilvusIndex;

use crate::types::SearchError;

/// One nearest-neighbor hit: stored chunk text plus its similarity score,
/// in the metric's native ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    pub text: String,
    pub score: f32,
}

/// Lifecycle and query operations the orchestrator needs from a vector
/// index.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Creates the collection and its similarity index if absent, then makes
    /// it queryable. Safe to call repeatedly; subsequent calls are no-ops.
    async fn ensure_collection(&self) -> Result<(), SearchError>;

    /// Deletes every record and flushes the deletion so later inserts start
    /// from an empty collection.
    async fn reset(&self) -> Result<(), SearchError>;

    /// Stores chunks paired 1:1 with their embeddings and flushes, making
    /// them visible to queries within the same request.
    ///
    /// Length mismatch is rejected with [`SearchError::BatchMismatch`]
    /// before anything is written.
    async fn insert(&self, chunks: &[String], embeddings: &[Vec<f32>]) -> Result<(), SearchError>;

    /// Returns up to `k` nearest records for `embedding`, best first.
    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<IndexHit>, SearchError>;
}

/// Runs `connect` up to `attempts` times, sleeping `backoff` between tries.
///
/// Exhaustion reports the final cause along with the attempt count; a
/// success part-way through surfaces nothing.
pub(crate) async fn connect_with_retry<F, Fut, T>(
    attempts: usize,
    backoff: std::time::Duration,
    mut connect: F,
) -> Result<T, SearchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, String>>,
{
    let mut last_cause = String::new();
    for attempt in 1..=attempts {
        match connect().await {
            Ok(value) => return Ok(value),
            Err(cause) => {
                warn!(attempt, attempts, %cause, "index connection attempt failed");
                last_cause = cause;
            }
        }
        if attempt < attempts && !backoff.is_zero() {
            tokio::time::sleep(backoff).await;
        }
    }
    Err(SearchError::IndexUnavailable {
        attempts,
        cause: last_cause,
    })
}

/// Truncates chunk text exceeding the index's text-field capacity.
///
/// Truncation is recorded with a warning; text is never silently dropped.
pub(crate) fn fit_text_capacity(chunks: &mut [String], max_chars: usize) {
    for chunk in chunks.iter_mut() {
        let char_count = chunk.chars().count();
        if char_count > max_chars {
            warn!(
                original_chars = char_count,
                max_chars, "chunk text exceeds index field capacity, truncating"
            );
            *chunk = chunk.chars().take(max_chars).collect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn retry_succeeds_midway_without_surfacing_an_error() {
        let calls = AtomicUsize::new(0);
        let result = connect_with_retry(3, Duration::ZERO, || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if attempt < 2 {
                    Err("connection refused".to_string())
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn retry_exhaustion_reports_attempt_count_and_cause() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = connect_with_retry(3, Duration::ZERO, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("connection refused".to_string()) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result {
            Err(SearchError::IndexUnavailable { attempts, cause }) => {
                assert_eq!(attempts, 3);
                assert_eq!(cause, "connection refused");
            }
            other => panic!("expected IndexUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn oversized_text_is_truncated_to_capacity() {
        let mut chunks = vec!["abcdef".to_string(), "ok".to_string()];
        fit_text_capacity(&mut chunks, 4);
        assert_eq!(chunks, vec!["abcd".to_string(), "ok".to_string()]);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let mut chunks = vec!["héllo wörld".to_string()];
        fit_text_capacity(&mut chunks, 7);
        assert_eq!(chunks[0].chars().count(), 7);
        assert_eq!(chunks[0], "héllo w");
    }
}
