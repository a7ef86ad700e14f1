//! Shared result types and the error taxonomy for the search pipeline.

use serde::{Deserialize, Serialize};

/// One ranked hit returned to the caller.
///
/// `score` follows the ordering convention of the index metric: for
/// inner-product style metrics, higher means more similar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub text: String,
    pub score: f32,
}

/// Failures surfaced by the search pipeline.
///
/// Business failures are values, not panics: every stage returns a tagged
/// error the caller can map to a user-facing response. No stage retries
/// transparently except index connection establishment, and no partial
/// results are ever returned.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The source document could not be fetched (unreachable host, bad URL,
    /// or non-2xx status).
    #[error("failed to fetch document{}: {detail}", fmt_status(.status))]
    Fetch { status: Option<u16>, detail: String },

    /// The source produced no extractable text at all.
    #[error("no extractable text found in the document")]
    EmptyDocument,

    /// Chunking yielded an empty sequence. Guarded defensively; the
    /// whole-page fallback should make this unreachable for non-empty input.
    #[error("no text chunks could be produced from the document")]
    NoChunks,

    /// Token decode/encode failed while assembling chunk windows.
    #[error("chunking failed: {0}")]
    Chunking(String),

    /// The embedding model rejected the input or returned malformed vectors.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// The vector index could not be reached within the retry budget.
    /// Fatal for the request: nothing can proceed without the index.
    #[error(
        "vector index unreachable after {attempts} attempts: {cause}. \
         Verify the index service is running and the endpoint is correct"
    )]
    IndexUnavailable { attempts: usize, cause: String },

    /// `insert` precondition violated: chunks and embeddings must pair 1:1.
    #[error("batch length mismatch: {chunks} chunks vs {embeddings} embeddings")]
    BatchMismatch { chunks: usize, embeddings: usize },

    /// A vector index operation failed after a connection was established.
    #[error("vector index operation failed: {0}")]
    Index(String),

    /// Invalid or unparseable configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

fn fmt_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (status {code})"),
        None => String::new(),
    }
}

impl SearchError {
    /// True when the failure is correctable by the caller (bad location,
    /// empty page) rather than a service-side fault.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            SearchError::Fetch { .. } | SearchError::EmptyDocument | SearchError::NoChunks
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_includes_status_when_present() {
        let err = SearchError::Fetch {
            status: Some(404),
            detail: "not found".into(),
        };
        assert!(err.to_string().contains("status 404"));

        let err = SearchError::Fetch {
            status: None,
            detail: "connection refused".into(),
        };
        assert!(!err.to_string().contains("status"));
    }

    #[test]
    fn unavailable_error_carries_attempt_count() {
        let err = SearchError::IndexUnavailable {
            attempts: 3,
            cause: "connection refused".into(),
        };
        assert!(err.to_string().contains("3 attempts"));
    }

    #[test]
    fn user_error_classification() {
        assert!(SearchError::EmptyDocument.is_user_error());
        assert!(SearchError::NoChunks.is_user_error());
        assert!(
            !SearchError::IndexUnavailable {
                attempts: 3,
                cause: "down".into()
            }
            .is_user_error()
        );
    }
}
