//! Error taxonomy for the search pipeline.

use thiserror::Error;

/// Errors produced by the embedding client, corpus index, and search service.
///
/// Every variant maps to a stable machine-readable code via [`SearchError::kind`]
/// so front ends can report a distinguishable failure instead of a bare 500.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    /// The provider call for the batch starting at `offset` failed
    /// (network error, provider error, or malformed response).
    #[error("embedding provider failed for batch starting at index {offset}: {message}")]
    EmbeddingProvider { offset: usize, message: String },

    /// The corpus index has not finished building (or the build failed).
    #[error("corpus index is not ready")]
    IndexNotReady,

    /// The query was empty or whitespace-only.
    #[error("query must not be empty")]
    EmptyQuery,

    /// A vector's dimensionality differs from the one the index or model expects.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// `embed` was called with no texts.
    #[error("cannot embed an empty batch")]
    EmptyBatch,

    /// `build` was called with no corpus entries.
    #[error("corpus must contain at least one entry")]
    EmptyCorpus,

    /// Another build is currently running.
    #[error("corpus index build already in progress")]
    BuildInProgress,

    /// The index is ready; the corpus is static and is not rebuilt in place.
    #[error("corpus index is already built")]
    AlreadyBuilt,
}

impl SearchError {
    pub fn provider(offset: usize, err: impl std::fmt::Display) -> Self {
        Self::EmbeddingProvider {
            offset,
            message: err.to_string(),
        }
    }

    /// Machine-readable error code.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmbeddingProvider { .. } => "provider_error",
            Self::IndexNotReady => "index_not_ready",
            Self::EmptyQuery => "empty_query",
            Self::DimensionMismatch { .. } => "dimension_mismatch",
            Self::EmptyBatch => "empty_batch",
            Self::EmptyCorpus => "empty_corpus",
            Self::BuildInProgress => "build_in_progress",
            Self::AlreadyBuilt => "already_built",
        }
    }

    /// Whether retrying the same request later can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::IndexNotReady | Self::BuildInProgress | Self::EmbeddingProvider { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_carries_offset() {
        let err = SearchError::provider(200, "HTTP 500");
        assert_eq!(
            err,
            SearchError::EmbeddingProvider {
                offset: 200,
                message: "HTTP 500".to_string()
            }
        );
        assert!(err.to_string().contains("starting at index 200"));
        assert_eq!(err.kind(), "provider_error");
    }

    #[test]
    fn test_input_errors_are_not_retryable() {
        assert!(!SearchError::EmptyQuery.is_retryable());
        assert!(!SearchError::DimensionMismatch {
            expected: 3,
            actual: 2
        }
        .is_retryable());
        assert!(SearchError::IndexNotReady.is_retryable());
    }
}
