//! Error types for the `docqa-rag` crate.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while answering a question over the document.
#[derive(Debug, Error)]
pub enum RagError {
    /// The source document could not be read.
    #[error("Document not found at {}: {source}", path.display())]
    DocumentNotFound {
        /// The configured document path.
        path: PathBuf,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The embedding provider failed (network, auth, quota, or a malformed response).
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingProviderError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A query was issued against an index that holds no chunks.
    #[error("Retrieval error: the index is empty")]
    RetrievalEmptyIndex,

    /// The completion provider failed.
    #[error("Completion error ({provider}): {message}")]
    CompletionProviderError {
        /// The completion provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The user query was rejected before any provider call.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An external call did not finish within the configured bound.
    #[error("{operation} timed out after {}s", timeout.as_secs_f64())]
    Timeout {
        /// The operation that was cut off.
        operation: &'static str,
        /// The bound that was exceeded.
        timeout: Duration,
    },
}

impl RagError {
    /// A short machine-readable name for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DocumentNotFound { .. } => "document_not_found",
            Self::EmbeddingProviderError { .. } => "embedding_provider_error",
            Self::RetrievalEmptyIndex => "retrieval_empty_index",
            Self::CompletionProviderError { .. } => "completion_provider_error",
            Self::InvalidQuery(_) => "invalid_query",
            Self::ConfigError(_) => "config_error",
            Self::Timeout { .. } => "timeout",
        }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
