//! Configuration for the question-answering pipeline.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chunking::{Chunker, FixedSizeChunker, RecursiveChunker};
use crate::error::{RagError, Result};
use crate::index::DistanceMetric;
use crate::responder::EmptyContextPolicy;

/// Default path of the source document.
pub const DEFAULT_DOCUMENT_PATH: &str = "my_document.txt";
/// Default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
/// Default completion model.
pub const DEFAULT_COMPLETION_MODEL: &str = "gpt-4o-mini";

/// Which [`Chunker`] implementation to split the document with.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChunkerKind {
    /// [`RecursiveChunker`]: boundary-aware splitting.
    #[default]
    Recursive,
    /// [`FixedSizeChunker`]: plain character windows.
    Fixed,
}

impl ChunkerKind {
    /// Instantiate the chunker with the given size and overlap.
    pub fn build(self, chunk_size: usize, chunk_overlap: usize) -> Arc<dyn Chunker> {
        match self {
            Self::Recursive => Arc::new(RecursiveChunker::new(chunk_size, chunk_overlap)),
            Self::Fixed => Arc::new(FixedSizeChunker::new(chunk_size, chunk_overlap)),
        }
    }
}

/// Configuration parameters for the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Path of the UTF-8 document to answer questions about.
    pub document_path: PathBuf,
    /// Chunking strategy.
    pub chunker: ChunkerKind,
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Maximum number of characters shared by consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of chunks retrieved per query.
    pub top_k: usize,
    /// Results scoring below this are dropped after ranking.
    pub similarity_threshold: Option<f32>,
    /// Similarity measure used by the index.
    pub metric: DistanceMetric,
    /// Maximum number of texts sent in one embedding request.
    pub embed_batch_size: usize,
    /// Embedding model identifier.
    pub embedding_model: String,
    /// Completion model identifier.
    pub completion_model: String,
    /// Completion sampling temperature.
    pub temperature: f32,
    /// Bound on every external call.
    pub request_timeout: Duration,
    /// What to do when there is no context to answer from.
    pub empty_context_policy: EmptyContextPolicy,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            document_path: PathBuf::from(DEFAULT_DOCUMENT_PATH),
            chunker: ChunkerKind::default(),
            chunk_size: 500,
            chunk_overlap: 50,
            top_k: 5,
            similarity_threshold: None,
            metric: DistanceMetric::default(),
            embed_batch_size: 64,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            completion_model: DEFAULT_COMPLETION_MODEL.to_string(),
            temperature: 0.0,
            request_timeout: Duration::from_secs(30),
            empty_context_policy: EmptyContextPolicy::default(),
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Instantiate the configured chunker.
    pub fn build_chunker(&self) -> Arc<dyn Chunker> {
        self.chunker.build(self.chunk_size, self.chunk_overlap)
    }

    /// Check that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - `embed_batch_size == 0`
    /// - `temperature` is outside `[0, 2]`
    /// - `request_timeout` is zero
    /// - `similarity_threshold` is NaN or infinite
    /// - a model identifier is empty
    pub fn validate(&self) -> Result<()> {
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if self.embed_batch_size == 0 {
            return Err(RagError::ConfigError(
                "embed_batch_size must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(RagError::ConfigError(format!(
                "temperature ({}) must be between 0 and 2",
                self.temperature
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(RagError::ConfigError("request_timeout must be non-zero".to_string()));
        }
        if let Some(threshold) = self.similarity_threshold.filter(|t| !t.is_finite()) {
            return Err(RagError::ConfigError(format!(
                "similarity_threshold ({threshold}) must be a finite number"
            )));
        }
        if self.embedding_model.trim().is_empty() || self.completion_model.trim().is_empty() {
            return Err(RagError::ConfigError("model identifiers must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the document path.
    pub fn document_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.document_path = path.into();
        self
    }

    /// Set the chunking strategy.
    pub fn chunker(mut self, kind: ChunkerKind) -> Self {
        self.config.chunker = kind;
        self
    }

    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of chunks retrieved per query.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Drop results scoring below `threshold`.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = Some(threshold);
        self
    }

    /// Set the similarity measure.
    pub fn metric(mut self, metric: DistanceMetric) -> Self {
        self.config.metric = metric;
        self
    }

    /// Set the maximum number of texts per embedding request.
    pub fn embed_batch_size(mut self, size: usize) -> Self {
        self.config.embed_batch_size = size;
        self
    }

    /// Set the embedding model identifier.
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.config.embedding_model = model.into();
        self
    }

    /// Set the completion model identifier.
    pub fn completion_model(mut self, model: impl Into<String>) -> Self {
        self.config.completion_model = model.into();
        self
    }

    /// Set the completion temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    /// Set the bound on every external call.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set the empty-context behavior.
    pub fn empty_context_policy(mut self, policy: EmptyContextPolicy) -> Self {
        self.config.empty_context_policy = policy;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_settings() {
        let config = RagConfig::default();
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.chunk_overlap, 50);
        assert_eq!(config.top_k, 5);
        assert_eq!(config.completion_model, "gpt-4o-mini");
        assert_eq!(config.temperature, 0.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn overlap_must_be_smaller_than_size() {
        let err = RagConfig::builder().chunk_size(10).chunk_overlap(10).build().unwrap_err();
        assert!(matches!(err, RagError::ConfigError(msg) if msg.contains("chunk_overlap")));
    }

    #[test]
    fn rejects_zero_top_k_and_bad_temperature() {
        assert!(RagConfig::builder().top_k(0).build().is_err());
        assert!(RagConfig::builder().temperature(2.5).build().is_err());
        assert!(RagConfig::builder().temperature(f32::NAN).build().is_err());
        assert!(RagConfig::builder().request_timeout(Duration::ZERO).build().is_err());
    }

    #[test]
    fn similarity_threshold_must_be_finite() {
        assert!(RagConfig::builder().similarity_threshold(0.25).build().is_ok());
        assert!(RagConfig::builder().similarity_threshold(-1.0).build().is_ok());
        for threshold in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            let err = RagConfig::builder().similarity_threshold(threshold).build().unwrap_err();
            assert!(matches!(err, RagError::ConfigError(msg) if msg.contains("similarity_threshold")));
        }
    }
}
