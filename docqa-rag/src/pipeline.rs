//! Indexing and retrieval.
//!
//! The [`RagPipeline`] composes a [`Chunker`] and an [`EmbeddingProvider`] to
//! turn a [`Document`] into a [`FlatIndex`] (chunk → embed → index) and to
//! answer retrieval queries against it (embed → search → threshold).
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::{RagPipeline, RagConfig, Document};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .build()?;
//!
//! let index = pipeline.build_index(&document).await?;
//! let results = pipeline.retrieve(&index, "search query", None).await?;
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::chunking::Chunker;
use crate::config::RagConfig;
use crate::document::{Document, SearchResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::FlatIndex;

/// Run `future`, failing with [`RagError::Timeout`] if it takes longer than `timeout`.
pub(crate) async fn bounded<T>(
    operation: &'static str,
    timeout: Duration,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => {
            error!(operation, timeout_secs = timeout.as_secs_f64(), "external call timed out");
            Err(RagError::Timeout { operation, timeout })
        }
    }
}

/// Builds indexes and runs retrieval against them.
///
/// Construct one via [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    chunker: Arc<dyn Chunker>,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Chunk the document, embed every chunk, and index the vectors.
    ///
    /// Chunks are embedded in batches of `embed_batch_size`; each batch is
    /// bounded by `request_timeout`. An empty document yields an empty index
    /// without calling the provider.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingProviderError`] if the provider fails or
    /// returns the wrong number of vectors, and [`RagError::Timeout`] if a
    /// batch exceeds the bound.
    pub async fn build_index(&self, document: &Document) -> Result<FlatIndex> {
        let chunks = self.chunker.chunk(document);
        if chunks.is_empty() {
            info!(path = %document.path.display(), chunk_count = 0, "indexed document (empty)");
            return Ok(FlatIndex::empty(self.config.metric));
        }

        let provider = self.embedding_provider.name().to_string();
        let mut embeddings = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.config.embed_batch_size) {
            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            debug!(provider = %provider, batch_size = texts.len(), "embedding chunk batch");

            let vectors = bounded(
                "chunk embedding",
                self.config.request_timeout,
                self.embedding_provider.embed_batch(&texts),
            )
            .await
            .inspect_err(|e| error!(error = %e, "embedding failed during indexing"))?;

            if vectors.len() != texts.len() {
                return Err(RagError::EmbeddingProviderError {
                    provider,
                    message: format!(
                        "expected {} embeddings, received {}",
                        texts.len(),
                        vectors.len()
                    ),
                });
            }
            embeddings.extend(vectors);
        }

        let index = FlatIndex::new(&provider, chunks, embeddings, self.config.metric)?;
        info!(
            path = %document.path.display(),
            chunk_count = index.len(),
            dimensions = index.dimensions(),
            "indexed document"
        );
        Ok(index)
    }

    /// Embed `query` and return the closest chunks.
    ///
    /// `top_k` overrides the configured value when given. Results below the
    /// configured similarity threshold are dropped after ranking.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::RetrievalEmptyIndex`] for an empty index (before
    /// any provider call), [`RagError::EmbeddingProviderError`] if the query
    /// cannot be embedded, and [`RagError::Timeout`] if embedding exceeds the bound.
    pub async fn retrieve(
        &self,
        index: &FlatIndex,
        query: &str,
        top_k: Option<usize>,
    ) -> Result<Vec<SearchResult>> {
        if index.is_empty() {
            return Err(RagError::RetrievalEmptyIndex);
        }

        let query_embedding = bounded(
            "query embedding",
            self.config.request_timeout,
            self.embedding_provider.embed(query),
        )
        .await
        .inspect_err(|e| error!(error = %e, "embedding failed during query"))?;

        let top_k = top_k.unwrap_or(self.config.top_k);
        let results = index.search(&query_embedding, top_k).map_err(|e| match e {
            RagError::EmbeddingProviderError { message, .. } => RagError::EmbeddingProviderError {
                provider: self.embedding_provider.name().to_string(),
                message,
            },
            other => other,
        })?;

        let results: Vec<SearchResult> = match self.config.similarity_threshold {
            Some(threshold) => results.into_iter().filter(|r| r.score >= threshold).collect(),
            None => results,
        };

        info!(top_k, result_count = results.len(), "retrieval completed");
        Ok(results)
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// `config` and `embedding_provider` are required. The chunker defaults to the
/// one selected by [`RagConfig::chunker`].
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    chunker: Option<Arc<dyn Chunker>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Override the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Build the [`RagPipeline`], validating the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required field is missing or the
    /// configuration is invalid.
    pub fn build(self) -> Result<RagPipeline> {
        let config =
            self.config.ok_or_else(|| RagError::ConfigError("config is required".to_string()))?;
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let chunker = self.chunker.unwrap_or_else(|| config.build_chunker());

        Ok(RagPipeline { config, embedding_provider, chunker })
    }
}
