//! End-to-end question answering over the configured document.
//!
//! [`DocumentQa`] owns the long-lived state of the process: the pipeline, the
//! responder, and the [`IndexCache`]. Each question re-reads the document
//! (cheap), reuses the cached index when the content hash is unchanged, and
//! rebuilds it otherwise.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::cache::{IndexCache, IndexSnapshot, IndexStatus};
use crate::document::Document;
use crate::error::{RagError, Result};
use crate::pipeline::{RagPipeline, bounded};
use crate::responder::{Answer, Responder};

/// The question-answering service.
pub struct DocumentQa {
    pipeline: RagPipeline,
    responder: Responder,
    cache: IndexCache,
}

impl DocumentQa {
    /// Assemble the service from a pipeline and a responder.
    pub fn new(pipeline: RagPipeline, responder: Responder) -> Self {
        Self { pipeline, responder, cache: IndexCache::new() }
    }

    /// The underlying pipeline.
    pub fn pipeline(&self) -> &RagPipeline {
        &self.pipeline
    }

    /// Read the document and return the index for its current content,
    /// building it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DocumentNotFound`] if the document cannot be read,
    /// or any indexing error from [`RagPipeline::build_index`].
    pub async fn index(&self) -> Result<Arc<IndexSnapshot>> {
        let document = Document::load(&self.pipeline.config().document_path).await?;
        self.cache
            .get_or_build(&document.content_hash, || self.pipeline.build_index(&document))
            .await
    }

    /// Build the index eagerly, e.g. at startup.
    ///
    /// # Errors
    ///
    /// See [`DocumentQa::index`].
    pub async fn prime(&self) -> Result<IndexStatus> {
        Ok(self.index().await?.status())
    }

    /// Rebuild the index from the document on disk, even if its content is unchanged.
    ///
    /// On failure the previously cached index keeps serving queries.
    ///
    /// # Errors
    ///
    /// See [`DocumentQa::index`].
    pub async fn refresh(&self) -> Result<IndexStatus> {
        let document = Document::load(&self.pipeline.config().document_path).await?;
        let snapshot = self
            .cache
            .rebuild(&document.content_hash, || self.pipeline.build_index(&document))
            .await?;
        Ok(snapshot.status())
    }

    /// The status of the cached index, if one has been built.
    pub async fn status(&self) -> Option<IndexStatus> {
        self.cache.current().await.map(|snapshot| snapshot.status())
    }

    /// Answer `query` from the document.
    ///
    /// `top_k` overrides the configured retrieval depth. Steps run strictly in
    /// sequence; no completion call is made if loading, indexing, or retrieval fails.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidQuery`] for an empty query
    /// - [`RagError::DocumentNotFound`] if the document cannot be read
    /// - [`RagError::EmbeddingProviderError`] if indexing or query embedding fails
    /// - [`RagError::RetrievalEmptyIndex`] for an empty document under
    ///   [`EmptyContextPolicy::Reject`](crate::responder::EmptyContextPolicy::Reject)
    /// - [`RagError::CompletionProviderError`] if the model call fails
    /// - [`RagError::Timeout`] if any external call exceeds the bound
    #[instrument(skip(self, query), fields(query_len = query.len()))]
    pub async fn answer(&self, query: &str, top_k: Option<usize>) -> Result<Answer> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RagError::InvalidQuery("query must not be empty".to_string()));
        }
        if top_k == Some(0) {
            return Err(RagError::InvalidQuery("top_k must be greater than zero".to_string()));
        }

        let snapshot = self.index().await?;
        let context = if snapshot.index.is_empty() {
            Vec::new()
        } else {
            self.pipeline.retrieve(&snapshot.index, query, top_k).await?
        };

        let answer = bounded(
            "completion",
            self.pipeline.config().request_timeout,
            self.responder.respond(query, context),
        )
        .await?;

        info!(
            sources = answer.sources.len(),
            model_called = answer.model_called,
            "question answered"
        );
        Ok(answer)
    }
}
