//! Process-wide index cache keyed by document content hash.
//!
//! The cache holds at most one [`IndexSnapshot`]. Readers clone the `Arc` under
//! a short read lock and then search without holding any lock, so a rebuild
//! never disturbs in-flight queries: the new snapshot is built off to the side
//! and swapped in under a brief write lock. Rebuilds are serialized by a
//! separate mutex, so concurrent requests for a changed document build once.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::error::Result;
use crate::index::FlatIndex;

/// An immutable index tied to one version of the document.
#[derive(Debug)]
pub struct IndexSnapshot {
    /// SHA-256 of the document text the index was built from.
    pub content_hash: String,
    /// The searchable index.
    pub index: FlatIndex,
    /// When the build finished.
    pub built_at: DateTime<Utc>,
}

impl IndexSnapshot {
    /// Summarize the snapshot for status reporting.
    pub fn status(&self) -> IndexStatus {
        IndexStatus {
            content_hash: self.content_hash.clone(),
            chunk_count: self.index.len(),
            dimensions: self.index.dimensions(),
            built_at: self.built_at,
        }
    }
}

/// A serializable summary of an [`IndexSnapshot`].
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IndexStatus {
    /// SHA-256 of the indexed document text.
    pub content_hash: String,
    /// Number of indexed chunks.
    pub chunk_count: usize,
    /// Embedding dimension (0 when empty).
    pub dimensions: usize,
    /// When the build finished.
    pub built_at: DateTime<Utc>,
}

/// Holder for the current [`IndexSnapshot`].
#[derive(Debug, Default)]
pub struct IndexCache {
    current: RwLock<Option<Arc<IndexSnapshot>>>,
    rebuild: Mutex<()>,
}

impl IndexCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current snapshot, if one has been built.
    pub async fn current(&self) -> Option<Arc<IndexSnapshot>> {
        self.current.read().await.clone()
    }

    /// Build a new snapshot for `content_hash` even if the cached one is fresh.
    ///
    /// The previous snapshot keeps serving until the build succeeds, and stays
    /// in place if it fails.
    ///
    /// # Errors
    ///
    /// Propagates the error returned by `build`.
    pub async fn rebuild<F, Fut>(&self, content_hash: &str, build: F) -> Result<Arc<IndexSnapshot>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<FlatIndex>>,
    {
        let _guard = self.rebuild.lock().await;
        info!(content_hash, "forced index rebuild");
        self.build_and_swap(content_hash, build).await
    }

    /// Return the snapshot for `content_hash`, building it with `build` if the
    /// cached one is missing or stale.
    ///
    /// A failed build leaves the previous snapshot in place.
    ///
    /// # Errors
    ///
    /// Propagates the error returned by `build`.
    pub async fn get_or_build<F, Fut>(&self, content_hash: &str, build: F) -> Result<Arc<IndexSnapshot>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<FlatIndex>>,
    {
        if let Some(snapshot) = self.fresh(content_hash).await {
            debug!(content_hash, "index cache hit");
            return Ok(snapshot);
        }

        let _guard = self.rebuild.lock().await;

        // Another request may have finished the build while we waited.
        if let Some(snapshot) = self.fresh(content_hash).await {
            debug!(content_hash, "index built by concurrent request");
            return Ok(snapshot);
        }

        info!(content_hash, "index cache miss, building");
        self.build_and_swap(content_hash, build).await
    }

    /// Caller must hold the rebuild mutex.
    async fn build_and_swap<F, Fut>(&self, content_hash: &str, build: F) -> Result<Arc<IndexSnapshot>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<FlatIndex>>,
    {
        let index = build().await?;
        let snapshot = Arc::new(IndexSnapshot {
            content_hash: content_hash.to_string(),
            index,
            built_at: Utc::now(),
        });

        *self.current.write().await = Some(Arc::clone(&snapshot));
        info!(content_hash, chunk_count = snapshot.index.len(), "index snapshot swapped in");

        Ok(snapshot)
    }

    async fn fresh(&self, content_hash: &str) -> Option<Arc<IndexSnapshot>> {
        self.current
            .read()
            .await
            .as_ref()
            .filter(|snapshot| snapshot.content_hash == content_hash)
            .cloned()
    }
}
