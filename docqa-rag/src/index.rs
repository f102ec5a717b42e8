//! Flat in-memory vector index with exact nearest-neighbor search.
//!
//! [`FlatIndex`] pairs every [`Chunk`] with exactly one embedding and scores a
//! query against all of them. Once built it is immutable, which lets the
//! [`IndexCache`](crate::cache::IndexCache) share it across requests behind an
//! `Arc` without further locking.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::document::{Chunk, SearchResult};
use crate::error::{RagError, Result};

/// How query and chunk vectors are compared. Scores are always "higher is closer".
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Cosine similarity; 0.0 when either vector has zero magnitude.
    #[default]
    Cosine,
    /// Raw inner product.
    DotProduct,
    /// Negated Euclidean (L2) distance.
    Euclidean,
}

impl DistanceMetric {
    /// Score `b` against `a`.
    pub fn score(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Cosine => cosine_similarity(a, b),
            Self::DotProduct => dot(a, b),
            Self::Euclidean => {
                -a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt()
            }
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot(a, b) / (norm_a * norm_b)
}

/// An immutable collection of chunks and their embeddings.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    chunks: Vec<Chunk>,
    embeddings: Vec<Vec<f32>>,
    dimensions: usize,
    metric: DistanceMetric,
}

impl FlatIndex {
    /// Pair chunks with embeddings.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingProviderError`] if the counts differ or the
    /// embeddings do not all share one non-zero dimension.
    pub fn new(
        provider: &str,
        chunks: Vec<Chunk>,
        embeddings: Vec<Vec<f32>>,
        metric: DistanceMetric,
    ) -> Result<Self> {
        if chunks.len() != embeddings.len() {
            return Err(RagError::EmbeddingProviderError {
                provider: provider.to_string(),
                message: format!(
                    "expected {} embeddings, received {}",
                    chunks.len(),
                    embeddings.len()
                ),
            });
        }

        let dimensions = embeddings.first().map_or(0, Vec::len);
        if !embeddings.is_empty() && dimensions == 0 {
            return Err(RagError::EmbeddingProviderError {
                provider: provider.to_string(),
                message: "received an empty embedding vector".to_string(),
            });
        }
        if let Some(position) = embeddings.iter().position(|e| e.len() != dimensions) {
            return Err(RagError::EmbeddingProviderError {
                provider: provider.to_string(),
                message: format!(
                    "embedding {position} has dimension {}, expected {dimensions}",
                    embeddings[position].len()
                ),
            });
        }

        Ok(Self { chunks, embeddings, dimensions, metric })
    }

    /// An index with no chunks.
    pub fn empty(metric: DistanceMetric) -> Self {
        Self { chunks: Vec::new(), embeddings: Vec::new(), dimensions: 0, metric }
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Returns `true` if the index holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Embedding dimension, or 0 for an empty index.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// The similarity measure in use.
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// The indexed chunks in document order.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Return the `top_k` chunks most similar to `query`.
    ///
    /// Results are ordered by descending score, ties broken by chunk order.
    /// Fewer than `top_k` results are returned when the index is smaller.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::RetrievalEmptyIndex`] if the index is empty and
    /// [`RagError::EmbeddingProviderError`] on a dimension mismatch.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        if self.is_empty() {
            return Err(RagError::RetrievalEmptyIndex);
        }
        if query.len() != self.dimensions {
            return Err(RagError::EmbeddingProviderError {
                provider: "query".to_string(),
                message: format!(
                    "query embedding has dimension {}, index expects {}",
                    query.len(),
                    self.dimensions
                ),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .embeddings
            .iter()
            .enumerate()
            .map(|(position, embedding)| (position, self.metric.score(query, embedding)))
            .collect();

        // NaN scores sink to the bottom.
        scored.sort_by(|a, b| match b.1.partial_cmp(&a.1) {
            Some(Ordering::Equal) | None => {
                a.1.is_nan().cmp(&b.1.is_nan()).then_with(|| a.0.cmp(&b.0))
            }
            Some(ordering) => ordering,
        });
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(position, score)| SearchResult { chunk: self.chunks[position].clone(), score })
            .collect())
    }
}
