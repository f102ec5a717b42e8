//! Data types for the source document, its chunks, and search results.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{RagError, Result};

/// The source document: raw text plus a content hash used as the index cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Where the text was read from.
    pub path: PathBuf,
    /// The full UTF-8 text of the document.
    pub text: String,
    /// Lowercase hex SHA-256 of `text`.
    pub content_hash: String,
}

impl Document {
    /// Create a document from text that is already in memory.
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        let text = text.into();
        let content_hash = content_hash(&text);
        Self { path: path.into(), text, content_hash }
    }

    /// Read a UTF-8 document from disk.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DocumentNotFound`] if the file is missing, unreadable,
    /// or not valid UTF-8.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| RagError::DocumentNotFound { path: path.to_path_buf(), source })?;
        debug!(path = %path.display(), bytes = text.len(), "loaded document");
        Ok(Self::new(path, text))
    }

    /// Returns `true` if the document has no text.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A contiguous segment of a [`Document`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// Position of the chunk in document order, starting at zero.
    pub index: usize,
    /// The text of the chunk, equal to `document.text[start..end]`.
    pub text: String,
    /// Byte offset of the first character in the document.
    pub start: usize,
    /// Byte offset one past the last character in the document.
    pub end: usize,
}

/// A retrieved [`Chunk`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The similarity score (higher is more relevant).
    pub score: f32,
}
