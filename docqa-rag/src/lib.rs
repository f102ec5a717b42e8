//! Retrieval-augmented question answering over a single local document.
//!
//! The crate splits the document into overlapping chunks, embeds and indexes
//! them once per document version, retrieves the chunks closest to a question,
//! and asks a completion model to answer from them.
//!
//! - [`chunking`]: [`RecursiveChunker`] and [`FixedSizeChunker`]
//! - [`embedding`] / [`completion`]: provider traits at the external boundary
//! - [`index`]: exact flat nearest-neighbor search
//! - [`cache`]: the long-lived index snapshot keyed by content hash
//! - [`pipeline`]: chunk → embed → index, and embed → search
//! - [`responder`]: prompt rendering and the completion call
//! - [`service`]: [`DocumentQa`], the end-to-end orchestration
//! - `openai`: OpenAI-compatible providers (feature `openai`)

pub mod cache;
pub mod chunking;
pub mod completion;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod index;
#[cfg(feature = "openai")]
pub mod openai;
pub mod pipeline;
pub mod responder;
pub mod service;

pub use cache::{IndexCache, IndexSnapshot, IndexStatus};
pub use chunking::{Chunker, FixedSizeChunker, RecursiveChunker};
pub use completion::CompletionProvider;
pub use config::{ChunkerKind, RagConfig, RagConfigBuilder};
pub use document::{Chunk, Document, SearchResult};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use index::{DistanceMetric, FlatIndex};
#[cfg(feature = "openai")]
pub use openai::{OpenAICompletionProvider, OpenAIEmbeddingProvider};
pub use pipeline::{RagPipeline, RagPipelineBuilder};
pub use responder::{Answer, EmptyContextPolicy, PromptTemplate, Responder};
pub use service::DocumentQa;
