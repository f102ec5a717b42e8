//! Deterministic providers shared by the integration tests.

#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use docqa_rag::{CompletionProvider, EmbeddingProvider, RagError};

/// Hash-based embeddings: identical text always maps to the identical unit vector.
///
/// Batch (indexing) and single (query) calls can be made to fail independently.
pub struct MockEmbedder {
    dimensions: usize,
    batch_calls: AtomicUsize,
    query_calls: AtomicUsize,
    fail_batches: AtomicBool,
    fail_queries: AtomicBool,
}

impl MockEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            batch_calls: AtomicUsize::new(0),
            query_calls: AtomicUsize::new(0),
            fail_batches: AtomicBool::new(false),
            fail_queries: AtomicBool::new(false),
        }
    }

    pub fn fail_batches(&self, fail: bool) {
        self.fail_batches.store(fail, Ordering::SeqCst);
    }

    pub fn fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    /// Number of `embed_batch` calls, i.e. index builds for single-batch documents.
    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    /// Number of single-text `embed` calls, i.e. query embeddings.
    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let hash = text.bytes().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
        let mut v = vec![0.0f32; self.dimensions];
        for (i, x) in v.iter_mut().enumerate() {
            let mixed = (hash ^ (i as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
                .wrapping_mul(0xBF58_476D_1CE4_E5B9);
            *x = ((mixed >> 40) % 2001) as f32 / 1000.0 - 1.0;
        }
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    async fn embed(&self, text: &str) -> docqa_rag::Result<Vec<f32>> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(rate_limited("mock"));
        }
        Ok(self.vector(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> docqa_rag::Result<Vec<Vec<f32>>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_batches.load(Ordering::SeqCst) {
            return Err(rate_limited("mock"));
        }
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "mock"
    }
}

fn rate_limited(provider: &str) -> RagError {
    RagError::EmbeddingProviderError {
        provider: provider.into(),
        message: "API returned 429 Too Many Requests: rate limit reached".into(),
    }
}

/// Always fails as if the API rejected the credential.
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _text: &str) -> docqa_rag::Result<Vec<f32>> {
        Err(RagError::EmbeddingProviderError {
            provider: "failing".into(),
            message: "API returned 401 Unauthorized: invalid api key".into(),
        })
    }

    fn dimensions(&self) -> usize {
        8
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Never answers. With `hang_batches` false, indexing succeeds and only query
/// embedding hangs.
pub struct HangingEmbedder {
    pub hang_batches: bool,
}

#[async_trait]
impl EmbeddingProvider for HangingEmbedder {
    async fn embed(&self, _text: &str) -> docqa_rag::Result<Vec<f32>> {
        std::future::pending().await
    }

    async fn embed_batch(&self, texts: &[&str]) -> docqa_rag::Result<Vec<Vec<f32>>> {
        if self.hang_batches {
            std::future::pending::<()>().await;
        }
        Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
    }

    fn dimensions(&self) -> usize {
        2
    }

    fn name(&self) -> &str {
        "hanging"
    }
}

/// Records every prompt and answers with a fixed string.
#[derive(Default)]
pub struct RecordingCompletion {
    prompts: Mutex<Vec<String>>,
}

impl RecordingCompletion {
    pub const ANSWER: &'static str = "It is in the document.";

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for RecordingCompletion {
    async fn complete(&self, prompt: &str) -> docqa_rag::Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(Self::ANSWER.to_string())
    }

    fn model(&self) -> &str {
        "recording"
    }
}

/// Never answers.
pub struct HangingCompletion;

#[async_trait]
impl CompletionProvider for HangingCompletion {
    async fn complete(&self, _prompt: &str) -> docqa_rag::Result<String> {
        std::future::pending().await
    }

    fn model(&self) -> &str {
        "hanging"
    }
}
