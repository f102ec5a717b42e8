//! Completion provider trait for generating answers from a rendered prompt.

use async_trait::async_trait;

use crate::error::Result;

/// A text-generation backend.
///
/// The model identifier and sampling temperature are fixed when the provider
/// is constructed; [`complete`](CompletionProvider::complete) sends one prompt
/// and returns the generated text verbatim.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Generate a completion for the prompt.
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// The model identifier requests are sent to.
    fn model(&self) -> &str;
}
