//! Prompt rendering and answer generation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::completion::CompletionProvider;
use crate::document::SearchResult;
use crate::error::{RagError, Result};

/// The default prompt. `{context}` and `{question}` are substituted.
pub const DEFAULT_TEMPLATE: &str = "Answer the question based only on the context.

Context:
{context}

Question:
{question}
";

/// Returned by [`EmptyContextPolicy::Canned`] when there is nothing to answer from.
pub const NO_INFORMATION_ANSWER: &str =
    "I don't have any information in the document to answer that question.";

/// Behavior when retrieval produced no context (an empty document, or every
/// result filtered out by the similarity threshold).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmptyContextPolicy {
    /// Answer with [`NO_INFORMATION_ANSWER`] without calling the model.
    #[default]
    Canned,
    /// Render the template with an empty context and call the model anyway.
    CallModel,
    /// Fail with [`RagError::RetrievalEmptyIndex`].
    Reject,
}

/// A two-slot text template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self { template: DEFAULT_TEMPLATE.to_string() }
    }
}

impl PromptTemplate {
    /// Create a template.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] unless both `{context}` and
    /// `{question}` placeholders are present.
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        for placeholder in ["{context}", "{question}"] {
            if !template.contains(placeholder) {
                return Err(RagError::ConfigError(format!(
                    "prompt template is missing the {placeholder} placeholder"
                )));
            }
        }
        Ok(Self { template })
    }

    /// Substitute the retrieved chunks (joined by blank lines, in ranking order)
    /// and the question.
    pub fn render(&self, question: &str, context: &[SearchResult]) -> String {
        let context =
            context.iter().map(|r| r.chunk.text.as_str()).collect::<Vec<_>>().join("\n\n");
        // Single pass so that braces inside the context are never re-expanded.
        let mut rendered = String::with_capacity(self.template.len() + context.len() + question.len());
        let mut rest = self.template.as_str();
        while let Some(open) = rest.find('{') {
            rendered.push_str(&rest[..open]);
            let tail = &rest[open..];
            if let Some(after) = tail.strip_prefix("{context}") {
                rendered.push_str(&context);
                rest = after;
            } else if let Some(after) = tail.strip_prefix("{question}") {
                rendered.push_str(question);
                rest = after;
            } else {
                rendered.push('{');
                rest = &tail[1..];
            }
        }
        rendered.push_str(rest);
        rendered
    }
}

/// The result of answering a question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    /// The generated text, verbatim.
    pub text: String,
    /// The chunks the answer was generated from, in ranking order.
    pub sources: Vec<SearchResult>,
    /// Whether the completion model was called.
    pub model_called: bool,
}

/// Renders prompts and sends them to a [`CompletionProvider`].
pub struct Responder {
    completion: Arc<dyn CompletionProvider>,
    template: PromptTemplate,
    empty_context_policy: EmptyContextPolicy,
}

impl Responder {
    /// Create a responder using [`DEFAULT_TEMPLATE`].
    pub fn new(completion: Arc<dyn CompletionProvider>, policy: EmptyContextPolicy) -> Self {
        Self { completion, template: PromptTemplate::default(), empty_context_policy: policy }
    }

    /// Replace the prompt template.
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    /// The configured empty-context policy.
    pub fn empty_context_policy(&self) -> EmptyContextPolicy {
        self.empty_context_policy
    }

    /// The completion provider.
    pub fn completion_provider(&self) -> &Arc<dyn CompletionProvider> {
        &self.completion
    }

    /// Answer `question` from `context`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::CompletionProviderError`] if the model call fails,
    /// or [`RagError::RetrievalEmptyIndex`] for an empty context under
    /// [`EmptyContextPolicy::Reject`].
    pub async fn respond(&self, question: &str, context: Vec<SearchResult>) -> Result<Answer> {
        if context.is_empty() {
            match self.empty_context_policy {
                EmptyContextPolicy::Canned => {
                    info!("no context retrieved, returning canned answer");
                    return Ok(Answer {
                        text: NO_INFORMATION_ANSWER.to_string(),
                        sources: Vec::new(),
                        model_called: false,
                    });
                }
                EmptyContextPolicy::Reject => {
                    warn!("no context retrieved, rejecting question");
                    return Err(RagError::RetrievalEmptyIndex);
                }
                EmptyContextPolicy::CallModel => {
                    debug!("no context retrieved, calling model with empty context");
                }
            }
        }

        let prompt = self.template.render(question, &context);
        debug!(
            model = self.completion.model(),
            prompt_len = prompt.len(),
            context_chunks = context.len(),
            "requesting completion"
        );

        let text = self.completion.complete(&prompt).await?;
        info!(model = self.completion.model(), answer_len = text.len(), "completion received");

        Ok(Answer { text, sources: context, model_called: true })
    }
}
