//! OpenAI embedding and completion providers.
//!
//! Both call the REST API directly with `reqwest` and work against any
//! OpenAI-compatible endpoint via [`with_base_url`](OpenAIEmbeddingProvider::with_base_url).
//!
//! This module is only available when the `openai` feature is enabled.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::completion::CompletionProvider;
use crate::config::{DEFAULT_COMPLETION_MODEL, DEFAULT_EMBEDDING_MODEL};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

/// The default OpenAI API base URL.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// The default dimensionality for `text-embedding-3-small`.
const DEFAULT_DIMENSIONS: usize = 1536;

/// The default HTTP timeout for a single request.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const PROVIDER: &str = "OpenAI";

/// Shared HTTP plumbing for both providers.
#[derive(Clone)]
struct OpenAIHttp {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for OpenAIHttp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIHttp").field("base_url", &self.base_url).finish_non_exhaustive()
    }
}

/// Which side of the API a failure belongs to.
#[derive(Debug, Clone, Copy)]
enum Endpoint {
    Embeddings,
    ChatCompletions,
}

impl Endpoint {
    fn path(self) -> &'static str {
        match self {
            Self::Embeddings => "embeddings",
            Self::ChatCompletions => "chat/completions",
        }
    }

    fn error(self, message: String) -> RagError {
        match self {
            Self::Embeddings => {
                RagError::EmbeddingProviderError { provider: PROVIDER.into(), message }
            }
            Self::ChatCompletions => {
                RagError::CompletionProviderError { provider: PROVIDER.into(), message }
            }
        }
    }
}

impl OpenAIHttp {
    fn new(api_key: String, endpoint: Endpoint) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(endpoint.error("API key must not be empty".into()));
        }
        let client = build_client(DEFAULT_TIMEOUT, endpoint)?;
        Ok(Self { client, api_key, base_url: OPENAI_BASE_URL.into() })
    }

    fn url(&self, endpoint: Endpoint) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), endpoint.path())
    }

    async fn post<B, R>(&self, endpoint: Endpoint, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.url(endpoint))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, endpoint = endpoint.path(), error = %e, "request failed");
                endpoint.error(format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);

            error!(provider = PROVIDER, endpoint = endpoint.path(), %status, "API error");
            return Err(endpoint.error(format!("API returned {status}: {detail}")));
        }

        response.json().await.map_err(|e| {
            error!(provider = PROVIDER, endpoint = endpoint.path(), error = %e, "failed to parse response");
            endpoint.error(format!("failed to parse response: {e}"))
        })
    }
}

fn build_client(timeout: Duration, endpoint: Endpoint) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| endpoint.error(format!("failed to build HTTP client: {e}")))
}

fn api_key_from_env(endpoint: Endpoint) -> Result<String> {
    std::env::var("OPENAI_API_KEY")
        .map_err(|_| endpoint.error("OPENAI_API_KEY environment variable not set".into()))
}

// ── OpenAI API request/response types ──────────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

// ── Embeddings ─────────────────────────────────────────────────────

/// An [`EmbeddingProvider`] backed by the OpenAI embeddings API.
///
/// # Configuration
///
/// - `model` – defaults to `text-embedding-3-small`.
/// - `dimensions` – optional Matryoshka dimension override.
/// - `api_key` – from the constructor or the `OPENAI_API_KEY` environment variable.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::openai::OpenAIEmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::new("sk-...")?;
/// let embedding = provider.embed("hello world").await?;
/// ```
#[derive(Debug, Clone)]
pub struct OpenAIEmbeddingProvider {
    http: OpenAIHttp,
    model: String,
    dimensions: usize,
    /// If set, passed to the API for Matryoshka dimension truncation.
    request_dimensions: Option<usize>,
}

impl OpenAIEmbeddingProvider {
    /// Create a new provider with the given API key.
    ///
    /// Uses the default model (`text-embedding-3-small`) and dimensions (1536).
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http: OpenAIHttp::new(api_key.into(), Endpoint::Embeddings)?,
            model: DEFAULT_EMBEDDING_MODEL.into(),
            dimensions: DEFAULT_DIMENSIONS,
            request_dimensions: None,
        })
    }

    /// Create a new provider using the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        Self::new(api_key_from_env(Endpoint::Embeddings)?)
    }

    /// Set the model name (e.g. `text-embedding-3-large`).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the output dimensions (Matryoshka support).
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self.request_dimensions = Some(dims);
        self
    }

    /// Send requests to an OpenAI-compatible API instead of api.openai.com.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.http.base_url = base_url.into();
        self
    }

    /// Set the HTTP timeout for each request.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.http.client = build_client(timeout, Endpoint::Embeddings)?;
        Ok(self)
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = PROVIDER, text_len = text.len(), "embedding single text");

        let results = self.embed_batch(&[text]).await?;
        results.into_iter().next().ok_or_else(|| RagError::EmbeddingProviderError {
            provider: PROVIDER.into(),
            message: "API returned empty response".into(),
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(provider = PROVIDER, batch_size = texts.len(), model = %self.model, "embedding batch");

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: self.request_dimensions,
        };
        let response: EmbeddingResponse = self.http.post(Endpoint::Embeddings, &request).await?;

        if response.data.len() != texts.len() {
            return Err(RagError::EmbeddingProviderError {
                provider: PROVIDER.into(),
                message: format!(
                    "expected {} embeddings, received {}",
                    texts.len(),
                    response.data.len()
                ),
            });
        }

        let mut data = response.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

// ── Chat completions ───────────────────────────────────────────────

/// A [`CompletionProvider`] backed by the OpenAI chat completions API.
///
/// The prompt is sent as a single user message. Defaults to `gpt-4o-mini`
/// at temperature 0.
#[derive(Debug, Clone)]
pub struct OpenAICompletionProvider {
    http: OpenAIHttp,
    model: String,
    temperature: f32,
}

impl OpenAICompletionProvider {
    /// Create a new provider with the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http: OpenAIHttp::new(api_key.into(), Endpoint::ChatCompletions)?,
            model: DEFAULT_COMPLETION_MODEL.into(),
            temperature: 0.0,
        })
    }

    /// Create a new provider using the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        Self::new(api_key_from_env(Endpoint::ChatCompletions)?)
    }

    /// Set the model identifier.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Send requests to an OpenAI-compatible API instead of api.openai.com.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.http.base_url = base_url.into();
        self
    }

    /// Set the HTTP timeout for each request.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.http.client = build_client(timeout, Endpoint::ChatCompletions)?;
        Ok(self)
    }
}

#[async_trait]
impl CompletionProvider for OpenAICompletionProvider {
    async fn complete(&self, prompt: &str) -> Result<String> {
        debug!(provider = PROVIDER, model = %self.model, prompt_len = prompt.len(), "chat completion");

        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage { role: "user", content: prompt }],
            temperature: self.temperature,
        };
        let response: ChatResponse = self.http.post(Endpoint::ChatCompletions, &request).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| RagError::CompletionProviderError {
                provider: PROVIDER.into(),
                message: "API returned no message content".into(),
            })
    }

    fn model(&self) -> &str {
        &self.model
    }
}
