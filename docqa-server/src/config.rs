//! Server configuration from environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, bail};
use docqa_rag::RagConfig;
use docqa_rag::openai::OPENAI_BASE_URL;

/// Everything the binary needs to start.
#[derive(Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub rag: RagConfig,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("openai_base_url", &self.openai_base_url)
            .field("rag", &self.rag)
            .finish_non_exhaustive()
    }
}

impl ServerConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`, which returns the value of a variable if set.
    ///
    /// Unset variables fall back to defaults; set but unparseable ones are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let Some(openai_api_key) = var("OPENAI_API_KEY") else {
            bail!("OPENAI_API_KEY must be set");
        };

        let defaults = RagConfig::default();
        let mut builder = RagConfig::builder()
            .document_path(var("DOCQA_DOCUMENT_PATH").map_or(defaults.document_path, PathBuf::from))
            .chunk_size(parse_or(&var, "DOCQA_CHUNK_SIZE", defaults.chunk_size)?)
            .chunk_overlap(parse_or(&var, "DOCQA_CHUNK_OVERLAP", defaults.chunk_overlap)?)
            .top_k(parse_or(&var, "DOCQA_TOP_K", defaults.top_k)?)
            .embedding_model(var("DOCQA_EMBEDDING_MODEL").unwrap_or(defaults.embedding_model))
            .completion_model(var("DOCQA_COMPLETION_MODEL").unwrap_or(defaults.completion_model))
            .temperature(parse_or(&var, "DOCQA_TEMPERATURE", defaults.temperature)?)
            .request_timeout(Duration::from_secs(parse_or(
                &var,
                "DOCQA_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?));
        if let Some(threshold) = var("DOCQA_SIMILARITY_THRESHOLD") {
            builder = builder.similarity_threshold(
                threshold.parse().with_context(|| "invalid DOCQA_SIMILARITY_THRESHOLD")?,
            );
        }
        let rag = builder.build().context("invalid pipeline configuration")?;

        Ok(Self {
            host: var("DOCQA_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_or(&var, "DOCQA_PORT", 8000)?,
            openai_api_key,
            openai_base_url: var("OPENAI_BASE_URL").unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
            rag,
        })
    }
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(value) => value.parse().with_context(|| format!("invalid {key}: {value:?}")),
        None => Ok(default),
    }
}
