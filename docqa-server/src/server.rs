use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use docqa_rag::{
    Answer, DocumentQa, IndexStatus, OpenAICompletionProvider, OpenAIEmbeddingProvider, RagError,
    RagPipeline, Responder,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub qa: Arc<DocumentQa>,
}

impl AppState {
    pub fn new(qa: DocumentQa) -> Self {
        Self { qa: Arc::new(qa) }
    }
}

/// Body of `POST /api/query`.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub top_k: Option<usize>,
}

/// Query string of `GET /api/query`.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryParams {
    pub q: String,
    #[serde(default)]
    pub top_k: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourcePayload {
    pub index: usize,
    pub text: String,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResponse {
    pub request_id: String,
    pub answer: String,
    pub sources: Vec<SourcePayload>,
    pub model_called: bool,
}

impl QueryResponse {
    fn new(request_id: Uuid, answer: Answer) -> Self {
        Self {
            request_id: request_id.to_string(),
            answer: answer.text,
            sources: answer
                .sources
                .into_iter()
                .map(|result| SourcePayload {
                    index: result.chunk.index,
                    text: result.chunk.text,
                    score: result.score,
                })
                .collect(),
            model_called: answer.model_called,
        }
    }
}

#[derive(Debug, Serialize)]
struct IndexStatusResponse {
    built: bool,
    #[serde(flatten)]
    status: Option<IndexStatus>,
}

/// A [`RagError`] rendered as `{"error": kind, "message": ...}`.
#[derive(Debug)]
pub struct ApiError(pub RagError);

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            RagError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            RagError::RetrievalEmptyIndex => StatusCode::SERVICE_UNAVAILABLE,
            RagError::EmbeddingProviderError { .. } | RagError::CompletionProviderError { .. } => {
                StatusCode::BAD_GATEWAY
            }
            RagError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            RagError::DocumentNotFound { .. } | RagError::ConfigError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(kind = self.0.kind(), error = %self.0, "request failed");
        } else {
            warn!(kind = self.0.kind(), error = %self.0, "request rejected");
        }
        (status, Json(json!({"error": self.0.kind(), "message": self.0.to_string()})))
            .into_response()
    }
}

pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/query", get(query_get).post(query_post))
        .route("/api/index", get(index_status))
        .route("/api/index/refresh", post(refresh_index))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Wire the OpenAI providers and the pipeline from `config`.
pub fn build_service(config: &ServerConfig) -> anyhow::Result<DocumentQa> {
    let rag = config.rag.clone();

    let embedder = OpenAIEmbeddingProvider::new(config.openai_api_key.as_str())?
        .with_model(rag.embedding_model.as_str())
        .with_base_url(config.openai_base_url.as_str())
        .with_timeout(rag.request_timeout)?;
    let completion = OpenAICompletionProvider::new(config.openai_api_key.as_str())?
        .with_model(rag.completion_model.as_str())
        .with_temperature(rag.temperature)
        .with_base_url(config.openai_base_url.as_str())
        .with_timeout(rag.request_timeout)?;

    let policy = rag.empty_context_policy;
    let pipeline = RagPipeline::builder()
        .config(rag)
        .embedding_provider(Arc::new(embedder))
        .build()
        .context("failed to build pipeline")?;
    Ok(DocumentQa::new(pipeline, Responder::new(Arc::new(completion), policy)))
}

pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let qa = build_service(&config)?;

    match qa.prime().await {
        Ok(status) => info!(
            chunks = status.chunk_count,
            content_hash = %status.content_hash,
            "index ready"
        ),
        Err(err) => warn!(error = %err, "initial index build failed; retrying on first query"),
    }

    let app = app_router(AppState::new(qa));
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| "invalid host/port for docqa-server")?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("docqa-server listening on http://{}", addr);
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    info!("docqa-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

async fn health() -> impl IntoResponse {
    Json(json!({"status":"ok","service":"docqa-server"}))
}

async fn query_post(
    State(state): State<AppState>,
    request: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
    let Json(request) =
        request.map_err(|rejection| RagError::InvalidQuery(rejection.body_text()))?;
    answer(&state, request.query, request.top_k).await
}

async fn query_get(
    State(state): State<AppState>,
    params: Result<Query<QueryParams>, QueryRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
    let Query(params) = params.map_err(|rejection| RagError::InvalidQuery(rejection.body_text()))?;
    answer(&state, params.q, params.top_k).await
}

async fn answer(
    state: &AppState,
    query: String,
    top_k: Option<usize>,
) -> Result<Json<QueryResponse>, ApiError> {
    let request_id = Uuid::new_v4();
    let answer = state
        .qa
        .answer(&query, top_k)
        .instrument(info_span!("query", %request_id))
        .await?;
    Ok(Json(QueryResponse::new(request_id, answer)))
}

async fn index_status(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.qa.status().await;
    Json(IndexStatusResponse { built: status.is_some(), status })
}

async fn refresh_index(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let status = state.qa.refresh().await?;
    info!(chunks = status.chunk_count, content_hash = %status.content_hash, "index refreshed");
    Ok(Json(IndexStatusResponse { built: true, status: Some(status) }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_status_codes() {
        let cases = [
            (RagError::InvalidQuery("empty".into()), StatusCode::BAD_REQUEST),
            (RagError::RetrievalEmptyIndex, StatusCode::SERVICE_UNAVAILABLE),
            (
                RagError::EmbeddingProviderError { provider: "OpenAI".into(), message: "401".into() },
                StatusCode::BAD_GATEWAY,
            ),
            (
                RagError::CompletionProviderError { provider: "OpenAI".into(), message: "429".into() },
                StatusCode::BAD_GATEWAY,
            ),
            (
                RagError::Timeout { operation: "completion", timeout: std::time::Duration::from_secs(1) },
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (RagError::ConfigError("bad".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError(err).status(), expected);
        }
    }

    #[test]
    fn unbuilt_status_serializes_as_flag_only() {
        let body = serde_json::to_value(IndexStatusResponse { built: false, status: None }).unwrap();
        assert_eq!(body, json!({"built": false}));
    }
}
