//! `docqa-server` answers questions about a single local document over HTTP.
//! It wires the OpenAI providers into a `docqa_rag::DocumentQa` and serves it with axum.

pub mod config;
pub mod server;

pub use config::ServerConfig;
pub use server::{ApiError, AppState, QueryRequest, QueryResponse, app_router, build_service, run_server};
