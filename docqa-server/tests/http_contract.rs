use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use docqa_server::{AppState, QueryResponse, ServerConfig, app_router, build_service};
use serde_json::{Value, json};
use tempfile::TempDir;

const DOCUMENT: &str = "The lighthouse keeper lit the lamp at dusk.\n\n\
Ships passed safely through the narrow strait.\n\n\
In winter the keeper repaired the lens.\n\n\
The lighthouse was automated in 1987.";

const FAKE_ANSWER: &str = "The keeper lit the lamp.";

#[derive(Default)]
struct FakeOpenAi {
    reject_embeddings: bool,
    chat_requests: Mutex<Vec<Value>>,
}

impl FakeOpenAi {
    fn chat_requests(&self) -> Vec<Value> {
        self.chat_requests.lock().unwrap().clone()
    }
}

fn fake_vector(text: &str) -> Vec<f32> {
    let mut v = vec![1.0f32; 8];
    for (i, byte) in text.bytes().enumerate() {
        v[(byte as usize + i) % 8] += f32::from(byte) / 255.0;
    }
    v
}

async fn fake_embeddings(State(fake): State<Arc<FakeOpenAi>>, Json(body): Json<Value>) -> Response {
    if fake.reject_embeddings {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": {"message": "Incorrect API key provided"}})),
        )
            .into_response();
    }
    let inputs = body["input"].as_array().cloned().unwrap_or_default();
    let data: Vec<Value> = inputs
        .iter()
        .enumerate()
        .rev()
        .map(|(index, text)| {
            json!({"index": index, "embedding": fake_vector(text.as_str().unwrap_or_default())})
        })
        .collect();
    Json(json!({"data": data})).into_response()
}

async fn fake_chat(State(fake): State<Arc<FakeOpenAi>>, Json(body): Json<Value>) -> Response {
    fake.chat_requests.lock().unwrap().push(body);
    Json(json!({"choices": [{"message": {"role": "assistant", "content": FAKE_ANSWER}}]}))
        .into_response()
}

async fn spawn(app: Router) -> (String, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server run");
    });
    (format!("http://{}", addr), handle)
}

struct Harness {
    base: String,
    fake: Arc<FakeOpenAi>,
    client: reqwest::Client,
    handles: Vec<tokio::task::JoinHandle<()>>,
    _dir: TempDir,
}

impl Harness {
    async fn start(document: Option<&str>, fake: FakeOpenAi) -> Self {
        let fake = Arc::new(fake);
        let fake_app = Router::new()
            .route("/v1/embeddings", post(fake_embeddings))
            .route("/v1/chat/completions", post(fake_chat))
            .with_state(Arc::clone(&fake));
        let (fake_base, fake_handle) = spawn(fake_app).await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("my_document.txt");
        if let Some(text) = document {
            std::fs::write(&path, text).unwrap();
        }

        let openai_base = format!("{fake_base}/v1");
        let path = path.to_string_lossy().into_owned();
        let config = ServerConfig::from_lookup(|key| match key {
            "OPENAI_API_KEY" => Some("sk-test".to_string()),
            "OPENAI_BASE_URL" => Some(openai_base.clone()),
            "DOCQA_DOCUMENT_PATH" => Some(path.clone()),
            "DOCQA_CHUNK_SIZE" => Some("60".to_string()),
            "DOCQA_CHUNK_OVERLAP" => Some("10".to_string()),
            "DOCQA_TOP_K" => Some("3".to_string()),
            _ => None,
        })
        .unwrap();

        let qa = build_service(&config).unwrap();
        let (base, handle) = spawn(app_router(AppState::new(qa))).await;

        Self {
            base,
            fake,
            client: reqwest::Client::new(),
            handles: vec![fake_handle, handle],
            _dir: dir,
        }
    }

    async fn post_query(&self, body: Value) -> reqwest::Response {
        self.client
            .post(format!("{}/api/query", self.base))
            .json(&body)
            .send()
            .await
            .expect("query response")
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

#[tokio::test]
async fn post_query_returns_answer_and_sources() {
    let harness = Harness::start(Some(DOCUMENT), FakeOpenAi::default()).await;

    let response = harness.post_query(json!({"query": "Who lit the lamp?", "top_k": 2})).await;
    assert_eq!(response.status(), StatusCode::OK.as_u16());

    let body: QueryResponse = response.json().await.expect("query json");
    assert_eq!(body.answer, FAKE_ANSWER);
    assert!(body.model_called);
    assert_eq!(body.sources.len(), 2);
    assert!(uuid::Uuid::parse_str(&body.request_id).is_ok());
    assert!(body.sources[0].score >= body.sources[1].score);

    let chats = harness.fake.chat_requests();
    assert_eq!(chats.len(), 1);
    assert_eq!(chats[0]["model"], "gpt-4o-mini");
    assert_eq!(chats[0]["temperature"].as_f64(), Some(0.0));
    assert_eq!(chats[0]["messages"][0]["role"], "user");
    let prompt = chats[0]["messages"][0]["content"].as_str().unwrap();
    assert!(prompt.ends_with("Question:\nWho lit the lamp?\n"));
    for source in &body.sources {
        assert!(prompt.contains(&source.text));
    }
}

#[tokio::test]
async fn get_query_uses_query_string() {
    let harness = Harness::start(Some(DOCUMENT), FakeOpenAi::default()).await;

    let response = harness
        .client
        .get(format!("{}/api/query?q=lens&top_k=1", harness.base))
        .send()
        .await
        .expect("query response");
    assert_eq!(response.status(), StatusCode::OK.as_u16());

    let body: QueryResponse = response.json().await.expect("query json");
    assert_eq!(body.sources.len(), 1);
}

#[tokio::test]
async fn empty_query_is_bad_request() {
    let harness = Harness::start(Some(DOCUMENT), FakeOpenAi::default()).await;

    let response = harness.post_query(json!({"query": "  "})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST.as_u16());

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "invalid_query");
    assert!(harness.fake.chat_requests().is_empty());
}

#[tokio::test]
async fn missing_query_field_is_bad_request_json() {
    let harness = Harness::start(Some(DOCUMENT), FakeOpenAi::default()).await;

    let response = harness.post_query(json!({})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST.as_u16());
    let body: Value = response.json().await.expect("error body is json");
    assert_eq!(body["error"], "invalid_query");
    assert!(body["message"].as_str().unwrap().contains("query"));

    let response = harness
        .client
        .post(format!("{}/api/query", harness.base))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .expect("query response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST.as_u16());
    let body: Value = response.json().await.expect("error body is json");
    assert_eq!(body["error"], "invalid_query");

    let response = harness
        .client
        .get(format!("{}/api/query", harness.base))
        .send()
        .await
        .expect("query response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST.as_u16());
    let body: Value = response.json().await.expect("error body is json");
    assert_eq!(body["error"], "invalid_query");

    assert!(harness.fake.chat_requests().is_empty());
}

#[tokio::test]
async fn embedding_rejection_is_bad_gateway_without_completion() {
    let fake = FakeOpenAi { reject_embeddings: true, ..FakeOpenAi::default() };
    let harness = Harness::start(Some(DOCUMENT), fake).await;

    let response = harness.post_query(json!({"query": "Who lit the lamp?"})).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY.as_u16());

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "embedding_provider_error");
    assert!(body["message"].as_str().unwrap().contains("Incorrect API key provided"));
    assert!(harness.fake.chat_requests().is_empty());
}

#[tokio::test]
async fn missing_document_is_server_error() {
    let harness = Harness::start(None, FakeOpenAi::default()).await;

    let response = harness.post_query(json!({"query": "anything"})).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR.as_u16());

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "document_not_found");
}

#[tokio::test]
async fn health_reports_service() {
    let harness = Harness::start(Some(DOCUMENT), FakeOpenAi::default()).await;

    let body: Value = harness
        .client
        .get(format!("{}/health", harness.base))
        .send()
        .await
        .expect("health response")
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({"status": "ok", "service": "docqa-server"}));
}

#[tokio::test]
async fn index_status_and_refresh() {
    let harness = Harness::start(Some(DOCUMENT), FakeOpenAi::default()).await;

    let before: Value = harness
        .client
        .get(format!("{}/api/index", harness.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(before, json!({"built": false}));

    let refreshed = harness
        .client
        .post(format!("{}/api/index/refresh", harness.base))
        .send()
        .await
        .unwrap();
    assert_eq!(refreshed.status(), StatusCode::OK.as_u16());
    let refreshed: Value = refreshed.json().await.unwrap();
    assert_eq!(refreshed["built"], true);
    assert_eq!(refreshed["dimensions"], 8);
    assert!(refreshed["chunk_count"].as_u64().unwrap() >= 4);

    let after: Value = harness
        .client
        .get(format!("{}/api/index", harness.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(after["content_hash"], refreshed["content_hash"]);
}
