#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::post,
    Router,
};
use catnotes_fireflies::error::RenderError;
use catnotes_fireflies::models::{GeneratedDocument, RenderRequest};
use catnotes_fireflies::poll::PollConfig;
use catnotes_fireflies::{DocumentRenderer, FirefliesConfig, PdfRenderer};
use serde_json::{json, Value as JsonValue};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::sleep;

pub const TEST_API_KEY: &str = "test-api-key";

/// Which GraphQL operation a request carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    AddToLiveMeeting,
    Transcripts,
    Transcript,
}

impl Operation {
    fn classify(query: &str) -> Self {
        if query.contains("addToLiveMeeting") {
            Operation::AddToLiveMeeting
        } else if query.contains("transcripts(") {
            Operation::Transcripts
        } else {
            Operation::Transcript
        }
    }

    fn fallback(self) -> JsonValue {
        match self {
            Operation::AddToLiveMeeting => {
                json!({"data": {"addToLiveMeeting": {"success": true}}})
            }
            Operation::Transcripts => json!({"data": {"transcripts": []}}),
            Operation::Transcript => json!({"data": {"transcript": null}}),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub operation: Operation,
    pub authorization: Option<String>,
    pub variables: JsonValue,
}

type Script = HashMap<Operation, VecDeque<(StatusCode, JsonValue)>>;

#[derive(Clone)]
struct MockState {
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    script: Arc<Mutex<Script>>,
}

/// A stand-in for the Fireflies GraphQL endpoint. Scripted responses are
/// served per operation in order; once a script runs dry the operation
/// answers with an empty-but-valid payload.
pub struct MockFireflies {
    pub url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    script: Arc<Mutex<Script>>,
    _server_handle: tokio::task::JoinHandle<()>,
}

impl MockFireflies {
    pub async fn start() -> anyhow::Result<Self> {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let script = Arc::new(Mutex::new(Script::new()));

        let state = MockState {
            requests: requests.clone(),
            script: script.clone(),
        };

        let app = Router::new()
            .route("/graphql", post(handle_graphql))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();

        let server_handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        sleep(Duration::from_millis(50)).await;

        Ok(Self {
            url: format!("http://127.0.0.1:{}/graphql", port),
            requests,
            script,
            _server_handle: server_handle,
        })
    }

    pub fn respond(&self, operation: Operation, body: JsonValue) {
        self.respond_with_status(operation, StatusCode::OK, body);
    }

    pub fn respond_with_status(&self, operation: Operation, status: StatusCode, body: JsonValue) {
        self.script
            .lock()
            .unwrap()
            .entry(operation)
            .or_default()
            .push_back((status, body));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, operation: Operation) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.operation == operation)
            .count()
    }

    /// Client config pointed at this server with a zero-length poll interval.
    pub fn config(&self, output_dir: &Path, max_attempts: u32) -> FirefliesConfig {
        let mut config = FirefliesConfig::from_lookup(|key| match key {
            "FIREFLIES_API_KEY" => Some(TEST_API_KEY.to_string()),
            "REQUEST_TIMEOUT_SECS" => Some("5".to_string()),
            _ => None,
        })
        .unwrap();
        config.api_url = self.url.clone();
        config.output_dir = output_dir.to_path_buf();
        config.poll = PollConfig {
            interval: Duration::ZERO,
            max_attempts,
        };
        config
    }
}

async fn handle_graphql(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<JsonValue>,
) -> (StatusCode, Json<JsonValue>) {
    let query = body["query"].as_str().unwrap_or_default();
    let operation = Operation::classify(query);

    state.requests.lock().unwrap().push(RecordedRequest {
        operation,
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        variables: body["variables"].clone(),
    });

    let scripted = state
        .script
        .lock()
        .unwrap()
        .get_mut(&operation)
        .and_then(|queue| queue.pop_front());

    let (status, body) = scripted.unwrap_or_else(|| (StatusCode::OK, operation.fallback()));
    (status, Json(body))
}

/// Renders real PDFs and keeps the requests so tests can inspect the text.
pub struct CapturingRenderer {
    inner: PdfRenderer,
    requests: Mutex<Vec<RenderRequest>>,
}

impl CapturingRenderer {
    pub fn new(inner: PdfRenderer) -> Self {
        Self {
            inner,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<RenderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentRenderer for CapturingRenderer {
    async fn render(&self, request: &RenderRequest) -> Result<GeneratedDocument, RenderError> {
        self.requests.lock().unwrap().push(request.clone());
        self.inner.render(request).await
    }
}

pub fn transcript_body(title: &str, sentences: &[(&str, &str)]) -> JsonValue {
    let sentences: Vec<JsonValue> = sentences
        .iter()
        .map(|(speaker, text)| json!({"speaker_name": speaker, "text": text}))
        .collect();
    json!({
        "data": {
            "transcript": {
                "title": title,
                "sentences": sentences,
                "summary": {
                    "overview": "Short meeting",
                    "action_items": ["Follow up"]
                }
            }
        }
    })
}
