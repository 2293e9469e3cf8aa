use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shared::telemetry;
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

use crate::error::{NotesError, ProviderError};
use crate::generator::{GenerateOptions, NotesGenerator};
use crate::models::{GeneratedDocument, TranscriptRef};
use crate::poll::DocumentKind;
use crate::resolve::Lookup;

pub const DEFAULT_LIST_LIMIT: i32 = 10;
pub const MAX_LIST_LIMIT: i32 = 50;

#[derive(Clone)]
pub struct ApiState {
    pub generator: Arc<NotesGenerator>,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidates: Option<Vec<TranscriptRef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcripts: Option<Vec<TranscriptRef>>,
}

impl ApiResponse {
    fn ok(message: &str) -> Self {
        Self {
            success: true,
            message: Some(message.to_string()),
            ..Default::default()
        }
    }

    fn document(document: &GeneratedDocument) -> Self {
        Self {
            success: true,
            message: Some("PDF generated successfully".to_string()),
            // The file name is the public identifier; server paths stay private.
            path: Some(document.file_name.clone()),
            download_url: Some(document.download_url()),
            ..Default::default()
        }
    }

    fn failure(error: String) -> Self {
        Self {
            success: false,
            error: Some(error),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScheduleBotRequest {
    pub meeting_link: Option<String>,
    pub meeting_title: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerateRequest {
    pub transcript_id: Option<String>,
    pub meeting_title: Option<String>,
    pub title: Option<String>,
    pub max_attempts: Option<u32>,
    pub interval_secs: Option<u64>,
    pub poll_id: Option<String>,
}

impl GenerateRequest {
    fn options(&self, kind: DocumentKind) -> GenerateOptions {
        GenerateOptions {
            kind,
            interval_secs: self.interval_secs,
            max_attempts: self.max_attempts,
            poll_id: self.poll_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CancelRequest {
    pub poll_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    pub limit: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HealthQuery {
    pub deep: bool,
}

/// Maps core errors onto status codes and the JSON failure body.
pub struct ApiError(NotesError);

impl From<NotesError> for ApiError {
    fn from(e: NotesError) -> Self {
        ApiError(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            NotesError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            NotesError::NotFound(_) => StatusCode::NOT_FOUND,
            NotesError::AmbiguousMatch { .. } | NotesError::Cancelled { .. } => {
                StatusCode::CONFLICT
            }
            NotesError::Exhausted { .. } => StatusCode::GATEWAY_TIMEOUT,
            NotesError::Provider(ProviderError::Transport(_)) => StatusCode::SERVICE_UNAVAILABLE,
            NotesError::Provider(ProviderError::Client(_)) | NotesError::Render(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            NotesError::Provider(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed ({}): {}", status, self.0);
        } else {
            warn!("Request rejected ({}): {}", status, self.0);
        }

        let mut body = ApiResponse::failure(self.0.to_string());
        if let NotesError::AmbiguousMatch { candidates, .. } = self.0 {
            body.message = Some(
                "Multiple matching transcripts found; pick one and call /api/generate-pdf with its id"
                    .to_string(),
            );
            body.candidates = Some(candidates);
        }

        (status, Json(body)).into_response()
    }
}

/// Accepts an empty body as the request's defaults.
fn parse_body<T>(body: &Bytes) -> Result<T, ApiError>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError(NotesError::InvalidRequest(format!("Invalid JSON body: {}", e))))
}

pub fn create_router(state: ApiState) -> Router {
    let outputs = ServeDir::new(&state.output_dir);

    Router::new()
        .route("/health", get(health))
        .route("/api/schedule-bot", post(schedule_bot))
        .route("/api/transcripts", get(list_transcripts))
        .route("/api/generate-latest", post(generate_latest))
        .route("/api/generate-by-title", post(generate_by_title))
        .route("/api/generate-pdf", post(generate_pdf))
        .route("/api/generate-study-notes", post(generate_study_notes))
        .route("/api/cancel", post(cancel_poll))
        .nest_service("/outputs", outputs)
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(telemetry::middleware::trace_layer))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn health(State(state): State<ApiState>, Query(query): Query<HealthQuery>) -> Response {
    if query.deep {
        if let Err(e) = state.generator.check_provider().await {
            warn!("Deep health check failed: {}", e);
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "status": "unhealthy",
                    "error": e.to_string(),
                })),
            )
                .into_response();
        }
    }

    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "catnotes",
    }))
    .into_response()
}

async fn schedule_bot(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<ApiResponse>, ApiError> {
    let request: ScheduleBotRequest = parse_body(&body)?;

    let (link, title) = match (request.meeting_link, request.meeting_title) {
        (Some(link), Some(title)) if !link.trim().is_empty() && !title.trim().is_empty() => {
            (link, title)
        }
        _ => {
            return Err(NotesError::InvalidRequest(
                "Meeting link and title are required".to_string(),
            )
            .into())
        }
    };

    state.generator.schedule_bot(&link, &title).await?;
    Ok(Json(ApiResponse::ok("Bot scheduled successfully")))
}

async fn list_transcripts(
    State(state): State<ApiState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);

    let transcripts = state.generator.list_recent(limit).await?;
    Ok(Json(ApiResponse {
        success: true,
        transcripts: Some(transcripts),
        ..Default::default()
    }))
}

async fn generate_latest(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<ApiResponse>, ApiError> {
    let request: GenerateRequest = parse_body(&body)?;
    info!("Generating PDF from latest transcript");

    let document = state
        .generator
        .generate(&Lookup::Latest, request.options(DocumentKind::Notes))
        .await?;
    Ok(Json(ApiResponse::document(&document)))
}

async fn generate_by_title(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<ApiResponse>, ApiError> {
    let request: GenerateRequest = parse_body(&body)?;
    let title = request
        .title
        .clone()
        .or_else(|| request.meeting_title.clone())
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| NotesError::InvalidRequest("Search title is required".to_string()))?;

    info!("Generating PDF for transcript matching \"{}\"", title);
    let document = state
        .generator
        .generate(&Lookup::ByTitle(title), request.options(DocumentKind::Notes))
        .await?;
    Ok(Json(ApiResponse::document(&document)))
}

async fn generate_pdf(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<ApiResponse>, ApiError> {
    let request: GenerateRequest = parse_body(&body)?;
    let id = request
        .transcript_id
        .clone()
        .ok_or_else(|| NotesError::InvalidRequest("Transcript ID is required".to_string()))?;

    info!("Generating PDF for transcript {}", id);
    let lookup = Lookup::ById {
        id,
        title: request.meeting_title.clone(),
    };
    let document = state
        .generator
        .generate(&lookup, request.options(DocumentKind::Notes))
        .await?;
    Ok(Json(ApiResponse::document(&document)))
}

async fn generate_study_notes(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<ApiResponse>, ApiError> {
    let request: GenerateRequest = parse_body(&body)?;
    let lookup = match request.transcript_id.clone() {
        Some(id) => Lookup::ById {
            id,
            title: request.meeting_title.clone(),
        },
        None => Lookup::Latest,
    };

    let document = state
        .generator
        .generate(&lookup, request.options(DocumentKind::StudyNotes))
        .await?;
    let mut response = ApiResponse::document(&document);
    response.message = Some("Summary notes generated successfully".to_string());
    Ok(Json(response))
}

async fn cancel_poll(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<ApiResponse>, ApiError> {
    let request: CancelRequest = parse_body(&body)?;
    let poll_id = request
        .poll_id
        .ok_or_else(|| NotesError::InvalidRequest("pollId is required".to_string()))?;

    if state.generator.cancel(&poll_id) {
        Ok(Json(ApiResponse::ok("Cancellation requested")))
    } else {
        Err(NotesError::NotFound(format!("No active poll with id {}", poll_id)).into())
    }
}
