//! HTTP routes for the knowledge-base assistant.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Path, Request, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use ikb_rag::{
    AuditRecord, ChatAnswer, Deadline, DocumentDetail, DocumentSummary, IngestReport,
    IngestRequest, RagEngine, RagError, StoreStats, Uuid,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RagEngine>,
    /// Budget for one request across every external call it makes.
    pub request_timeout: Duration,
}

impl AppState {
    fn deadline(&self) -> Deadline {
        Deadline::after(self.request_timeout)
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    #[serde(flatten)]
    pub report: IngestReport,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct AuditResponse {
    pub count: usize,
    pub logs: Vec<AuditRecord>,
}

#[derive(Debug, Serialize)]
pub struct DocumentListResponse {
    pub total: usize,
    pub documents: Vec<DocumentSummary>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub id: Uuid,
    pub message: &'static str,
}

/// Every failure leaves the server as `{"error": "..."}`.
pub enum ApiError {
    /// Caller mistakes are 400, everything else from the pipeline is 500.
    Rag(RagError),
    BadRequest(String),
    NotFound(String),
}

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        Self::Rag(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Rag(err) if err.is_client_error() => (StatusCode::BAD_REQUEST, err.to_string()),
            Self::Rag(err) => {
                tracing::error!(error = %err, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// `Json` whose rejections (bad syntax, wrong content type) use the `{error}` shape.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

fn parse_document_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid document id '{}'", raw)))
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn chat(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ChatRequest>,
) -> Result<Json<ChatAnswer>, ApiError> {
    let answer = state.engine.answer(&payload.question, &state.deadline()).await?;
    Ok(Json(answer))
}

async fn ingest_document(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<IngestRequest>,
) -> Result<Json<IngestResponse>, ApiError> {
    let report = state.engine.ingest(payload, &state.deadline()).await?;
    Ok(Json(IngestResponse {
        report,
        message: "Document chunked, embedded, and stored",
    }))
}

async fn list_documents(
    State(state): State<AppState>,
) -> Result<Json<DocumentListResponse>, ApiError> {
    let documents = state.engine.list_documents(&state.deadline()).await?;
    Ok(Json(DocumentListResponse {
        total: documents.len(),
        documents,
    }))
}

async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DocumentDetail>, ApiError> {
    let id = parse_document_id(&id)?;
    state
        .engine
        .document(id, &state.deadline())
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Document not found".to_string()))
}

async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let id = parse_document_id(&id)?;
    if !state.engine.delete_document(id, &state.deadline()).await? {
        return Err(ApiError::NotFound("Document not found".to_string()));
    }
    Ok(Json(DeleteResponse {
        id,
        message: "Document deleted successfully",
    }))
}

async fn document_stats(State(state): State<AppState>) -> Result<Json<StoreStats>, ApiError> {
    Ok(Json(state.engine.stats(&state.deadline()).await?))
}

async fn audit_logs(State(state): State<AppState>) -> Result<Json<AuditResponse>, ApiError> {
    let logs = state.engine.audit_log().await?;
    Ok(Json(AuditResponse {
        count: logs.len(),
        logs,
    }))
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/chat", post(chat))
        .route("/documents", get(list_documents).post(ingest_document))
        .route("/documents/stats/overview", get(document_stats))
        .route("/documents/:id", get(get_document).delete(delete_document))
        .route("/audit", get(audit_logs))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
