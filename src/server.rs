//! HTTP API.
//!
//! Exposes conversational QA, the tool-routed workflow, document upload, and
//! collection management as JSON endpoints.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ask` | Ask a question in a conversation session |
//! | `POST` | `/clear` | Clear a session's history |
//! | `POST` | `/run` | Route input through a tool and summarize it |
//! | `POST` | `/upload` | Ingest an uploaded PDF, TXT, or Word file (multipart field `file`) |
//! | `GET`  | `/collection` | Collection name, record count, and metadata |
//! | `DELETE` | `/collection` | Delete every stored chunk |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! Errors use one JSON shape:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `payload_too_large` (413),
//! `unsupported_format` (415), `load_error` (422), `storage_error` (500),
//! `internal` (500).
//!
//! `/run` keeps its own shape on failure, `{ "success": false, "output": "Error: ..." }`,
//! with status 400 for an empty `user_input` and 500 otherwise.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser front end
//! can be served from anywhere.

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use docqa_core::error::RagError;
use docqa_core::models::SourceRef;
use docqa_core::store::CollectionInfo;
use docqa_core::workflow::{WorkflowRequest, WorkflowResponse};

use crate::app::AppContext;

type AppState = Arc<AppContext>;

/// Build the router with all endpoints, CORS, and the upload size limit.
pub fn router(ctx: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let max_upload = ctx.config.server.max_upload_bytes;

    Router::new()
        .route("/ask", post(handle_ask))
        .route("/clear", post(handle_clear))
        .route("/run", post(handle_run))
        .route("/upload", post(handle_upload))
        .route(
            "/collection",
            get(handle_collection_info).delete(handle_collection_delete),
        )
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(max_upload))
        .layer(cors)
        .with_state(ctx)
}

/// Bind to `[server].bind` and serve until the process is terminated.
pub async fn run_server(ctx: AppState) -> anyhow::Result<()> {
    let bind_addr = ctx.config.server.bind.clone();
    let app = router(ctx);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    println!("docqa server listening on http://{}", bind_addr);
    info!(bind = %bind_addr, "server started");

    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        let status = match &err {
            RagError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            RagError::UnsupportedFormat { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            RagError::Load { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let code = match &err {
            RagError::ToolInvocation { .. } | RagError::Synthesis(_) => "internal",
            other => other.code(),
        };
        AppError {
            status,
            code: code.to_string(),
            message: err.to_string(),
        }
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        let status = err.status();
        let code = if status == StatusCode::PAYLOAD_TOO_LARGE {
            "payload_too_large"
        } else {
            "bad_request"
        };
        AppError {
            status,
            code: code.to_string(),
            message: err.body_text(),
        }
    }
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
    sources: Vec<SourceRef>,
    session_id: String,
    fallback: bool,
}

/// Answer a question in the session named by `session_id`, or in a new
/// session whose id is returned.
async fn handle_ask(
    State(ctx): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    if req.question.trim().is_empty() {
        return Err(bad_request("question must not be empty"));
    }

    let (session_id, conv) = ctx.sessions.get_or_create(req.session_id.as_deref()).await;
    let answer = conv.lock().await.ask(&req.question).await?;

    Ok(Json(AskResponse {
        answer: answer.answer,
        sources: answer.sources,
        session_id,
        fallback: answer.fallback,
    }))
}

// ============ POST /clear ============

#[derive(Deserialize)]
struct ClearRequest {
    session_id: String,
}

#[derive(Serialize)]
struct SuccessResponse {
    success: bool,
}

async fn handle_clear(
    State(ctx): State<AppState>,
    Json(req): Json<ClearRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    if ctx.sessions.clear(&req.session_id).await {
        Ok(Json(SuccessResponse { success: true }))
    } else {
        Err(not_found(format!("no session with id: {}", req.session_id)))
    }
}

// ============ POST /run ============

async fn handle_run(
    State(ctx): State<AppState>,
    Json(req): Json<WorkflowRequest>,
) -> (StatusCode, Json<WorkflowResponse>) {
    match ctx.workflow.run(&req).await {
        Ok(resp) => (StatusCode::OK, Json(resp)),
        Err(e) => {
            let status = match e {
                RagError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            warn!(code = e.code(), error = %e, "workflow failed");
            (status, Json(WorkflowResponse::error(e)))
        }
    }
}

// ============ POST /upload ============

#[derive(Serialize)]
struct UploadResponse {
    success: bool,
    added_chunks: usize,
    filename: String,
}

/// Ingest the multipart field named `file`; its file name selects the format.
async fn handle_upload(
    State(ctx): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| bad_request("uploaded file has no file name"))?;
        let bytes = field.bytes().await?;

        let added_chunks = ctx.ingestor.process_bytes(&filename, &bytes).await?;
        return Ok(Json(UploadResponse {
            success: true,
            added_chunks,
            filename,
        }));
    }

    Err(bad_request("multipart field 'file' is required"))
}

// ============ /collection ============

async fn handle_collection_info(
    State(ctx): State<AppState>,
) -> Result<Json<CollectionInfo>, AppError> {
    Ok(Json(ctx.store.info().await?))
}

async fn handle_collection_delete(
    State(ctx): State<AppState>,
) -> Result<Json<SuccessResponse>, AppError> {
    ctx.store.delete_collection().await?;
    info!(collection = ctx.store.name(), "collection deleted");
    Ok(Json(SuccessResponse { success: true }))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
