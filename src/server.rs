//! HTTP API server.
//!
//! Exposes ingestion, batch processing, product administration, stats, and
//! the chat endpoint over a JSON HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ingestion` | Store a raw payload for later processing |
//! | `POST` | `/intelligence/process` | Classify pending raw records into entities |
//! | `GET`  | `/intelligence/products` | List all documents (admin panel) |
//! | `PUT`  | `/intelligence/products/{id}` | Partial document edit |
//! | `POST` | `/chat` | Ask a question (RAG) |
//! | `GET`  | `/stats` | Inventory counters |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses share one JSON shape:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "payload must be an object or a list" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `upstream_error`
//! (502), `store_error` / `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the chat widget can
//! be embedded on any page.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::completion::{self, CompletionProvider};
use crate::config::Config;
use crate::embedding::{self, EmbeddingProvider};
use crate::error::EngineError;
use crate::matching::{CustomerMatcher, SubstringMatcher};
use crate::models::{DocumentUpdate, ProductView, RawRecord, Role, StoreStats};
use crate::sqlite_store::SqliteStore;
use crate::store::EntityStore;
use crate::{answer, db, migrate, processor};

/// Shared application state passed to all route handlers via Axum's
/// `State` extractor.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    store: Arc<dyn EntityStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    completer: Arc<dyn CompletionProvider>,
    matcher: Arc<dyn CustomerMatcher>,
}

/// Start the HTTP server.
///
/// Binds to the address configured in `[server].bind`, applies schema
/// migrations (idempotent), and serves until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    migrate::apply_schema(&pool).await?;

    let embedder: Arc<dyn EmbeddingProvider> =
        embedding::create_provider(&config.embedding)?.into();
    let completer: Arc<dyn CompletionProvider> =
        completion::create_provider(&config.completion)?.into();

    let state = AppState {
        config: Arc::new(config.clone()),
        store: Arc::new(SqliteStore::new(pool)),
        embedder,
        completer,
        matcher: Arc::new(SubstringMatcher::new(config.retrieval.min_match_word_len)),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/ingestion", post(handle_ingest))
        .route("/intelligence/process", post(handle_process))
        .route("/intelligence/products", get(handle_list_products))
        .route("/intelligence/products/{id}", put(handle_update_product))
        .route("/chat", post(handle_chat))
        .route("/stats", get(handle_stats))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    let bind_addr = &config.server.bind;
    info!(bind = %bind_addr, "server listening");

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"not_found"`).
    code: String,
    /// Human-readable error message.
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
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

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotFound(_) => AppError {
                status: StatusCode::NOT_FOUND,
                code: "not_found".to_string(),
                message: err.to_string(),
            },
            EngineError::InvalidRole(_) => AppError {
                status: StatusCode::BAD_REQUEST,
                code: "bad_request".to_string(),
                message: err.to_string(),
            },
            EngineError::Upstream(_) => AppError {
                status: StatusCode::BAD_GATEWAY,
                code: "upstream_error".to_string(),
                message: err.to_string(),
            },
            EngineError::Store(_) => AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "store_error".to_string(),
                message: err.to_string(),
            },
        }
    }
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

// ============ POST /ingestion ============

#[derive(Deserialize)]
struct IngestRequest {
    source: String,
    /// A single record-shaped object or a list of them.
    payload: serde_json::Value,
}

#[derive(Serialize)]
struct IngestResponse {
    status: String,
    id: String,
    message: String,
}

async fn handle_ingest(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, AppError> {
    if !request.payload.is_object() && !request.payload.is_array() {
        return Err(bad_request("payload must be an object or a list"));
    }

    let record = RawRecord::new(request.source, request.payload);
    state.store.insert_raw_record(&record).await?;

    Ok(Json(IngestResponse {
        status: "success".to_string(),
        id: record.id,
        message: "Datos guardados correctamente".to_string(),
    }))
}

// ============ POST /intelligence/process ============

#[derive(Deserialize)]
struct ProcessParams {
    limit: Option<i64>,
}

#[derive(Serialize)]
struct ProcessResponse {
    status: String,
    processed_count: usize,
    message: String,
}

async fn handle_process(
    State(state): State<AppState>,
    Query(params): Query<ProcessParams>,
) -> Result<Json<ProcessResponse>, AppError> {
    let limit = params.limit.unwrap_or(10);
    if limit < 1 {
        return Err(bad_request("limit must be >= 1"));
    }

    let count =
        processor::process_batch(state.store.as_ref(), state.embedder.as_ref(), limit).await?;

    Ok(Json(ProcessResponse {
        status: "success".to_string(),
        processed_count: count,
        message: format!("Se procesaron {} elementos.", count),
    }))
}

// ============ GET /intelligence/products ============

async fn handle_list_products(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProductView>>, AppError> {
    Ok(Json(state.store.list_documents().await?))
}

// ============ PUT /intelligence/products/{id} ============

#[derive(Serialize)]
struct UpdateResponse {
    status: String,
    message: String,
}

async fn handle_update_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<DocumentUpdate>,
) -> Result<Json<UpdateResponse>, AppError> {
    if update.is_empty() {
        return Ok(Json(UpdateResponse {
            status: "success".to_string(),
            message: "No changes provided".to_string(),
        }));
    }

    state.store.update_document(&id, &update).await?;

    Ok(Json(UpdateResponse {
        status: "success".to_string(),
        message: "Producto actualizado correctamente".to_string(),
    }))
}

// ============ POST /chat ============

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
    /// Caller role: `"customer"` or `"admin"`. Anything else is rejected.
    role: String,
}

#[derive(Serialize)]
struct ChatResponse {
    response: String,
}

async fn handle_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let role = Role::from_str(&request.role)?;

    let text = answer::ask(
        state.store.as_ref(),
        state.embedder.as_ref(),
        state.completer.as_ref(),
        state.matcher.as_ref(),
        &state.config.retrieval,
        &request.message,
        role,
    )
    .await?;

    Ok(Json(ChatResponse { response: text }))
}

// ============ GET /stats ============

async fn handle_stats(State(state): State<AppState>) -> Result<Json<StoreStats>, AppError> {
    Ok(Json(state.store.stats().await?))
}
