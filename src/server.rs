//! HTTP API over the query pipeline and the stored entries.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ask` | Answer a question: `{question, time_filter?: {start?, end?}, top_k?}` |
//! | `GET`  | `/entries` | List entries (`?level=&start=&end=&limit=`) |
//! | `GET`  | `/entries/{id}` | Fetch one entry |
//! | `GET`  | `/stats` | Store statistics (`?period=&level=&start=&end=`) |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404),
//! `service_unavailable` (503), `internal` (500).
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{Path, Query as QueryParams, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use log_rag_core::error::RagError;
use log_rag_core::filter::TimeFilter;
use log_rag_core::models::{EmbeddedEntry, LogLevel, Query};
use log_rag_core::pipeline::QueryPipeline;
use log_rag_core::stats::Period;

use crate::ask::AskResponse;
use crate::config::Config;
use crate::entries::get_entry;
use crate::list::build_filter;
use crate::runtime::Backend;
use crate::stats::{collect_stats, StatsReport};

#[derive(Clone)]
struct AppState {
    backend: Arc<Backend>,
    pipeline: QueryPipeline,
}

/// Build the router with an opened backend. Used by [`run_server`] and by
/// tests that bind their own listener.
pub async fn app(config: &Config) -> anyhow::Result<Router> {
    let backend = Backend::open_loaded(config).await?;
    let pipeline = backend.pipeline(config)?;
    let state = AppState {
        backend: Arc::new(backend),
        pipeline,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Ok(Router::new()
        .route("/ask", post(handle_ask))
        .route("/entries", get(handle_list_entries))
        .route("/entries/{id}", get(handle_get_entry))
        .route("/stats", get(handle_stats))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state))
}

/// Serve on `[server].bind` until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = app(config).await?;

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(bind = %bind_addr, "server started");
    println!("log-rag server listening on http://{}", bind_addr);
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
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::warn!(code = self.code, message = %self.message, "request failed");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        let (status, code) = match &err {
            RagError::ServiceUnavailable { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable")
            }
            RagError::InvalidFilter(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            RagError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<RagError>() {
            Ok(rag) => rag.into(),
            Err(err) => AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "internal",
                message: format!("{:#}", err),
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

// ============ POST /ask ============

#[derive(Deserialize)]
struct TimeFilterBody {
    start: Option<String>,
    end: Option<String>,
}

#[derive(Deserialize)]
struct AskRequest {
    question: String,
    #[serde(default)]
    time_filter: Option<TimeFilterBody>,
    #[serde(default)]
    top_k: Option<usize>,
}

async fn handle_ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    if req.question.trim().is_empty() {
        return Err(bad_request("question must not be empty"));
    }

    let mut query = Query::new(req.question);
    if let Some(tf) = req.time_filter {
        query = query.with_time_filter(TimeFilter::parse(
            tf.start.as_deref(),
            tf.end.as_deref(),
        )?);
    }

    let pipeline = match req.top_k {
        Some(0) => return Err(bad_request("top_k must be >= 1")),
        Some(k) => state.pipeline.clone().with_top_k(k),
        None => state.pipeline.clone(),
    };

    let answer = pipeline.answer(&query).await?;
    Ok(Json(AskResponse::from(answer)))
}

// ============ GET /entries ============

#[derive(Deserialize, Default)]
struct EntryParams {
    /// Comma-separated level names.
    level: Option<String>,
    start: Option<String>,
    end: Option<String>,
    limit: Option<usize>,
    period: Option<String>,
}

impl EntryParams {
    fn levels(&self) -> Result<Vec<LogLevel>, AppError> {
        let Some(raw) = self.level.as_deref() else {
            return Ok(Vec::new());
        };
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<LogLevel>().map_err(bad_request))
            .collect()
    }
}

#[derive(Serialize)]
struct EntryListResponse {
    count: usize,
    entries: Vec<EmbeddedEntry>,
}

async fn handle_list_entries(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<EntryParams>,
) -> Result<Json<EntryListResponse>, AppError> {
    let filter = build_filter(
        &params.levels()?,
        params.start.as_deref(),
        params.end.as_deref(),
    )?;
    let mut entries = state.backend.adapter.list_all(&filter).await?;
    if let Some(limit) = params.limit {
        entries.truncate(limit);
    }
    Ok(Json(EntryListResponse {
        count: entries.len(),
        entries,
    }))
}

// ============ GET /entries/{id} ============

async fn handle_get_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EmbeddedEntry>, AppError> {
    get_entry(&state.backend, &id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(format!("entry not found: {}", id)))
}

// ============ GET /stats ============

async fn handle_stats(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<EntryParams>,
) -> Result<Json<StatsReport>, AppError> {
    let period = match params.period.as_deref() {
        Some(p) => p.parse::<Period>().map_err(bad_request)?,
        None => Period::Daily,
    };
    let filter = build_filter(
        &params.levels()?,
        params.start.as_deref(),
        params.end.as_deref(),
    )?;
    let report = collect_stats(&state.backend, &filter, period).await?;
    Ok(Json(report))
}
