//! JSON HTTP API.
//!
//! Exposes the ingestion and query flows over HTTP, mirroring the two
//! interactive forms of the original tool: an upload form (index name,
//! metric, dimension) and a query form (question, index name, result
//! count).
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ingest` | Run the CSV → embed → upsert flow |
//! | `POST` | `/query` | Interpret a question and query the index |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Input errors (`bad_request`, 400) are caught before any external
//! service is called; everything else surfaces as `internal` (500).

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::{Config, Metric};
use crate::ingest::{run_ingest, IngestOverrides};
use crate::interpreter::resolve_reference_date;
use crate::query::run_query;

#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
}

#[derive(Debug, Deserialize)]
struct IngestBody {
    #[serde(default)]
    index: Option<String>,
    #[serde(default)]
    metric: Option<String>,
    #[serde(default)]
    dimension: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct QueryBody {
    query: String,
    #[serde(default)]
    index: Option<String>,
    #[serde(default)]
    top_k: Option<usize>,
    #[serde(default)]
    reference_date: Option<String>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "bad_request",
            message: message.into(),
        }
    }

    fn internal(err: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal",
            message: format!("{:#}", err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": { "code": self.code, "message": self.message }
        });
        (self.status, Json(body)).into_response()
    }
}

/// Start the HTTP server on the configured bind address.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let state = AppState {
        config: Arc::new(config.clone()),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router(state).layer(cors);

    println!("pinequery server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/ingest", post(handle_ingest))
        .route("/query", post(handle_query))
        .route("/health", get(handle_health))
        .with_state(state)
}

async fn handle_health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn handle_ingest(
    State(state): State<AppState>,
    Json(body): Json<IngestBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if let Some(ref index) = body.index {
        if index.trim().is_empty() {
            return Err(ApiError::bad_request("index must not be empty"));
        }
    }
    if body.dimension == Some(0) {
        return Err(ApiError::bad_request("dimension must be > 0"));
    }

    let metric = match body.metric.as_deref() {
        Some(raw) => Some(Metric::parse(raw).map_err(|e| ApiError::bad_request(e.to_string()))?),
        None => None,
    };

    let overrides = IngestOverrides {
        csv_path: None,
        index: body.index,
        metric,
        dimension: body.dimension,
    };

    let summary = run_ingest(&state.config, &overrides, false)
        .await
        .map_err(ApiError::internal)?;

    Ok(Json(serde_json::json!({ "ok": true, "summary": summary })))
}

async fn handle_query(
    State(state): State<AppState>,
    Json(body): Json<QueryBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.query.trim().is_empty() {
        return Err(ApiError::bad_request("query must not be empty"));
    }
    if let Some(top_k) = body.top_k {
        if !(1..=10).contains(&top_k) {
            return Err(ApiError::bad_request("top_k must be between 1 and 10"));
        }
    }

    let reference_date =
        resolve_reference_date(&state.config.llm, body.reference_date.as_deref())
            .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let outcome = run_query(
        &state.config,
        &body.query,
        body.index.as_deref(),
        body.top_k,
        reference_date,
    )
    .await
    .map_err(ApiError::internal)?;

    Ok(Json(serde_json::json!({
        "filter": outcome.filter,
        "semantic_query": outcome.semantic_query,
        "matches": outcome.matches,
    })))
}
