//! Receipt ingestion HTTP server.
//!
//! Exposes the normalization/enrichment/reconciliation pipeline via a JSON
//! HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/receipts` | Ingest one receipt line item (`?force_enrichment=true` to always enrich) |
//! | `GET`  | `/receipts/{receipt_id}` | Fetch a persisted receipt by external identifier |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses share one envelope:
//!
//! ```json
//! { "error": { "code": "validation_failed", "message": "...", "details": [
//!     { "field": "receipt_id", "message": "...", "code": "required" } ] } }
//! ```
//!
//! Error codes: `validation_failed` (400), `not_found` (404), `conflict`
//! (409), `store_unavailable` (503), `internal` (500). Enrichment failure is
//! never an error: the response simply carries `low` confidence and
//! `unknown` placeholders.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::db;
use crate::enrichment::{self, EnrichmentClient};
use crate::ingest::normalize_and_reconcile;
use crate::normalize::{FieldError, ValidationError};
use crate::store::sqlite::SqliteStore;
use crate::store::{ReceiptStore, StoreError};

/// Shared application state passed to all route handlers via Axum's `State`
/// extractor. Both collaborators are trait objects so tests can inject an
/// in-memory store and a scripted enrichment client.
#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn ReceiptStore>,
    enrichment: Arc<dyn EnrichmentClient>,
}

impl AppState {
    pub fn new(store: Arc<dyn ReceiptStore>, enrichment: Arc<dyn EnrichmentClient>) -> Self {
        Self { store, enrichment }
    }
}

/// Build the router with all routes and the CORS layer.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/receipts", post(handle_ingest))
        .route("/receipts/{receipt_id}", get(handle_get))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server.
///
/// Binds to the address configured in `[server].bind` and runs until the
/// process is terminated. The SQLite store and the configured enrichment
/// provider are wired in here; tests use [`build_router`] with doubles
/// instead.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    let store = Arc::new(SqliteStore::new(pool));
    let client: Arc<dyn EnrichmentClient> =
        Arc::from(enrichment::create_client(&config.enrichment)?);

    tracing::info!(
        provider = client.provider_name(),
        "enrichment provider configured"
    );

    let app = build_router(AppState::new(store, client));

    let bind_addr = config.server.bind.clone();
    tracing::info!("receipt server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error response envelope.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

/// Inner error detail with a machine-readable code, human-readable message,
/// and optional per-field details for validation failures.
#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<FieldError>>,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
    details: Option<Vec<FieldError>>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
                details: self.details,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

/// Constructs a 400 response listing every invalid field.
fn validation_failed(err: ValidationError) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "validation_failed".to_string(),
        message: err.to_string(),
        details: Some(err.errors),
    }
}

/// Constructs a 404 Not Found error.
fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
        details: None,
    }
}

/// Maps store failures onto the error contract: duplicate identifiers are a
/// conflict, unreachable storage is service-unavailable, everything else is
/// internal.
fn store_error(err: StoreError) -> AppError {
    match err {
        StoreError::Conflict { receipt_id } => AppError {
            status: StatusCode::CONFLICT,
            code: "conflict".to_string(),
            message: format!("receipt already exists: {}", receipt_id),
            details: None,
        },
        StoreError::Unavailable(message) => AppError {
            status: StatusCode::SERVICE_UNAVAILABLE,
            code: "store_unavailable".to_string(),
            message,
            details: None,
        },
        StoreError::Other(e) => AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal".to_string(),
            message: e.to_string(),
            details: None,
        },
    }
}

// ============ GET /health ============

/// JSON response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

/// Handler for `GET /health`.
async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /receipts ============

/// Query parameters for `POST /receipts`.
#[derive(Deserialize)]
struct IngestParams {
    #[serde(default)]
    force_enrichment: bool,
}

/// Handler for `POST /receipts`.
///
/// Runs the full pipeline on the raw body and inserts the reconciled
/// record. Enrichment failure degrades silently; persistence failures map
/// onto the error contract.
async fn handle_ingest(
    State(state): State<AppState>,
    Query(params): Query<IngestParams>,
    Json(body): Json<serde_json::Value>,
) -> Result<Response, AppError> {
    let (record, _enrichment) =
        normalize_and_reconcile(&body, params.force_enrichment, state.enrichment.as_ref())
            .await
            .map_err(validation_failed)?;

    let persisted = state
        .store
        .insert_receipt(&record)
        .await
        .map_err(store_error)?;

    tracing::info!(
        receipt_id = %persisted.record.receipt_id,
        confidence = persisted
            .record
            .enrichment_confidence
            .map(|c| c.as_str())
            .unwrap_or("skipped"),
        "receipt persisted"
    );

    Ok((StatusCode::CREATED, Json(persisted)).into_response())
}

// ============ GET /receipts/{receipt_id} ============

/// Handler for `GET /receipts/{receipt_id}`.
async fn handle_get(
    State(state): State<AppState>,
    Path(receipt_id): Path<String>,
) -> Result<Response, AppError> {
    let receipt = state
        .store
        .get_receipt(&receipt_id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| not_found(format!("no receipt with id: {}", receipt_id)))?;

    Ok(Json(receipt).into_response())
}
