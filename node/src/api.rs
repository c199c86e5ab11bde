//! # REST API
//!
//! Builds the axum router that exposes the ledger over HTTP. All endpoints
//! share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path              | Description                                 |
//! |--------|-------------------|---------------------------------------------|
//! | GET    | `/`               | Liveness string                             |
//! | GET    | `/chain`          | Every block, plus the chain length          |
//! | POST   | `/add_mark`       | Record a grade as a new block               |
//! | GET    | `/student/:id`    | Every grade recorded for one student        |
//! | GET    | `/verify`         | Full integrity walk                         |
//! | GET    | `/block/:index`   | One block by index                          |
//!
//! ## Blocking
//!
//! Ledger calls take a lock and may wait on file I/O, so every one of them
//! runs on tokio's blocking pool and is bounded by the configured request
//! timeout. A timed-out call is answered with 503; the operation itself
//! still runs to completion.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use gradechain_ledger::config::REQUIRED_RECORD_FIELDS;
use gradechain_ledger::{BlockRecord, ChainStore, LedgerError, Payload, StudentRecord};

use crate::cache::ResponseCache;
use crate::metrics::SharedMetrics;

/// Body of `GET /`.
pub const LIVENESS_MESSAGE: &str = "Blockchain Student Record Keeper is running!";

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone: every field is behind an `Arc` or is `Copy`.
#[derive(Clone)]
pub struct AppState {
    /// The ledger. The only mutable state in the process.
    pub chain: Arc<ChainStore>,
    /// Query cache, when enabled.
    pub cache: Option<Arc<ResponseCache>>,
    /// Reference to Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
    /// Upper bound on a single ledger call.
    pub request_timeout: Duration,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/", get(home_handler))
        .route("/chain", get(chain_handler))
        .route("/add_mark", post(add_mark_handler))
        .route("/student/:student_id", get(student_handler))
        .route("/verify", get(verify_handler))
        .route("/block/:index", get(block_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Response payload for `GET /chain`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChainResponse {
    pub chain: Vec<BlockRecord>,
    pub length: usize,
    /// Whether this listing came from the cache.
    pub cached: bool,
}

/// Response payload for `POST /add_mark`.
#[derive(Debug, Serialize, Deserialize)]
pub struct AddMarkResponse {
    pub status: String,
    pub block: BlockRecord,
}

/// Response payload for `GET /student/:id`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StudentResponse {
    pub records: Vec<Payload>,
    pub cached: bool,
}

/// Response payload for `GET /verify`.
#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub valid: bool,
    /// First integrity violation, when the chain is invalid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Generic error body returned by REST endpoints on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures surfaced to API clients.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request body is missing, not a JSON object, or lacks a field.
    #[error("{0}")]
    MalformedRequest(String),

    #[error("block not found")]
    NotFound,

    #[error("ledger operation timed out")]
    Timeout,

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Timeout => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::BlockNotFound(_) => ApiError::NotFound,
            LedgerError::EmptyChain => {
                tracing::error!("ledger invariant violated: {}", e);
                ApiError::Internal(e.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /` — liveness probe. Does not touch the ledger.
async fn home_handler() -> &'static str {
    LIVENESS_MESSAGE
}

/// `GET /chain` — the full chain in order.
async fn chain_handler(State(state): State<AppState>) -> Result<Json<ChainResponse>, ApiError> {
    if let Some(cache) = &state.cache {
        if let Some(chain) = cache.chain() {
            state.metrics.cache_hits_total.inc();
            return Ok(Json(ChainResponse {
                length: chain.len(),
                chain,
                cached: true,
            }));
        }
        state.metrics.cache_misses_total.inc();
    }

    let generation = state.cache.as_ref().map(|c| c.generation());
    let chain = run_ledger(&state, |ledger| ledger.to_list()).await?;

    if let (Some(cache), Some(generation)) = (&state.cache, generation) {
        cache.store_chain(chain.clone(), generation);
        state.metrics.cache_entries.set(cache.len() as i64);
    }
    Ok(Json(ChainResponse {
        length: chain.len(),
        chain,
        cached: false,
    }))
}

/// `POST /add_mark` — record one grade.
///
/// The body must be a JSON object with `student_id`, `name`, `subject`
/// (strings) and `marks` (integer, float or numeric string; floats are
/// truncated). Nothing is appended unless the whole body validates.
async fn add_mark_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<AddMarkResponse>), ApiError> {
    let record = parse_mark(&body)?;
    let student_id = record.student_id.clone();

    let cache = state.cache.clone();
    let appended_for = student_id.clone();
    let (block, length) = run_ledger(&state, move |ledger| {
        let block = ledger.add_block(record)?;
        if let Some(cache) = &cache {
            cache.invalidate_for_append(&appended_for);
        }
        Ok::<_, LedgerError>((block, ledger.len()))
    })
    .await??;

    state.metrics.marks_recorded_total.inc();
    state.metrics.chain_length.set(length as i64);
    tracing::info!(
        index = block.index(),
        student_id = %student_id,
        hash = %block.hash(),
        "mark recorded"
    );

    Ok((
        StatusCode::CREATED,
        Json(AddMarkResponse {
            status: "ok".to_string(),
            block: block.to_record(),
        }),
    ))
}

/// `GET /student/:student_id` — every grade recorded for one student, in
/// chain order. Unknown students get an empty list, not a 404.
async fn student_handler(
    Path(student_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<StudentResponse>, ApiError> {
    if let Some(cache) = &state.cache {
        if let Some(records) = cache.student(&student_id) {
            state.metrics.cache_hits_total.inc();
            return Ok(Json(StudentResponse {
                records,
                cached: true,
            }));
        }
        state.metrics.cache_misses_total.inc();
    }

    let generation = state.cache.as_ref().map(|c| c.generation());
    let id = student_id.clone();
    let records = run_ledger(&state, move |ledger| ledger.get_records_by_student(&id)).await?;

    if let (Some(cache), Some(generation)) = (&state.cache, generation) {
        cache.store_student(&student_id, records.clone(), generation);
        state.metrics.cache_entries.set(cache.len() as i64);
    }
    Ok(Json(StudentResponse {
        records,
        cached: false,
    }))
}

/// `GET /verify` — full integrity walk.
///
/// An invalid chain is reported as data with a 200; the node keeps serving
/// it so operators can inspect what went wrong.
async fn verify_handler(State(state): State<AppState>) -> Result<Json<VerifyResponse>, ApiError> {
    let outcome = run_ledger(&state, |ledger| ledger.validate()).await?;
    let resp = match outcome {
        Ok(()) => VerifyResponse {
            valid: true,
            reason: None,
        },
        Err(fault) => {
            state.metrics.integrity_failures_total.inc();
            tracing::warn!(%fault, "chain failed verification");
            VerifyResponse {
                valid: false,
                reason: Some(fault.to_string()),
            }
        }
    };
    Ok(Json(resp))
}

/// `GET /block/:index` — one block, or 404 when out of range.
///
/// Anything that is not a non-negative integer (`-1`, `abc`, a number past
/// `u64::MAX`) can never name a block and is also a 404.
async fn block_handler(
    Path(raw_index): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<BlockRecord>, ApiError> {
    let index: u64 = raw_index.parse().map_err(|_| ApiError::NotFound)?;
    let block = run_ledger(&state, move |ledger| ledger.get_block(index)).await??;
    Ok(Json(block.to_record()))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Run `op` against the ledger on the blocking pool, bounded by the
/// request timeout.
async fn run_ledger<T, F>(state: &AppState, op: F) -> Result<T, ApiError>
where
    F: FnOnce(&ChainStore) -> T + Send + 'static,
    T: Send + 'static,
{
    let ledger = Arc::clone(&state.chain);
    let task = tokio::task::spawn_blocking(move || op(&ledger));

    match tokio::time::timeout(state.request_timeout, task).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(ApiError::Internal(format!("ledger task failed: {}", e))),
        Err(_) => {
            state.metrics.request_timeouts_total.inc();
            tracing::warn!(
                timeout_ms = state.request_timeout.as_millis() as u64,
                "ledger operation timed out"
            );
            Err(ApiError::Timeout)
        }
    }
}

/// Validate an `/add_mark` body into a grade entry.
fn parse_mark(body: &[u8]) -> Result<StudentRecord, ApiError> {
    let payload_required = || ApiError::MalformedRequest("JSON payload required".to_string());

    let payload: Value = serde_json::from_slice(body).map_err(|_| payload_required())?;
    let fields = match payload {
        Value::Object(fields) if !fields.is_empty() => fields,
        _ => return Err(payload_required()),
    };

    let missing: Vec<&str> = REQUIRED_RECORD_FIELDS
        .iter()
        .copied()
        .filter(|f| !fields.contains_key(*f))
        .collect();
    if !missing.is_empty() {
        return Err(ApiError::MalformedRequest(format!(
            "required fields: {} (missing: {})",
            REQUIRED_RECORD_FIELDS.join(", "),
            missing.join(", ")
        )));
    }

    Ok(StudentRecord {
        student_id: string_field(&fields, "student_id")?,
        name: string_field(&fields, "name")?,
        subject: string_field(&fields, "subject")?,
        marks: parse_marks(&fields["marks"])?,
    })
}

fn string_field(fields: &Map<String, Value>, name: &str) -> Result<String, ApiError> {
    fields
        .get(name)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| ApiError::MalformedRequest(format!("field `{}` must be a string", name)))
}

/// Integer coercion for `marks`: integers as-is, finite floats truncated
/// toward zero, numeric strings parsed.
fn parse_marks(value: &Value) -> Result<i64, ApiError> {
    // Largest f64 strictly below 2^63, so the cast below cannot saturate.
    const MAX_EXACT: f64 = 9_223_372_036_854_774_784.0;

    let marks = match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.abs() <= MAX_EXACT)
                .map(|f| f.trunc() as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    marks.ok_or_else(|| ApiError::MalformedRequest("field `marks` must be an integer".to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
