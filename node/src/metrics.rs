//! # Prometheus Metrics
//!
//! Exposes operational metrics for the node. Scraped by Prometheus at the
//! `/metrics` HTTP endpoint on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

/// Holds all Prometheus metric handles for the node.
#[derive(Clone)]
pub struct NodeMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Grade entries appended through the API.
    pub marks_recorded_total: IntCounter,
    /// Current number of blocks, genesis included.
    pub chain_length: IntGauge,
    /// Responses served from the cache.
    pub cache_hits_total: IntCounter,
    /// Cacheable requests that had to go to the ledger.
    pub cache_misses_total: IntCounter,
    /// Entries currently held by the response cache.
    pub cache_entries: IntGauge,
    /// `/verify` calls that found the chain invalid.
    pub integrity_failures_total: IntCounter,
    /// Ledger operations that exceeded the request timeout.
    pub request_timeouts_total: IntCounter,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("gradechain".into()), None)?;

        let marks_recorded_total = IntCounter::new(
            "marks_recorded_total",
            "Total number of grade entries appended to the chain",
        )?;
        registry.register(Box::new(marks_recorded_total.clone()))?;

        let chain_length = IntGauge::new("chain_length", "Number of blocks in the chain")?;
        registry.register(Box::new(chain_length.clone()))?;

        let cache_hits_total =
            IntCounter::new("cache_hits_total", "Query responses served from the cache")?;
        registry.register(Box::new(cache_hits_total.clone()))?;

        let cache_misses_total = IntCounter::new(
            "cache_misses_total",
            "Cacheable query responses computed from the ledger",
        )?;
        registry.register(Box::new(cache_misses_total.clone()))?;

        let cache_entries = IntGauge::new(
            "cache_entries",
            "Entries held by the response cache, expired ones included until swept",
        )?;
        registry.register(Box::new(cache_entries.clone()))?;

        let integrity_failures_total = IntCounter::new(
            "integrity_failures_total",
            "Verification requests that found the chain invalid",
        )?;
        registry.register(Box::new(integrity_failures_total.clone()))?;

        let request_timeouts_total = IntCounter::new(
            "request_timeouts_total",
            "Ledger operations that exceeded the request timeout",
        )?;
        registry.register(Box::new(request_timeouts_total.clone()))?;

        Ok(Self {
            registry,
            marks_recorded_total,
            chain_length,
            cache_hits_total,
            cache_misses_total,
            cache_entries,
            integrity_failures_total,
            request_timeouts_total,
        })
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
///
/// Returns HTTP 500 if encoding fails (should never happen in practice).
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

/// Router serving only `GET /metrics`, bound to its own listener.
pub fn metrics_router(metrics: SharedMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics)
}
