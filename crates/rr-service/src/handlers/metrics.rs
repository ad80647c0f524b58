//! Prometheus metrics endpoint handler.
//!
//! # Security
//!
//! This endpoint is unauthenticated to allow Prometheus to scrape metrics.
//! Labels never carry room ids, principal ids or emails.

use axum::{extract::State, response::IntoResponse};
use metrics_exporter_prometheus::PrometheusHandle;

/// Handler for GET /metrics
///
/// Returns Prometheus-formatted metrics for scraping:
/// ```text
/// # TYPE rr_room_operations_total counter
/// rr_room_operations_total{operation="create_or_join",status="success"} 42
/// ```
#[tracing::instrument(skip_all, name = "rr.metrics.scrape")]
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}
