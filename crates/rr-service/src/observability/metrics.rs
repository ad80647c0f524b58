//! Metrics definitions for the Room Registry.
//!
//! All metrics follow Prometheus naming conventions:
//! - `rr_` prefix for Room Registry
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `method`: 7 values max (GET, POST, PATCH, DELETE, PUT, HEAD, OPTIONS)
//! - `endpoint`: ~12 values (room ids replaced by `{id}`)
//! - `status`: bounded by error variants plus `success`
//! - `operation`: bounded by code (create_or_join, invite, end, ...)
//! - `scope`: 3 values (personal, team, global)
//! - `media_kind`: 2 values (audio, video)
//!
//! Room ids, principal ids and emails are never used as labels.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("rr_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("rr_room_operation".to_string()),
            &[
                0.001, 0.002, 0.005, 0.010, 0.020, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set room operation buckets: {e}"))?
        // Signing is bounded by an 8s deadline; keep buckets up to it
        .set_buckets_for_metric(
            Matcher::Prefix("rr_credential_signing".to_string()),
            &[
                0.001, 0.002, 0.005, 0.010, 0.025, 0.050, 0.100, 0.500, 1.000, 4.000, 8.000,
            ],
        )
        .map_err(|e| format!("Failed to set credential signing buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("rr_store_query".to_string()),
            &[
                0.001, 0.002, 0.005, 0.010, 0.020, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set store query buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `rr_http_requests_total`, `rr_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
///
/// Captures every response including framework-level rejections
/// (415, 404, 405) produced before a handler runs.
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("rr_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.clone(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("rr_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Normalize endpoint path to prevent label cardinality explosion
fn normalize_endpoint(path: &str) -> String {
    match path {
        "/health" | "/ready" | "/metrics" | "/.well-known/jwks.json" | "/api/v1/rooms" => {
            path.to_string()
        }
        _ => normalize_dynamic_endpoint(path),
    }
}

/// Replace room ids in `/api/v1/rooms/{id}/{action}` with a placeholder.
fn normalize_dynamic_endpoint(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("/api/v1/rooms/") {
        let parts: Vec<&str> = rest.split('/').collect();
        if let [id, action] = parts.as_slice() {
            if !id.is_empty()
                && matches!(
                    *action,
                    "invite" | "access" | "end" | "heartbeat" | "credential"
                )
            {
                return format!("/api/v1/rooms/{{id}}/{action}");
            }
        }
    }

    // Unknown paths normalized to "/other" to bound cardinality
    "/other".to_string()
}

// ============================================================================
// Room Operation Metrics
// ============================================================================

/// Record a lifecycle coordinator operation.
///
/// Metric: `rr_room_operations_total`, `rr_room_operation_duration_seconds`
/// Labels: `operation`, `status`
pub fn record_room_operation(operation: &str, status: &str, duration: Duration) {
    histogram!("rr_room_operation_duration_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("rr_room_operations_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record rooms flipped to inactive by the stale sweeper.
///
/// Metric: `rr_rooms_swept_total`
/// Labels: `scope`
pub fn record_rooms_swept(scope: &str, count: u64) {
    counter!("rr_rooms_swept_total",
        "scope" => scope.to_string()
    )
    .increment(count);
}

/// Record a lost compare-and-update race that triggered a retry.
///
/// Metric: `rr_store_conflicts_total`
/// Labels: `operation`
pub fn record_store_conflict(operation: &str) {
    counter!("rr_store_conflicts_total",
        "operation" => operation.to_string()
    )
    .increment(1);
}

// ============================================================================
// Credential Metrics
// ============================================================================

/// Record a credential issuance attempt.
///
/// Metric: `rr_credentials_issued_total`, `rr_credential_signing_duration_seconds`
/// Labels: `media_kind`, `status`
pub fn record_credential_issued(media_kind: &str, status: &str, duration: Duration) {
    histogram!("rr_credential_signing_duration_seconds").record(duration.as_secs_f64());

    counter!("rr_credentials_issued_total",
        "media_kind" => media_kind.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

// ============================================================================
// Store Metrics
// ============================================================================

/// Record a Postgres store query.
///
/// Metric: `rr_store_query_duration_seconds`
/// Labels: `operation`, `status`
pub fn record_store_query(operation: &str, status: &str, duration: Duration) {
    histogram!("rr_store_query_duration_seconds",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    // Recording without an installed recorder is a no-op; these tests
    // check that the helpers never panic.

    #[test]
    fn test_record_http_request() {
        record_http_request("GET", "/health", 200, Duration::from_millis(5));
        record_http_request("POST", "/api/v1/rooms", 200, Duration::from_millis(20));
        record_http_request(
            "POST",
            "/api/v1/rooms/standup-mon/credential",
            503,
            Duration::from_millis(8000),
        );
    }

    #[test]
    fn test_categorize_status_code() {
        assert_eq!(categorize_status_code(200), "success");
        assert_eq!(categorize_status_code(204), "success");
        assert_eq!(categorize_status_code(408), "timeout");
        assert_eq!(categorize_status_code(504), "timeout");
        assert_eq!(categorize_status_code(400), "error");
        assert_eq!(categorize_status_code(503), "error");
    }

    #[test]
    fn test_normalize_endpoint_known_paths() {
        assert_eq!(normalize_endpoint("/health"), "/health");
        assert_eq!(normalize_endpoint("/ready"), "/ready");
        assert_eq!(normalize_endpoint("/metrics"), "/metrics");
        assert_eq!(normalize_endpoint("/api/v1/rooms"), "/api/v1/rooms");
        assert_eq!(
            normalize_endpoint("/.well-known/jwks.json"),
            "/.well-known/jwks.json"
        );
    }

    #[test]
    fn test_normalize_endpoint_room_paths() {
        assert_eq!(
            normalize_endpoint("/api/v1/rooms/standup-mon/invite"),
            "/api/v1/rooms/{id}/invite"
        );
        assert_eq!(
            normalize_endpoint("/api/v1/rooms/a.b_c/heartbeat"),
            "/api/v1/rooms/{id}/heartbeat"
        );
        assert_eq!(
            normalize_endpoint("/api/v1/rooms/r1/credential"),
            "/api/v1/rooms/{id}/credential"
        );
    }

    #[test]
    fn test_normalize_endpoint_unknown_paths() {
        assert_eq!(normalize_endpoint("/unknown"), "/other");
        assert_eq!(normalize_endpoint("/api/v1/rooms/r1"), "/other");
        assert_eq!(normalize_endpoint("/api/v1/rooms/r1/unknown"), "/other");
        assert_eq!(normalize_endpoint("/api/v1/rooms//end"), "/other");
    }

    #[test]
    fn test_record_domain_metrics() {
        record_room_operation("create_or_join", "success", Duration::from_millis(3));
        record_room_operation("invite", "denied", Duration::from_millis(1));
        record_rooms_swept("team", 2);
        record_store_conflict("create_or_join");
        record_credential_issued("audio", "success", Duration::from_millis(2));
        record_store_query("fetch_room", "success", Duration::from_millis(4));
    }
}
