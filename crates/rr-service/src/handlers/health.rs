//! Health check handlers.
//!
//! - `/health`: Liveness check - returns OK if the process is running
//! - `/ready`: Readiness check - checks the room store

use crate::models::ReadinessResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;

/// Liveness check handler.
///
/// Does NOT check any dependencies.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Readiness check handler.
///
/// Returns 200 if the store answers, 503 otherwise. A missing signing key
/// is reported but does not make the service unready: rooms still work,
/// only credential issuance fails.
#[tracing::instrument(skip_all, name = "rr.health.readiness")]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let store = state.coordinator.store();
    let credentials = if state.coordinator.issuer().is_configured() {
        "configured"
    } else {
        "not_configured"
    };

    if let Err(e) = store.ping().await {
        tracing::warn!(target: "rr.health", error = %e, "Readiness check failed: store unavailable");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                status: "not_ready",
                store: store.backend(),
                store_status: Some("unhealthy"),
                credentials,
                error: Some("Service dependencies unavailable".to_string()),
            }),
        );
    }

    (
        StatusCode::OK,
        Json(ReadinessResponse {
            status: "ready",
            store: store.backend(),
            store_status: Some("healthy"),
            credentials,
            error: None,
        }),
    )
}
