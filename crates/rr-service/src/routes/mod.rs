//! HTTP routes for the Room Registry.
//!
//! Defines the Axum router and application state.

use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_principal};
use crate::services::LifecycleCoordinator;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Registry operations (store, evaluator, sweeper, issuer).
    pub coordinator: LifecycleCoordinator,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness check - public
/// - `/ready` - Readiness check (store ping) - public
/// - `/metrics` - Prometheus metrics endpoint - public
/// - `/.well-known/jwks.json` - Credential verification key - public
/// - `/api/v1/rooms[/:id/..]` - Room operations - require identity headers
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
///
/// `metrics_handle` is optional so tests can build the router without
/// installing a global recorder.
pub fn build_routes(state: Arc<AppState>, metrics_handle: Option<PrometheusHandle>) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/.well-known/jwks.json", get(handlers::jwks_handler))
        .with_state(state.clone());

    let room_routes = Router::new()
        .route(
            "/api/v1/rooms",
            post(handlers::create_or_join).get(handlers::list_rooms),
        )
        .route("/api/v1/rooms/:id/invite", post(handlers::invite))
        .route("/api/v1/rooms/:id/access", get(handlers::check_access))
        .route("/api/v1/rooms/:id/end", post(handlers::end_room))
        .route("/api/v1/rooms/:id/heartbeat", post(handlers::heartbeat))
        .route(
            "/api/v1/rooms/:id/credential",
            post(handlers::issue_credential),
        )
        .route_layer(middleware::from_fn(require_principal))
        .with_state(state);

    let mut router = public_routes.merge(room_routes);

    if let Some(handle) = metrics_handle {
        let metrics_routes = Router::new()
            .route("/metrics", get(handlers::metrics_handler))
            .with_state(handle);
        router = router.merge(metrics_routes);
    }

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    // 3. http_metrics_middleware - Record ALL responses (outermost)
    router
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}
