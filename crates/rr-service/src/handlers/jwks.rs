//! JWKS endpoint for credential verification.
//!
//! The media transport fetches this document to verify credentials issued
//! by the registry.

use crate::models::Jwks;
use crate::routes::AppState;
use axum::{
    extract::State,
    http::header::{HeaderMap, HeaderValue, CACHE_CONTROL},
    Json,
};
use std::sync::Arc;
use tracing::instrument;

/// Handle JWKS request
///
/// GET /.well-known/jwks.json
///
/// Returns the credential signing key in JWKS format (RFC 7517), or an
/// empty key set when signing is not configured.
#[instrument(name = "rr.jwks.get", skip_all)]
pub async fn jwks_handler(State(state): State<Arc<AppState>>) -> (HeaderMap, Json<Jwks>) {
    let mut headers = HeaderMap::new();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("max-age=3600"));

    (headers, Json(state.coordinator.issuer().jwks()))
}
