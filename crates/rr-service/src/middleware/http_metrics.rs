//! HTTP metrics middleware for capturing all request/response metrics
//!
//! Captures metrics for every HTTP response, including framework-level
//! errors that occur before handlers run:
//! - 415 Unsupported Media Type (wrong Content-Type)
//! - 401 Unauthorized (missing identity headers)
//! - 404 Not Found
//! - 405 Method Not Allowed

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::observability::metrics::record_http_request;

/// Middleware that records HTTP request metrics for all responses
///
/// Applied as the outermost layer so it sees every response.
pub async fn http_metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    record_http_request(&method, &path, response.status().as_u16(), start.elapsed());

    response
}
