//! Room Registry error types.
//!
//! All errors map to appropriate HTTP status codes via the `IntoResponse` impl.
//! Messages of server-side failures returned to clients are generic; the
//! actual errors are logged server-side.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Room Registry error type.
///
/// Maps to HTTP status codes:
/// - Validation: 400 Bad Request
/// - Unauthenticated: 401 Unauthorized
/// - Authorization: 403 Forbidden
/// - NotFound: 404 Not Found
/// - Configuration, Database, Internal: 500 Internal Server Error
/// - TransientStore, CredentialTimeout: 503 Service Unavailable (retryable)
///
/// Compare-and-update conflicts never appear here; they are retried inside
/// the repository layer and only surface as `TransientStore` once the retry
/// budget is exhausted.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Transient store error: {0}")]
    TransientStore(String),

    #[error("Credential signing timed out")]
    CredentialTimeout,
}

impl RegistryError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            RegistryError::Validation(_) => 400,
            RegistryError::Unauthenticated(_) => 401,
            RegistryError::Authorization(_) => 403,
            RegistryError::NotFound(_) => 404,
            RegistryError::Configuration(_)
            | RegistryError::Database(_)
            | RegistryError::Internal(_) => 500,
            RegistryError::TransientStore(_) | RegistryError::CredentialTimeout => 503,
        }
    }

    /// Whether the caller should retry with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RegistryError::TransientStore(_) | RegistryError::CredentialTimeout
        )
    }

    /// Short label for the `status` dimension of operation metrics.
    pub fn metric_label(&self) -> &'static str {
        match self {
            RegistryError::Validation(_) => "validation",
            RegistryError::Unauthenticated(_) => "unauthenticated",
            RegistryError::Authorization(_) => "denied",
            RegistryError::NotFound(_) => "not_found",
            RegistryError::Configuration(_) => "configuration",
            RegistryError::Database(_) => "database",
            RegistryError::Internal(_) => "internal",
            RegistryError::TransientStore(_) => "transient",
            RegistryError::CredentialTimeout => "timeout",
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for RegistryError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            RegistryError::Validation(reason) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", reason.clone())
            }
            RegistryError::Unauthenticated(reason) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED", reason.clone())
            }
            RegistryError::Authorization(reason) => {
                (StatusCode::FORBIDDEN, "FORBIDDEN", reason.clone())
            }
            RegistryError::NotFound(resource) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", resource.clone())
            }
            RegistryError::Configuration(err) => {
                tracing::error!(target: "rr.config", error = %err, "Configuration error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CONFIGURATION_ERROR",
                    "The service is not configured for this operation".to_string(),
                )
            }
            RegistryError::Database(err) => {
                // Log actual error server-side, return generic message to client
                tracing::error!(target: "rr.database", error = %err, "Database operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "An internal database error occurred".to_string(),
                )
            }
            RegistryError::Internal(err) => {
                tracing::error!(target: "rr.internal", error = %err, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
            RegistryError::TransientStore(reason) => {
                tracing::warn!(target: "rr.availability", reason = %reason, "Store contention");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "TRANSIENT_STORE_ERROR",
                    "The store is busy. Please retry.".to_string(),
                )
            }
            RegistryError::CredentialTimeout => (
                StatusCode::SERVICE_UNAVAILABLE,
                "CREDENTIAL_TIMEOUT",
                "Credential signing timed out. Please retry.".to_string(),
            ),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        if self.is_retryable() {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
        }

        response
    }
}

/// Convert sqlx errors to RegistryError
impl From<sqlx::Error> for RegistryError {
    fn from(err: sqlx::Error) -> Self {
        RegistryError::Database(err.to_string())
    }
}
