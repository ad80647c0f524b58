//! Identity middleware for room routes.
//!
//! The registry sits behind the identity layer, which authenticates the
//! caller and forwards the verified principal in trusted headers. This
//! middleware turns those headers into a [`Principal`] request extension.
//! It does not authenticate anything itself.

use crate::errors::RegistryError;
use crate::models::Principal;
use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::IntoResponse,
};
use tracing::instrument;

/// Verified principal id.
pub const PRINCIPAL_ID_HEADER: &str = "x-principal-id";
/// Display name.
pub const PRINCIPAL_NAME_HEADER: &str = "x-principal-name";
/// Verified email.
pub const PRINCIPAL_EMAIL_HEADER: &str = "x-principal-email";
/// Avatar URL (optional).
pub const PRINCIPAL_AVATAR_HEADER: &str = "x-principal-avatar";

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Build a principal from identity headers.
///
/// Id and email are required; the name falls back to the id.
pub fn principal_from_headers(headers: &HeaderMap) -> Result<Principal, RegistryError> {
    let id = header_value(headers, PRINCIPAL_ID_HEADER).ok_or_else(|| {
        tracing::debug!(target: "rr.middleware.principal", "Missing principal id header");
        RegistryError::Unauthenticated("Missing principal identity".to_string())
    })?;

    let email = header_value(headers, PRINCIPAL_EMAIL_HEADER).ok_or_else(|| {
        tracing::debug!(target: "rr.middleware.principal", "Missing principal email header");
        RegistryError::Unauthenticated("Missing principal identity".to_string())
    })?;

    Ok(Principal {
        name: header_value(headers, PRINCIPAL_NAME_HEADER).unwrap_or_else(|| id.clone()),
        avatar: header_value(headers, PRINCIPAL_AVATAR_HEADER),
        id,
        email,
    })
}

/// Reject requests without identity headers; inject the `Principal` otherwise.
///
/// # Response
///
/// - Returns 401 Unauthorized if the id or email header is missing
/// - Continues to next handler with `Principal` in extensions otherwise
#[instrument(skip_all, name = "rr.middleware.principal")]
pub async fn require_principal(
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, RegistryError> {
    let principal = principal_from_headers(req.headers())?;
    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn test_full_identity() {
        let p = principal_from_headers(&headers(&[
            (PRINCIPAL_ID_HEADER, "u1"),
            (PRINCIPAL_NAME_HEADER, "Alice"),
            (PRINCIPAL_EMAIL_HEADER, "a@x.com"),
            (PRINCIPAL_AVATAR_HEADER, "https://cdn/a.png"),
        ]))
        .unwrap();
        assert_eq!(p.id, "u1");
        assert_eq!(p.name, "Alice");
        assert_eq!(p.email, "a@x.com");
        assert_eq!(p.avatar.as_deref(), Some("https://cdn/a.png"));
    }

    #[test]
    fn test_name_defaults_to_id() {
        let p = principal_from_headers(&headers(&[
            (PRINCIPAL_ID_HEADER, "u1"),
            (PRINCIPAL_EMAIL_HEADER, "a@x.com"),
        ]))
        .unwrap();
        assert_eq!(p.name, "u1");
        assert!(p.avatar.is_none());
    }

    #[test]
    fn test_missing_id_or_email_is_unauthenticated() {
        let no_id = principal_from_headers(&headers(&[(PRINCIPAL_EMAIL_HEADER, "a@x.com")]));
        assert!(matches!(no_id, Err(RegistryError::Unauthenticated(_))));

        let blank_email = principal_from_headers(&headers(&[
            (PRINCIPAL_ID_HEADER, "u1"),
            (PRINCIPAL_EMAIL_HEADER, "  "),
        ]));
        assert!(matches!(blank_email, Err(RegistryError::Unauthenticated(_))));
    }
}
