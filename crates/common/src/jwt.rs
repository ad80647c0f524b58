//! JWT utilities shared across room registry components.
//!
//! This module provides:
//! - Size limits for DoS prevention
//! - Clock skew constants for `nbf` back-dating
//! - Key ID extraction from JWT headers
//! - `EdDSA` (Ed25519) signing and verification helpers
//! - Signing key decoding and public key derivation
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only `EdDSA` (Ed25519) algorithm is accepted
//! - Generic error messages prevent information leakage
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{decode_signing_key, sign_eddsa, verify_eddsa, VerifyOptions};
//!
//! let pkcs8 = decode_signing_key(&base64_key)?;
//! let token = sign_eddsa(&claims, &pkcs8, "rr-signing-key")?;
//!
//! let options = VerifyOptions::new("room-registry", "media-transport");
//! let claims: MyClaims = verify_eddsa(&token, &public_key, &options)?;
//! ```

use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use ring::signature::{Ed25519KeyPair, KeyPair};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// Tokens larger than this are rejected BEFORE any base64 decoding or
/// signature verification.
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Default clock skew allowance subtracted from `iat` to produce `nbf`.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(10);

/// Maximum configurable clock skew allowance.
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(60);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during JWT validation.
///
/// Note: Error messages are intentionally generic to prevent information leakage.
/// Detailed information is logged at debug level for troubleshooting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token format is invalid (not a valid JWT structure).
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// Token is missing required `kid` header.
    #[error("The access token is invalid or expired")]
    MissingKid,

    /// Signature, expiry, not-before, issuer or audience check failed.
    #[error("The access token is invalid or expired")]
    Rejected,
}

/// Errors that can occur while preparing key material or signing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtSigningError {
    /// Key material is not valid base64 or not an Ed25519 PKCS#8 document.
    #[error("Invalid signing key: {0}")]
    InvalidKey(String),

    /// The signing operation itself failed.
    #[error("JWT signing operation failed")]
    SigningFailed,
}

// =============================================================================
// Key material
// =============================================================================

/// Decode a base64 (standard alphabet) Ed25519 PKCS#8 signing key.
///
/// Both PKCS#8 v1 (seed only) and v2 (seed + public key) documents are accepted.
///
/// # Errors
///
/// Returns `JwtSigningError::InvalidKey` if the input is not valid base64 or
/// does not parse as an Ed25519 private key.
pub fn decode_signing_key(key_b64: &str) -> Result<Vec<u8>, JwtSigningError> {
    let pkcs8 = STANDARD
        .decode(key_b64.trim())
        .map_err(|e| JwtSigningError::InvalidKey(format!("not valid base64: {e}")))?;

    Ed25519KeyPair::from_pkcs8_maybe_unchecked(&pkcs8)
        .map_err(|e| JwtSigningError::InvalidKey(format!("not an Ed25519 PKCS#8 key: {e}")))?;

    Ok(pkcs8)
}

/// Derive the raw 32-byte Ed25519 public key from a PKCS#8 private key.
///
/// # Errors
///
/// Returns `JwtSigningError::InvalidKey` if the document cannot be parsed.
pub fn public_key_from_pkcs8(private_key_pkcs8: &[u8]) -> Result<Vec<u8>, JwtSigningError> {
    let key_pair = Ed25519KeyPair::from_pkcs8_maybe_unchecked(private_key_pkcs8)
        .map_err(|e| JwtSigningError::InvalidKey(format!("not an Ed25519 PKCS#8 key: {e}")))?;

    Ok(key_pair.public_key().as_ref().to_vec())
}

/// Encode a raw public key as the `x` member of an OKP JWK (base64url, no padding).
#[must_use]
pub fn encode_public_key_jwk(public_key: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(public_key)
}

// =============================================================================
// Signing and verification
// =============================================================================

/// Sign claims as an `EdDSA` JWT carrying `kid` in its header.
///
/// # Errors
///
/// - `InvalidKey` - the PKCS#8 document is not an Ed25519 key
/// - `SigningFailed` - the encoder rejected the claims or key
pub fn sign_eddsa<T: Serialize>(
    claims: &T,
    private_key_pkcs8: &[u8],
    key_id: &str,
) -> Result<String, JwtSigningError> {
    Ed25519KeyPair::from_pkcs8_maybe_unchecked(private_key_pkcs8).map_err(|_| {
        tracing::error!(target: "common.jwt", "Invalid private key format");
        JwtSigningError::InvalidKey("not an Ed25519 PKCS#8 key".to_string())
    })?;

    let encoding_key = EncodingKey::from_ed_der(private_key_pkcs8);

    let mut header = Header::new(Algorithm::EdDSA);
    header.typ = Some("JWT".to_string());
    header.kid = Some(key_id.to_string());

    encode(&header, claims, &encoding_key).map_err(|e| {
        tracing::error!(target: "common.jwt", error = %e, "JWT signing operation failed");
        JwtSigningError::SigningFailed
    })
}

/// Expected `iss`/`aud` values for [`verify_eddsa`].
#[derive(Debug, Clone)]
pub struct VerifyOptions {
    /// Required `iss` claim.
    pub issuer: String,
    /// Required `aud` claim.
    pub audience: String,
}

impl VerifyOptions {
    /// Creates verification options for the given issuer and audience.
    #[must_use]
    pub fn new(issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
        }
    }
}

/// Verify an `EdDSA` JWT against a raw Ed25519 public key.
///
/// Validates size, signature, `exp`, `nbf`, `iss` and `aud`.
///
/// # Errors
///
/// - `TokenTooLarge` - token exceeds `MAX_JWT_SIZE_BYTES`
/// - `Rejected` - any cryptographic or claim check failed
pub fn verify_eddsa<T: DeserializeOwned>(
    token: &str,
    public_key: &[u8],
    options: &VerifyOptions,
) -> Result<T, JwtValidationError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    let decoding_key = DecodingKey::from_ed_der(public_key);

    let mut validation = Validation::new(Algorithm::EdDSA);
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.set_issuer(&[options.issuer.as_str()]);
    validation.set_audience(&[options.audience.as_str()]);

    let data = decode::<T>(token, &decoding_key, &validation).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Token verification failed");
        JwtValidationError::Rejected
    })?;

    Ok(data.claims)
}

/// Extract the `kid` (key ID) from a JWT header without verifying the signature.
///
/// The media transport uses this to pick the verification key from the
/// registry's JWKS document. The token MUST still be verified afterwards.
///
/// # Errors
///
/// - `TokenTooLarge` - token exceeds size limit
/// - `MalformedToken` - wrong structure, bad base64 or invalid JSON
/// - `MissingKid` - header has no non-empty string `kid`
pub fn extract_kid(token: &str) -> Result<String, JwtValidationError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        tracing::debug!(
            target: "common.jwt",
            parts = parts.len(),
            "Token rejected: invalid JWT format"
        );
        return Err(JwtValidationError::MalformedToken);
    }

    let header_part = parts.first().ok_or(JwtValidationError::MalformedToken)?;
    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header base64");
        JwtValidationError::MalformedToken
    })?;

    let header: serde_json::Value = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
        JwtValidationError::MalformedToken
    })?;

    header
        .get("kid")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or(JwtValidationError::MissingKid)
}
