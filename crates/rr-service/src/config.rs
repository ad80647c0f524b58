//! Room Registry configuration.
//!
//! Configuration is loaded from environment variables. All sensitive
//! fields are redacted in Debug output.

use common::jwt::{decode_signing_key, DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

use crate::models::DEFAULT_GLOBAL_REF;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default `kid` placed in credential headers.
pub const DEFAULT_SIGNING_KEY_ID: &str = "rr-signing-key";

/// Default credential `iss` claim.
pub const DEFAULT_CREDENTIAL_ISSUER: &str = "room-registry";

/// Default credential `aud` claim.
pub const DEFAULT_CREDENTIAL_AUDIENCE: &str = "media-transport";

/// Default deadline for a single credential signing operation.
pub const DEFAULT_SIGNING_TIMEOUT_MS: u64 = 8000;

/// Default graceful shutdown drain period.
pub const DEFAULT_DRAIN_SECONDS: u64 = 30;

/// Room Registry configuration.
///
/// Loaded from environment variables with sensible defaults.
/// The database URL and signing key are redacted in Debug output.
#[derive(Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// PostgreSQL connection URL. `None` selects the in-memory store.
    pub database_url: Option<SecretString>,

    /// Base64 PKCS#8 Ed25519 key used to sign credentials.
    /// `None` means credential issuance fails with a configuration error.
    pub signing_key: Option<SecretString>,

    /// `kid` header of issued credentials.
    pub signing_key_id: String,

    /// `iss` claim of issued credentials.
    pub credential_issuer: String,

    /// `aud` claim of issued credentials.
    pub credential_audience: String,

    /// Seconds subtracted from `iat` to produce `nbf`.
    pub credential_clock_skew_seconds: i64,

    /// Deadline for a single signing operation, in milliseconds.
    pub signing_timeout_ms: u64,

    /// Global tag used when a Global room or listing supplies none.
    pub default_global_ref: String,

    /// Background sweep interval. 0 disables the ticker; listing still sweeps.
    pub sweep_interval_seconds: u64,

    /// Graceful shutdown drain period (default: 30).
    pub drain_seconds: u64,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field(
                "signing_key",
                &self.signing_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("signing_key_id", &self.signing_key_id)
            .field("credential_issuer", &self.credential_issuer)
            .field("credential_audience", &self.credential_audience)
            .field(
                "credential_clock_skew_seconds",
                &self.credential_clock_skew_seconds,
            )
            .field("signing_timeout_ms", &self.signing_timeout_ms)
            .field("default_global_ref", &self.default_global_ref)
            .field("sweep_interval_seconds", &self.sweep_interval_seconds)
            .field("drain_seconds", &self.drain_seconds)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid signing key: {0}")]
    InvalidSigningKey(String),

    #[error("Invalid clock skew configuration: {0}")]
    InvalidClockSkew(String),

    #[error("Invalid signing timeout configuration: {0}")]
    InvalidSigningTimeout(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let database_url = vars
            .get("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .map(|v| SecretString::from(v.clone()));

        // Reject malformed key material at startup rather than on first issue
        let signing_key = match vars.get("RR_SIGNING_KEY").filter(|v| !v.trim().is_empty()) {
            Some(value) => {
                decode_signing_key(value)
                    .map_err(|e| ConfigError::InvalidSigningKey(e.to_string()))?;
                Some(SecretString::from(value.clone()))
            }
            None => None,
        };

        let signing_key_id = non_empty_or(vars, "RR_SIGNING_KEY_ID", DEFAULT_SIGNING_KEY_ID)?;
        let credential_issuer =
            non_empty_or(vars, "RR_CREDENTIAL_ISSUER", DEFAULT_CREDENTIAL_ISSUER)?;
        let credential_audience =
            non_empty_or(vars, "RR_CREDENTIAL_AUDIENCE", DEFAULT_CREDENTIAL_AUDIENCE)?;
        let default_global_ref =
            non_empty_or(vars, "RR_DEFAULT_GLOBAL_REF", DEFAULT_GLOBAL_REF)?;

        // Parse credential clock skew with validation
        let credential_clock_skew_seconds = if let Some(value_str) =
            vars.get("RR_CREDENTIAL_CLOCK_SKEW_SECONDS")
        {
            let value: i64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidClockSkew(format!(
                    "RR_CREDENTIAL_CLOCK_SKEW_SECONDS must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value <= 0 {
                return Err(ConfigError::InvalidClockSkew(format!(
                    "RR_CREDENTIAL_CLOCK_SKEW_SECONDS must be positive, got {}",
                    value
                )));
            }

            if value > MAX_CLOCK_SKEW.as_secs() as i64 {
                return Err(ConfigError::InvalidClockSkew(format!(
                    "RR_CREDENTIAL_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW.as_secs(),
                    value
                )));
            }

            value
        } else {
            DEFAULT_CLOCK_SKEW.as_secs() as i64
        };

        let signing_timeout_ms = if let Some(value_str) = vars.get("RR_SIGNING_TIMEOUT_MS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidSigningTimeout(format!(
                    "RR_SIGNING_TIMEOUT_MS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidSigningTimeout(
                    "RR_SIGNING_TIMEOUT_MS must be greater than 0".to_string(),
                ));
            }

            value
        } else {
            DEFAULT_SIGNING_TIMEOUT_MS
        };

        let sweep_interval_seconds = parse_u64_or(vars, "RR_SWEEP_INTERVAL_SECONDS", 0)?;
        let drain_seconds = parse_u64_or(vars, "RR_DRAIN_SECONDS", DEFAULT_DRAIN_SECONDS)?;

        Ok(Config {
            bind_address,
            database_url,
            signing_key,
            signing_key_id,
            credential_issuer,
            credential_audience,
            credential_clock_skew_seconds,
            signing_timeout_ms,
            default_global_ref,
            sweep_interval_seconds,
            drain_seconds,
        })
    }
}

fn non_empty_or(
    vars: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<String, ConfigError> {
    match vars.get(key) {
        Some(value) if value.trim().is_empty() => Err(ConfigError::InvalidValue(format!(
            "{} must not be empty",
            key
        ))),
        Some(value) => Ok(value.trim().to_string()),
        None => Ok(default.to_string()),
    }
}

fn parse_u64_or(
    vars: &HashMap<String, String>,
    key: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    match vars.get(key) {
        Some(value_str) => value_str.parse().map_err(|e| {
            ConfigError::InvalidValue(format!(
                "{} must be a valid non-negative integer, got '{}': {}",
                key, value_str, e
            ))
        }),
        None => Ok(default),
    }
}
