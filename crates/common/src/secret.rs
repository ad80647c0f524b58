//! Secret types for protecting sensitive values from accidental logging.
//!
//! This module re-exports types from the [`secrecy`] crate with room registry
//! guidance. Use these types for all sensitive values like signing keys,
//! issued credentials, and database URLs.
//!
//! # Compile-Time Safety
//!
//! The key insight is that `SecretBox<T>` and `SecretString` implement `Debug`
//! with redaction, so any code that derives `Debug` on a struct containing secrets
//! will automatically get safe logging behavior. This makes it **impossible** to
//! accidentally log secrets via `{:?}` or tracing.
//!
//! # Memory Safety
//!
//! Secrets are automatically zeroized when dropped, preventing sensitive
//! data from lingering in memory after use.
//!
//! # Example
//!
//! ```rust
//! use common::secret::SecretString;
//! use secrecy::ExposeSecret;
//!
//! #[derive(Debug)]
//! struct StoreSettings {
//!     backend: String,
//!     database_url: SecretString,  // Safe: Debug shows "[REDACTED]"
//! }
//!
//! let settings = StoreSettings {
//!     backend: "postgres".to_string(),
//!     database_url: SecretString::from("postgresql://rr:hunter2@db/rooms"),
//! };
//!
//! // This is safe - the URL is redacted
//! println!("{:?}", settings);
//!
//! // To access the actual value, you must explicitly call expose_secret()
//! let url: &str = settings.database_url.expose_secret();
//! ```
//!
//! # Usage Guidelines
//!
//! Use `SecretString` for:
//! - Database URLs (may embed passwords)
//! - Signing keys as base64 strings read from the environment
//!
//! Use `SecretBox<T>` for:
//! - Decoded binary key material (e.g., `SecretBox<Vec<u8>>` for PKCS#8 documents)
//!
//! # Serde Integration
//!
//! With the `serde` feature enabled, secrets can be deserialized from JSON:
//!
//! ```rust
//! use serde::Deserialize;
//! use common::secret::SecretString;
//!
//! #[derive(Debug, Deserialize)]
//! struct SigningKeyConfig {
//!     key_id: String,
//!     private_key: SecretString,
//! }
//!
//! let json = r#"{"key_id": "rr-signing-key", "private_key": "MC4CAQAw..."}"#;
//! let key: SigningKeyConfig = serde_json::from_str(json).unwrap();
//!
//! // Debug output is safe
//! println!("{:?}", key);
//! // key_id is visible, private_key is redacted
//! ```

// Re-export the main types from secrecy
pub use secrecy::{ExposeSecret, SecretBox, SecretString};
