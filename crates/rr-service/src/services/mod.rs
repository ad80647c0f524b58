//! Service layer for the Room Registry.
//!
//! # Components
//!
//! - `access` - pure access evaluator
//! - `credentials` - signed, time-bounded media credentials
//! - `sweeper` - deactivation of idle rooms
//! - `lifecycle` - registry operations composing the above

pub mod access;
pub mod credentials;
pub mod lifecycle;
pub mod sweeper;

pub use credentials::{CredentialClaims, CredentialIssuer, CredentialSigner, Ed25519Signer};
pub use lifecycle::LifecycleCoordinator;
