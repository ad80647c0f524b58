//! # RR Test Utilities
//!
//! Shared test utilities for the Room Registry (RR) service.
//!
//! This crate provides:
//! - Deterministic Ed25519 signing keys (`crypto_fixtures`)
//! - Ready-made principals (`principals`)
//! - Server test harness (`TestRegistryServer` for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rr_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let server = TestRegistryServer::spawn().await?;
//!
//!     let response = server
//!         .as_principal(&alice())
//!         .get(format!("{}/api/v1/rooms?scope=global", server.url()))
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod crypto_fixtures;
pub mod principals;
pub mod server_harness;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use principals::*;
pub use server_harness::*;
