//! Middleware for the Room Registry.
//!
//! # Components
//!
//! - `principal` - trusted identity headers to `Principal`
//! - `http_metrics` - HTTP request metrics middleware

pub mod http_metrics;
pub mod principal;

pub use http_metrics::http_metrics_middleware;
pub use principal::require_principal;
