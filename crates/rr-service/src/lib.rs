//! Room Registry (RR) Service Library
//!
//! This library provides the core functionality for the Room Registry -
//! an ephemeral registry of conferencing rooms responsible for:
//!
//! - Room lifecycle (create-or-join, heartbeat, end, stale sweep)
//! - Scoped visibility (personal, team, global) and team invitations
//! - Access decisions for a principal and a room
//! - Signed, capability-restricted media credentials
//!
//! # Architecture
//!
//! The RR follows the Handler -> Service -> Repository pattern:
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> services/*.rs -> repositories/*.rs
//! ```
//!
//! All room mutations go through `repositories::compare_and_update`, a
//! versioned compare-and-swap loop, so concurrent writers never lose updates.
//!
//! # Modules
//!
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Identity and HTTP metrics middleware
//! - `models` - Data models
//! - `observability` - Prometheus metrics
//! - `repositories` - Room stores (in-memory and PostgreSQL)
//! - `routes` - Axum router setup
//! - `services` - Lifecycle, access, sweeper and credential logic
//! - `tasks` - Background tasks

pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod tasks;
