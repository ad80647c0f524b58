//! Observability module for the Room Registry.
//!
//! Provides metrics definitions and recording helpers.

pub mod metrics;
