//! Common utilities shared across room registry components.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT utilities (signing, verification, key handling)
pub mod jwt;
