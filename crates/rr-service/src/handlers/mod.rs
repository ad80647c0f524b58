//! HTTP request handlers for the Room Registry.

pub mod health;
pub mod jwks;
pub mod metrics;
pub mod rooms;

pub use health::{health_check, readiness_check};
pub use jwks::jwks_handler;
pub use metrics::metrics_handler;
pub use rooms::{
    check_access, create_or_join, end_room, heartbeat, invite, issue_credential, list_rooms,
};
