//! Background tasks for the Room Registry.
//!
//! # Tasks
//!
//! - `stale_sweeper` - Periodically deactivates idle rooms in every scope

pub mod stale_sweeper;

pub use stale_sweeper::start_stale_sweeper;
