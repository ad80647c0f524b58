//! Stale sweeper background task.
//!
//! Listing always sweeps its scope inline; this ticker additionally keeps
//! scopes that nobody lists from accumulating idle active rooms.
//!
//! # Graceful Shutdown
//!
//! The task supports graceful shutdown via a cancellation token. When the token
//! is cancelled, the task completes its current iteration and exits cleanly.

use crate::repositories::RoomStore;
use crate::services::sweeper;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Start the stale sweeper background task.
///
/// Sweeps all scopes every `interval`. Failures are logged and the loop
/// carries on with the next tick.
///
/// # Returns
///
/// Returns when the cancellation token is triggered.
#[instrument(skip_all, name = "rr.task.stale_sweeper")]
pub async fn start_stale_sweeper(
    store: Arc<dyn RoomStore>,
    interval: Duration,
    cancel_token: CancellationToken,
) {
    info!(
        target: "rr.task.stale_sweeper",
        interval_seconds = interval.as_secs(),
        "Starting stale sweeper task"
    );

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_sweep(store.as_ref()).await;
            }
            _ = cancel_token.cancelled() => {
                info!(
                    target: "rr.task.stale_sweeper",
                    "Stale sweeper received shutdown signal, exiting"
                );
                break;
            }
        }
    }

    info!(target: "rr.task.stale_sweeper", "Stale sweeper task stopped");
}

/// Run a single sweep iteration.
async fn run_sweep(store: &dyn RoomStore) {
    match sweeper::sweep_all(store).await {
        Ok(0) => {}
        Ok(count) => {
            info!(
                target: "rr.task.stale_sweeper",
                swept = count,
                "Deactivated stale rooms"
            );
        }
        Err(e) => {
            warn!(
                target: "rr.task.stale_sweeper",
                error = %e,
                "Stale sweep failed"
            );
        }
    }
}
