//! Stale sweeper.
//!
//! Flips active rooms whose last activity is older than their media-kind
//! TTL to inactive. Runs inline before every listing and, optionally, from
//! the background ticker in `tasks::stale_sweeper`.

use crate::errors::RegistryError;
use crate::models::ScopeKind;
use crate::observability::metrics;
use crate::repositories::{compare_and_update, Mutation, RoomStore};
use chrono::{DateTime, Utc};
use tracing::instrument;

/// Sweep `scope` using the current time.
///
/// Returns the number of rooms this call deactivated.
pub async fn sweep(store: &dyn RoomStore, scope: ScopeKind) -> Result<u64, RegistryError> {
    sweep_at(store, scope, Utc::now()).await
}

/// Sweep `scope` as of `now`.
///
/// Staleness is re-checked on the freshest version inside the
/// compare-and-update, so a heartbeat racing the sweep wins.
#[instrument(skip_all, name = "rr.sweeper.sweep", fields(scope = %scope))]
pub async fn sweep_at(
    store: &dyn RoomStore,
    scope: ScopeKind,
    now: DateTime<Utc>,
) -> Result<u64, RegistryError> {
    let candidates: Vec<String> = store
        .list_in_scope(scope)
        .await?
        .into_iter()
        .filter(|entry| entry.value.is_stale_at(now))
        .map(|entry| entry.value.id)
        .collect();

    let mut swept = 0u64;
    for id in candidates {
        let mut deactivated = false;
        compare_and_update(store, &id, "sweep", |room| {
            deactivated = false;
            if !room.is_stale_at(now) {
                return Ok(Mutation::Unchanged);
            }
            room.active = false;
            deactivated = true;
            Ok(Mutation::Write)
        })
        .await?;

        if deactivated {
            swept += 1;
            tracing::info!(
                target: "rr.services.sweeper",
                room_id = %id,
                scope = %scope,
                "Stale room deactivated"
            );
        }
    }

    if swept > 0 {
        metrics::record_rooms_swept(scope.as_str(), swept);
    }

    Ok(swept)
}

/// Sweep every scope. Used by the background ticker.
pub async fn sweep_all(store: &dyn RoomStore) -> Result<u64, RegistryError> {
    let now = Utc::now();
    let mut total = 0;
    for scope in ScopeKind::ALL {
        total += sweep_at(store, scope, now).await?;
    }
    Ok(total)
}
