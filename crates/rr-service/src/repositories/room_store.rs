//! Room store abstraction and the compare-and-update loop.
//!
//! Backends only provide two atomic primitives: insert-if-absent on the room
//! id and a single compare-and-swap on the record version. The retry loop
//! that turns the latter into `CompareAndUpdate` lives here, once, above the
//! trait, so every backend gets the same retry budget and conflict metrics.

use crate::errors::RegistryError;
use crate::models::{Room, ScopeKind};
use crate::observability::metrics;
use async_trait::async_trait;
use tracing::debug;

/// Attempts made by [`compare_and_update`] before giving up.
pub const MAX_UPDATE_ATTEMPTS: usize = 16;

/// A stored value together with its optimistic-concurrency version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: i64,
}

/// Durable keyed table of room records.
///
/// Implementations must make `insert_if_absent` atomic on the id and
/// `replace_if_version` atomic on the (id, version) pair. Nothing else is
/// required of them; there is no in-process lock shared between requests.
#[async_trait]
pub trait RoomStore: Send + Sync {
    /// Short backend name for health output and logs.
    fn backend(&self) -> &'static str;

    /// Insert `room` unless a record with the same id exists.
    ///
    /// Returns `true` if this call created the record.
    async fn insert_if_absent(&self, room: &Room) -> Result<bool, RegistryError>;

    /// Fetch a room and its current version.
    async fn fetch(&self, id: &str) -> Result<Option<Versioned<Room>>, RegistryError>;

    /// Replace the record for `room.id` if its version still equals
    /// `expected_version`, bumping the version on success.
    ///
    /// Returns `false` on a version mismatch (or if the record vanished).
    async fn replace_if_version(
        &self,
        room: &Room,
        expected_version: i64,
    ) -> Result<bool, RegistryError>;

    /// All rooms of the given scope kind, active or not.
    async fn list_in_scope(&self, scope: ScopeKind) -> Result<Vec<Versioned<Room>>, RegistryError>;

    /// Check the backend is reachable.
    async fn ping(&self) -> Result<(), RegistryError>;
}

/// Outcome of a mutator passed to [`compare_and_update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// Persist the mutated room.
    Write,
    /// Nothing to persist; return the room as read.
    Unchanged,
}

/// Insert a room, or return the one that won the race for its id.
///
/// Returns the stored room and whether this call created it.
pub async fn insert_if_absent(
    store: &dyn RoomStore,
    room: Room,
) -> Result<(Room, bool), RegistryError> {
    if store.insert_if_absent(&room).await? {
        return Ok((room, true));
    }

    match store.fetch(&room.id).await? {
        Some(existing) => Ok((existing.value, false)),
        // Rooms are never deleted, so this only happens on a broken backend
        None => Err(RegistryError::TransientStore(
            "room vanished after insert conflict".to_string(),
        )),
    }
}

/// Fetch a room, mapping absence to `NotFound`.
pub async fn get(store: &dyn RoomStore, id: &str) -> Result<Room, RegistryError> {
    store
        .fetch(id)
        .await?
        .map(|v| v.value)
        .ok_or_else(|| RegistryError::NotFound("Room not found".to_string()))
}

/// Apply `mutator` to the freshest version of a room until the write sticks.
///
/// The mutator receives a copy of the latest stored room. It may reject the
/// mutation with an error (propagated as-is), leave the room untouched, or
/// modify it. A lost compare-and-swap re-reads and re-runs the mutator, so it
/// must decide purely from the room it is given.
///
/// Returns `Ok(None)` if the room does not exist.
///
/// # Errors
///
/// - `TransientStore` once [`MAX_UPDATE_ATTEMPTS`] swaps have been lost
/// - any error returned by the mutator or the backend
pub async fn compare_and_update<F>(
    store: &dyn RoomStore,
    id: &str,
    operation: &'static str,
    mut mutator: F,
) -> Result<Option<Room>, RegistryError>
where
    F: FnMut(&mut Room) -> Result<Mutation, RegistryError> + Send,
{
    for attempt in 1..=MAX_UPDATE_ATTEMPTS {
        let Some(current) = store.fetch(id).await? else {
            return Ok(None);
        };

        let mut room = current.value;
        if mutator(&mut room)? == Mutation::Unchanged {
            return Ok(Some(room));
        }

        if store.replace_if_version(&room, current.version).await? {
            return Ok(Some(room));
        }

        metrics::record_store_conflict(operation);
        debug!(
            target: "rr.repository.rooms",
            room_id = %id,
            operation,
            attempt,
            "Compare-and-update lost race, retrying"
        );
        tokio::task::yield_now().await;
    }

    Err(RegistryError::TransientStore(format!(
        "{operation}: compare-and-update retries exhausted"
    )))
}
