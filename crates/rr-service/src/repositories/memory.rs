//! In-process room store.
//!
//! Used when no `DATABASE_URL` is configured and by the test harness. The
//! map lock is only held for the duration of a single primitive, never
//! across a whole compare-and-update cycle.

use super::room_store::{RoomStore, Versioned};
use crate::errors::RegistryError;
use crate::models::{Room, ScopeKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Room store backed by a `HashMap` behind a `tokio` `RwLock`.
#[derive(Debug, Default)]
pub struct InMemoryRoomStore {
    rooms: RwLock<HashMap<String, Versioned<Room>>>,
}

impl InMemoryRoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rooms, active or not.
    pub async fn len(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Whether the store holds no rooms.
    pub async fn is_empty(&self) -> bool {
        self.rooms.read().await.is_empty()
    }

    /// Overwrite a room's `last_activity`, bumping its version.
    ///
    /// Lets tests simulate idle rooms without waiting for a TTL to pass.
    /// Returns `false` if the room does not exist.
    pub async fn backdate_last_activity(&self, id: &str, last_activity: DateTime<Utc>) -> bool {
        let mut rooms = self.rooms.write().await;
        match rooms.get_mut(id) {
            Some(entry) => {
                entry.value.last_activity = last_activity;
                entry.version += 1;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl RoomStore for InMemoryRoomStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn insert_if_absent(&self, room: &Room) -> Result<bool, RegistryError> {
        let mut rooms = self.rooms.write().await;
        if rooms.contains_key(&room.id) {
            return Ok(false);
        }
        rooms.insert(
            room.id.clone(),
            Versioned {
                value: room.clone(),
                version: 1,
            },
        );
        Ok(true)
    }

    async fn fetch(&self, id: &str) -> Result<Option<Versioned<Room>>, RegistryError> {
        Ok(self.rooms.read().await.get(id).cloned())
    }

    async fn replace_if_version(
        &self,
        room: &Room,
        expected_version: i64,
    ) -> Result<bool, RegistryError> {
        let mut rooms = self.rooms.write().await;
        match rooms.get_mut(&room.id) {
            Some(entry) if entry.version == expected_version => {
                entry.value = room.clone();
                entry.version += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_in_scope(&self, scope: ScopeKind) -> Result<Vec<Versioned<Room>>, RegistryError> {
        Ok(self
            .rooms
            .read()
            .await
            .values()
            .filter(|entry| entry.value.scope.kind() == scope)
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<(), RegistryError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::{MediaKind, Principal, RoomScope};
    use chrono::Duration;

    fn room(id: &str, scope: RoomScope) -> Room {
        let now = Utc::now();
        Room {
            id: id.to_string(),
            title: id.to_string(),
            media_kind: MediaKind::Audio,
            scope,
            owner: Principal {
                id: "u1".to_string(),
                name: "Alice".to_string(),
                email: "a@x.com".to_string(),
                avatar: None,
            },
            participant_count: 1,
            active: true,
            created_at: now,
            last_activity: now,
        }
    }

    #[tokio::test]
    async fn test_insert_if_absent_is_unique_on_id() {
        let store = InMemoryRoomStore::new();
        assert!(store
            .insert_if_absent(&room("r1", RoomScope::Personal))
            .await
            .unwrap());
        assert!(!store
            .insert_if_absent(&room("r1", RoomScope::Personal))
            .await
            .unwrap());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_replace_if_version_rejects_stale_version() {
        let store = InMemoryRoomStore::new();
        let mut r = room("r1", RoomScope::Personal);
        store.insert_if_absent(&r).await.unwrap();

        r.participant_count = 2;
        assert!(store.replace_if_version(&r, 1).await.unwrap());

        r.participant_count = 3;
        assert!(!store.replace_if_version(&r, 1).await.unwrap());

        let stored = store.fetch("r1").await.unwrap().unwrap();
        assert_eq!(stored.value.participant_count, 2);
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn test_replace_if_version_missing_room() {
        let store = InMemoryRoomStore::new();
        let r = room("ghost", RoomScope::Personal);
        assert!(!store.replace_if_version(&r, 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_in_scope_filters_kind() {
        let store = InMemoryRoomStore::new();
        store
            .insert_if_absent(&room("p1", RoomScope::Personal))
            .await
            .unwrap();
        store
            .insert_if_absent(&room(
                "g1",
                RoomScope::Global {
                    global_ref: "global".to_string(),
                },
            ))
            .await
            .unwrap();

        let globals = store.list_in_scope(ScopeKind::Global).await.unwrap();
        assert_eq!(globals.len(), 1);
        assert_eq!(globals.first().unwrap().value.id, "g1");
        assert!(store.list_in_scope(ScopeKind::Team).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_backdate_last_activity_bumps_version() {
        let store = InMemoryRoomStore::new();
        store
            .insert_if_absent(&room("r1", RoomScope::Personal))
            .await
            .unwrap();

        let past = Utc::now() - Duration::minutes(65);
        assert!(store.backdate_last_activity("r1", past).await);
        assert!(!store.backdate_last_activity("missing", past).await);

        let stored = store.fetch("r1").await.unwrap().unwrap();
        assert_eq!(stored.value.last_activity, past);
        assert_eq!(stored.version, 2);
    }
}
