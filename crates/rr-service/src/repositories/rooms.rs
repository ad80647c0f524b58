//! Postgres room store.
//!
//! # Concurrency
//!
//! - `INSERT .. ON CONFLICT (id) DO NOTHING` gives atomic insert-if-absent
//! - `UPDATE .. WHERE id = $1 AND version = $2` gives compare-and-swap
//! - All queries use parameterized statements

use super::room_store::{RoomStore, Versioned};
use crate::errors::RegistryError;
use crate::models::{MediaKind, Principal, Room, RoomScope, ScopeKind};
use crate::observability::metrics;
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::instrument;

const ROOM_COLUMNS: &str = r#"
    id, title, media_kind, scope, team_ref, global_ref, allowed_principals,
    owner_id, owner_name, owner_email, owner_avatar,
    participant_count, active, created_at, last_activity, version
"#;

/// Room store backed by a Postgres `rooms` table.
#[derive(Clone)]
pub struct PgRoomStore {
    pool: PgPool,
}

impl PgRoomStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), RegistryError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| RegistryError::Database(format!("migration failed: {e}")))
    }
}

/// Columns a room is flattened into.
struct RoomColumns<'a> {
    scope: &'static str,
    team_ref: Option<&'a str>,
    global_ref: Option<&'a str>,
    allowed_principals: Vec<String>,
    participant_count: i32,
}

fn room_columns(room: &Room) -> Result<RoomColumns<'_>, RegistryError> {
    let (team_ref, global_ref, allowed_principals) = match &room.scope {
        RoomScope::Personal => (None, None, Vec::new()),
        RoomScope::Team {
            team_ref,
            allowed_principals,
        } => (
            Some(team_ref.as_str()),
            None,
            allowed_principals.iter().cloned().collect(),
        ),
        RoomScope::Global { global_ref } => (None, Some(global_ref.as_str()), Vec::new()),
    };

    let participant_count = i32::try_from(room.participant_count)
        .map_err(|_| RegistryError::Internal("participant count overflow".to_string()))?;

    Ok(RoomColumns {
        scope: room.scope.kind().as_str(),
        team_ref,
        global_ref,
        allowed_principals,
        participant_count,
    })
}

fn timed<T>(
    operation: &'static str,
    start: Instant,
    result: Result<T, sqlx::Error>,
) -> Result<T, RegistryError> {
    let status = if result.is_ok() { "success" } else { "error" };
    metrics::record_store_query(operation, status, start.elapsed());
    result.map_err(RegistryError::from)
}

#[async_trait]
impl RoomStore for PgRoomStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    #[instrument(skip_all, name = "rr.repo.insert_room")]
    async fn insert_if_absent(&self, room: &Room) -> Result<bool, RegistryError> {
        let cols = room_columns(room)?;
        let start = Instant::now();

        let result = sqlx::query(
            r#"
            INSERT INTO rooms (
                id, title, media_kind, scope, team_ref, global_ref, allowed_principals,
                owner_id, owner_name, owner_email, owner_avatar,
                participant_count, active, created_at, last_activity, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, 1)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&room.id) // $1
        .bind(&room.title) // $2
        .bind(room.media_kind.as_str()) // $3
        .bind(cols.scope) // $4
        .bind(cols.team_ref) // $5
        .bind(cols.global_ref) // $6
        .bind(&cols.allowed_principals) // $7
        .bind(&room.owner.id) // $8
        .bind(&room.owner.name) // $9
        .bind(&room.owner.email) // $10
        .bind(room.owner.avatar.as_deref()) // $11
        .bind(cols.participant_count) // $12
        .bind(room.active) // $13
        .bind(room.created_at) // $14
        .bind(room.last_activity) // $15
        .execute(&self.pool)
        .await;

        let result = timed("insert_room", start, result)?;
        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip_all, name = "rr.repo.fetch_room")]
    async fn fetch(&self, id: &str) -> Result<Option<Versioned<Room>>, RegistryError> {
        let start = Instant::now();
        let query = format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE id = $1");

        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await;

        timed("fetch_room", start, row)?
            .map(map_row_to_room)
            .transpose()
    }

    #[instrument(skip_all, name = "rr.repo.replace_room")]
    async fn replace_if_version(
        &self,
        room: &Room,
        expected_version: i64,
    ) -> Result<bool, RegistryError> {
        let cols = room_columns(room)?;
        let start = Instant::now();

        let result = sqlx::query(
            r#"
            UPDATE rooms SET
                title = $3,
                media_kind = $4,
                scope = $5,
                team_ref = $6,
                global_ref = $7,
                allowed_principals = $8,
                owner_id = $9,
                owner_name = $10,
                owner_email = $11,
                owner_avatar = $12,
                participant_count = $13,
                active = $14,
                last_activity = $15,
                version = version + 1
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(&room.id) // $1
        .bind(expected_version) // $2
        .bind(&room.title) // $3
        .bind(room.media_kind.as_str()) // $4
        .bind(cols.scope) // $5
        .bind(cols.team_ref) // $6
        .bind(cols.global_ref) // $7
        .bind(&cols.allowed_principals) // $8
        .bind(&room.owner.id) // $9
        .bind(&room.owner.name) // $10
        .bind(&room.owner.email) // $11
        .bind(room.owner.avatar.as_deref()) // $12
        .bind(cols.participant_count) // $13
        .bind(room.active) // $14
        .bind(room.last_activity) // $15
        .execute(&self.pool)
        .await;

        let result = timed("replace_room", start, result)?;
        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip_all, name = "rr.repo.list_rooms")]
    async fn list_in_scope(&self, scope: ScopeKind) -> Result<Vec<Versioned<Room>>, RegistryError> {
        let start = Instant::now();
        let query = format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE scope = $1");

        let rows = sqlx::query(&query)
            .bind(scope.as_str())
            .fetch_all(&self.pool)
            .await;

        timed("list_rooms", start, rows)?
            .into_iter()
            .map(map_row_to_room)
            .collect()
    }

    async fn ping(&self) -> Result<(), RegistryError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(RegistryError::from)
    }
}

fn participant_count_from_db(count: i32) -> Result<u32, RegistryError> {
    u32::try_from(count)
        .map_err(|_| RegistryError::Internal(format!("negative participant count {count}")))
}

/// Map a database row to a versioned room.
///
/// Rows violating the scope linkage rules are reported as internal errors
/// rather than silently repaired.
fn map_row_to_room(row: sqlx::postgres::PgRow) -> Result<Versioned<Room>, RegistryError> {
    let media_kind: String = row.try_get("media_kind")?;
    let media_kind = MediaKind::parse(&media_kind)
        .ok_or_else(|| RegistryError::Internal(format!("unknown media kind '{media_kind}'")))?;

    let scope_kind: String = row.try_get("scope")?;
    let scope = match ScopeKind::parse(&scope_kind) {
        Some(ScopeKind::Personal) => RoomScope::Personal,
        Some(ScopeKind::Team) => {
            let team_ref: Option<String> = row.try_get("team_ref")?;
            let allowed: Vec<String> = row.try_get("allowed_principals")?;
            RoomScope::Team {
                team_ref: team_ref.ok_or_else(|| {
                    RegistryError::Internal("team room without team_ref".to_string())
                })?,
                allowed_principals: allowed.into_iter().collect::<BTreeSet<_>>(),
            }
        }
        Some(ScopeKind::Global) => {
            let global_ref: Option<String> = row.try_get("global_ref")?;
            RoomScope::Global {
                global_ref: global_ref.ok_or_else(|| {
                    RegistryError::Internal("global room without global_ref".to_string())
                })?,
            }
        }
        None => {
            return Err(RegistryError::Internal(format!(
                "unknown scope '{scope_kind}'"
            )))
        }
    };

    let participant_count = participant_count_from_db(row.try_get("participant_count")?)?;

    Ok(Versioned {
        value: Room {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            media_kind,
            scope,
            owner: Principal {
                id: row.try_get("owner_id")?,
                name: row.try_get("owner_name")?,
                email: row.try_get("owner_email")?,
                avatar: row.try_get("owner_avatar")?,
            },
            participant_count,
            active: row.try_get("active")?,
            created_at: row.try_get("created_at")?,
            last_activity: row.try_get("last_activity")?,
        },
        version: row.try_get("version")?,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::{SubsecRound, Utc};

    fn room(scope: RoomScope) -> Room {
        let now = Utc::now();
        Room {
            id: "r1".to_string(),
            title: "Room".to_string(),
            media_kind: MediaKind::Video,
            scope,
            owner: Principal {
                id: "u1".to_string(),
                name: "Alice".to_string(),
                email: "a@x.com".to_string(),
                avatar: None,
            },
            participant_count: 3,
            active: true,
            created_at: now,
            last_activity: now,
        }
    }

    #[test]
    fn test_room_columns_team() {
        let r = room(RoomScope::Team {
            team_ref: "team-42".to_string(),
            allowed_principals: ["b@x.com".to_string()].into_iter().collect(),
        });
        let cols = room_columns(&r).unwrap();
        assert_eq!(cols.scope, "team");
        assert_eq!(cols.team_ref, Some("team-42"));
        assert_eq!(cols.global_ref, None);
        assert_eq!(cols.allowed_principals, vec!["b@x.com".to_string()]);
        assert_eq!(cols.participant_count, 3);
    }

    #[test]
    fn test_room_columns_global_and_personal() {
        let global = room(RoomScope::Global {
            global_ref: "global".to_string(),
        });
        let cols = room_columns(&global).unwrap();
        assert_eq!(cols.scope, "global");
        assert_eq!(cols.global_ref, Some("global"));
        assert!(cols.allowed_principals.is_empty());

        let personal = room(RoomScope::Personal);
        let cols = room_columns(&personal).unwrap();
        assert_eq!(cols.team_ref, None);
        assert_eq!(cols.global_ref, None);
    }

    #[test]
    fn test_negative_participant_count_is_internal_error() {
        assert_eq!(participant_count_from_db(7).unwrap(), 7);
        assert!(matches!(
            participant_count_from_db(-1),
            Err(RegistryError::Internal(_))
        ));
    }

    #[test]
    fn test_room_columns_rejects_count_overflow() {
        let mut r = room(RoomScope::Personal);
        r.participant_count = u32::MAX;
        assert!(matches!(
            room_columns(&r),
            Err(RegistryError::Internal(_))
        ));
    }

    fn team_room(id: &str) -> Room {
        let mut r = room(RoomScope::Team {
            team_ref: "team-42".to_string(),
            allowed_principals: ["b@x.com".to_string(), "c@x.com".to_string()]
                .into_iter()
                .collect(),
        });
        r.id = id.to_string();
        r
    }

    fn with_id(mut r: Room, id: &str) -> Room {
        r.id = id.to_string();
        r
    }

    /// Postgres stores microseconds; align timestamps so round-trips compare equal.
    fn truncated(mut r: Room) -> Room {
        r.created_at = r.created_at.trunc_subsecs(6);
        r.last_activity = r.last_activity.trunc_subsecs(6);
        r
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_insert_if_absent_rejects_duplicate_id(pool: PgPool) {
        let store = PgRoomStore::new(pool);
        let first = truncated(room(RoomScope::Personal));

        assert!(store.insert_if_absent(&first).await.unwrap());

        let mut second = first.clone();
        second.title = "Other".to_string();
        assert!(!store.insert_if_absent(&second).await.unwrap());

        let stored = store.fetch("r1").await.unwrap().unwrap();
        assert_eq!(stored.value.title, "Room");
        assert_eq!(stored.version, 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_replace_if_version_bumps_and_rejects_stale(pool: PgPool) {
        let store = PgRoomStore::new(pool);
        let mut r = truncated(room(RoomScope::Personal));
        store.insert_if_absent(&r).await.unwrap();

        r.participant_count = 4;
        assert!(store.replace_if_version(&r, 1).await.unwrap());

        r.participant_count = 9;
        assert!(!store.replace_if_version(&r, 1).await.unwrap());

        let stored = store.fetch("r1").await.unwrap().unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.value.participant_count, 4);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_replace_if_version_missing_room(pool: PgPool) {
        let store = PgRoomStore::new(pool);
        let r = room(RoomScope::Personal);
        assert!(!store.replace_if_version(&r, 1).await.unwrap());
        assert!(store.fetch("r1").await.unwrap().is_none());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_rows_round_trip_for_every_scope(pool: PgPool) {
        let store = PgRoomStore::new(pool);

        let mut personal = truncated(with_id(room(RoomScope::Personal), "p1"));
        personal.owner.avatar = Some("https://cdn/a.png".to_string());
        let team = truncated(team_room("t1"));
        let mut global = truncated(with_id(
            room(RoomScope::Global {
                global_ref: "lobby".to_string(),
            }),
            "g1",
        ));
        global.media_kind = MediaKind::Audio;
        global.active = false;

        for r in [&personal, &team, &global] {
            assert!(store.insert_if_absent(r).await.unwrap());
            let stored = store.fetch(&r.id).await.unwrap().unwrap();
            assert_eq!(&stored.value, r);
            assert_eq!(stored.version, 1);
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_list_in_scope_filters_kind(pool: PgPool) {
        let store = PgRoomStore::new(pool);
        store
            .insert_if_absent(&with_id(room(RoomScope::Personal), "p1"))
            .await
            .unwrap();
        store.insert_if_absent(&team_room("t1")).await.unwrap();
        store.insert_if_absent(&team_room("t2")).await.unwrap();

        let mut teams: Vec<String> = store
            .list_in_scope(ScopeKind::Team)
            .await
            .unwrap()
            .into_iter()
            .map(|entry| entry.value.id)
            .collect();
        teams.sort();
        assert_eq!(teams, vec!["t1".to_string(), "t2".to_string()]);

        assert_eq!(store.list_in_scope(ScopeKind::Personal).await.unwrap().len(), 1);
        assert!(store.list_in_scope(ScopeKind::Global).await.unwrap().is_empty());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_ping(pool: PgPool) {
        let store = PgRoomStore::new(pool);
        store.ping().await.unwrap();
        assert_eq!(store.backend(), "postgres");
    }
}
