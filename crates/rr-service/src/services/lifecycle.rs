//! Lifecycle coordinator.
//!
//! Composes the room store, the access evaluator, the stale sweeper and the
//! credential issuer into the registry operations.
//!
//! # Concurrency
//!
//! There is no in-process lock. Every mutation goes through insert-if-absent
//! or compare-and-update, and every decision that depends on the current room
//! (reactivate, evaluate, increment) is taken inside the mutator against the
//! freshest stored version. N concurrent successful joins on a fresh id
//! therefore leave `participant_count == N`.

use crate::errors::RegistryError;
use crate::models::{
    normalize_invitees, AccessDecision, CreateOrJoinRequest, IssueCredentialRequest, Principal,
    Room, RoomScope, RoomSpec, ScopeKind, ScopeRefs, SignedCredential, REASON_NOT_INVITED,
};
use crate::observability::metrics;
use crate::repositories::{self, compare_and_update, Mutation, RoomStore};
use crate::services::access;
use crate::services::credentials::CredentialIssuer;
use crate::services::sweeper;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Registry operations over a shared store.
///
/// Cheap to clone; all state lives in the store.
#[derive(Clone)]
pub struct LifecycleCoordinator {
    store: Arc<dyn RoomStore>,
    issuer: CredentialIssuer,
    default_global_ref: String,
}

fn record<T>(
    operation: &'static str,
    start: Instant,
    result: Result<T, RegistryError>,
) -> Result<T, RegistryError> {
    let status = match &result {
        Ok(_) => "success",
        Err(e) => e.metric_label(),
    };
    metrics::record_room_operation(operation, status, start.elapsed());
    result
}

fn validate_requester(requester: &Principal) -> Result<(), RegistryError> {
    if requester.id.trim().is_empty() {
        return Err(RegistryError::Validation(
            "Requester id is required".to_string(),
        ));
    }
    if requester.email.trim().is_empty() {
        return Err(RegistryError::Validation(
            "Requester email is required".to_string(),
        ));
    }
    Ok(())
}

fn room_not_found() -> RegistryError {
    RegistryError::NotFound("Room not found".to_string())
}

impl LifecycleCoordinator {
    pub fn new(
        store: Arc<dyn RoomStore>,
        issuer: CredentialIssuer,
        default_global_ref: impl Into<String>,
    ) -> Self {
        Self {
            store,
            issuer,
            default_global_ref: default_global_ref.into(),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn RoomStore> {
        &self.store
    }

    /// The credential issuer.
    pub fn issuer(&self) -> &CredentialIssuer {
        &self.issuer
    }

    /// Create a room, reactivate an ended one, or join an active one.
    ///
    /// # Errors
    ///
    /// - `Validation` - malformed request or requester
    /// - `Authorization` - the active room does not admit the requester
    /// - `TransientStore` - compare-and-update retries exhausted
    #[instrument(skip_all, name = "rr.lifecycle.create_or_join")]
    pub async fn create_or_join(
        &self,
        request: &CreateOrJoinRequest,
        requester: &Principal,
    ) -> Result<Room, RegistryError> {
        let start = Instant::now();
        let result = self.create_or_join_inner(request, requester).await;
        record("create_or_join", start, result)
    }

    async fn create_or_join_inner(
        &self,
        request: &CreateOrJoinRequest,
        requester: &Principal,
    ) -> Result<Room, RegistryError> {
        validate_requester(requester)?;
        let spec = request
            .validate(&self.default_global_ref)
            .map_err(|e| RegistryError::Validation(e.to_string()))?;

        // Rooms are never deleted: after a lost insert race the room exists,
        // so the second pass always takes the "found" branch.
        for _ in 0..2 {
            let now = Utc::now();
            let joined = compare_and_update(
                self.store.as_ref(),
                &spec.id,
                "create_or_join",
                |room| join_or_reactivate(room, &spec, requester, now),
            )
            .await?;

            if let Some(room) = joined {
                return Ok(room);
            }

            let (room, created) =
                repositories::insert_if_absent(self.store.as_ref(), new_room(&spec, requester, now))
                    .await?;
            if created {
                tracing::info!(
                    target: "rr.services.lifecycle",
                    room_id = %room.id,
                    scope = %room.scope.kind(),
                    owner_id = %requester.id,
                    "Room created"
                );
                return Ok(room);
            }

            tracing::debug!(
                target: "rr.services.lifecycle",
                room_id = %spec.id,
                "Lost creation race, joining existing room"
            );
        }

        Err(RegistryError::TransientStore(
            "room creation did not converge".to_string(),
        ))
    }

    /// List active rooms of a scope visible to the requester, newest first.
    ///
    /// Sweeps the scope before reading.
    #[instrument(skip_all, name = "rr.lifecycle.list_active", fields(scope = %scope))]
    pub async fn list_active(
        &self,
        scope: ScopeKind,
        requester: &Principal,
        refs: &ScopeRefs,
    ) -> Result<Vec<Room>, RegistryError> {
        let start = Instant::now();
        let result: Result<Vec<Room>, RegistryError> = async {
            validate_requester(requester)?;
            sweeper::sweep(self.store.as_ref(), scope).await?;

            let global_ref = refs
                .global_ref
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .unwrap_or(&self.default_global_ref);
            let team_ref = refs
                .team_ref
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty());

            let mut rooms: Vec<Room> = self
                .store
                .list_in_scope(scope)
                .await?
                .into_iter()
                .map(|entry| entry.value)
                .filter(|room| room.active)
                .filter(|room| match &room.scope {
                    RoomScope::Personal => access::is_listed_for(room, requester),
                    RoomScope::Team { team_ref: r, .. } => {
                        team_ref.map_or(true, |wanted| wanted == r.as_str())
                            && access::is_listed_for(room, requester)
                    }
                    RoomScope::Global { global_ref: r } => r == global_ref,
                })
                .collect();

            rooms.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
            Ok(rooms)
        }
        .await;
        record("list_active", start, result)
    }

    /// Add emails to a Team room's allowlist.
    ///
    /// Returns the updated allowlist.
    ///
    /// # Errors
    ///
    /// - `Validation` - bad emails, or the room is not a Team room
    /// - `NotFound` - no such room
    /// - `Authorization` - requester is neither owner nor invitee
    #[instrument(skip_all, name = "rr.lifecycle.invite", fields(room_id = %id))]
    pub async fn invite(
        &self,
        id: &str,
        requester_email: &str,
        emails: &[String],
    ) -> Result<Vec<String>, RegistryError> {
        let start = Instant::now();
        let result: Result<Vec<String>, RegistryError> = async {
            let invitees =
                normalize_invitees(emails).map_err(|e| RegistryError::Validation(e.to_string()))?;

            let room = compare_and_update(self.store.as_ref(), id, "invite", |room| {
                let authorized = access::may_invite(room, requester_email);
                let RoomScope::Team {
                    allowed_principals, ..
                } = &mut room.scope
                else {
                    return Err(RegistryError::Validation(
                        "Invites are only supported for team rooms".to_string(),
                    ));
                };
                if !authorized {
                    return Err(RegistryError::Authorization(REASON_NOT_INVITED.to_string()));
                }

                let before = allowed_principals.len();
                allowed_principals.extend(invitees.iter().cloned());
                if allowed_principals.len() == before {
                    Ok(Mutation::Unchanged)
                } else {
                    Ok(Mutation::Write)
                }
            })
            .await?
            .ok_or_else(room_not_found)?;

            tracing::info!(
                target: "rr.services.lifecycle",
                room_id = %id,
                invited = invitees.len(),
                "Team allowlist updated"
            );

            Ok(room
                .allowed_principals()
                .map(|set| set.iter().cloned().collect())
                .unwrap_or_default())
        }
        .await;
        record("invite", start, result)
    }

    /// Evaluate the requester against a room without mutating it.
    #[instrument(skip_all, name = "rr.lifecycle.check_access", fields(room_id = %id))]
    pub async fn check_access(
        &self,
        id: &str,
        requester: &Principal,
    ) -> Result<AccessDecision, RegistryError> {
        let start = Instant::now();
        let result: Result<AccessDecision, RegistryError> = async {
            let room = repositories::get(self.store.as_ref(), id).await?;
            Ok(access::evaluate(&room, requester))
        }
        .await;
        record("check_access", start, result)
    }

    /// Mark a room inactive. Absent or already inactive rooms are a no-op.
    #[instrument(skip_all, name = "rr.lifecycle.end", fields(room_id = %id))]
    pub async fn end(&self, id: &str) -> Result<(), RegistryError> {
        let start = Instant::now();
        let result: Result<(), RegistryError> = async {
            let mut ended = false;
            compare_and_update(self.store.as_ref(), id, "end", |room| {
                ended = room.active;
                if !room.active {
                    return Ok(Mutation::Unchanged);
                }
                room.active = false;
                Ok(Mutation::Write)
            })
            .await?;

            if ended {
                tracing::info!(target: "rr.services.lifecycle", room_id = %id, "Room ended");
            }
            Ok(())
        }
        .await;
        record("end", start, result)
    }

    /// Refresh `last_activity` of an active room. Otherwise a no-op.
    #[instrument(skip_all, name = "rr.lifecycle.heartbeat", fields(room_id = %id))]
    pub async fn heartbeat(&self, id: &str) -> Result<(), RegistryError> {
        let start = Instant::now();
        let result: Result<(), RegistryError> = async {
            let now = Utc::now();
            compare_and_update(self.store.as_ref(), id, "heartbeat", |room| {
                if !room.active {
                    return Ok(Mutation::Unchanged);
                }
                room.last_activity = now;
                Ok(Mutation::Write)
            })
            .await?;
            Ok(())
        }
        .await;
        record("heartbeat", start, result)
    }

    /// Issue a media credential for an active room the requester may join.
    ///
    /// # Errors
    ///
    /// - `NotFound` - room absent or inactive
    /// - `Authorization` - the room does not admit the requester
    /// - `Configuration` / `CredentialTimeout` - see [`CredentialIssuer::issue`]
    #[instrument(skip_all, name = "rr.lifecycle.issue_credential", fields(room_id = %id))]
    pub async fn issue_credential(
        &self,
        id: &str,
        requester: &Principal,
        request: &IssueCredentialRequest,
    ) -> Result<SignedCredential, RegistryError> {
        let start = Instant::now();
        let result: Result<SignedCredential, RegistryError> = async {
            validate_requester(requester)?;
            let room = repositories::get(self.store.as_ref(), id).await?;
            if !room.active {
                return Err(room_not_found());
            }

            let decision = access::evaluate(&room, requester);
            if !decision.allowed {
                return Err(RegistryError::Authorization(decision.reason));
            }

            self.issuer
                .issue(
                    &room,
                    requester,
                    request.moderator,
                    request.capabilities.as_ref(),
                )
                .await
        }
        .await;
        record("issue_credential", start, result)
    }
}

fn new_room(spec: &RoomSpec, requester: &Principal, now: DateTime<Utc>) -> Room {
    Room {
        id: spec.id.clone(),
        title: spec.title.clone(),
        media_kind: spec.media_kind,
        scope: spec.scope.clone(),
        owner: requester.clone(),
        participant_count: 1,
        active: true,
        created_at: now,
        last_activity: now,
    }
}

/// Decide the found-branch of create-or-join against the freshest room.
fn join_or_reactivate(
    room: &mut Room,
    spec: &RoomSpec,
    requester: &Principal,
    now: DateTime<Utc>,
) -> Result<Mutation, RegistryError> {
    if !room.active {
        // Reactivation takes over the room: the request's owner, title and
        // scope linkage replace the old ones. Media kind and creation time
        // stay with the record.
        tracing::info!(
            target: "rr.services.lifecycle",
            room_id = %room.id,
            previous_owner_id = %room.owner.id,
            owner_id = %requester.id,
            "Room reactivated"
        );
        room.title = spec.title.clone();
        room.scope = spec.scope.clone();
        room.owner = requester.clone();
        room.participant_count = 1;
        room.active = true;
        room.last_activity = now;
        return Ok(Mutation::Write);
    }

    let decision = access::evaluate(room, requester);
    if !decision.allowed {
        tracing::debug!(
            target: "rr.services.lifecycle",
            room_id = %room.id,
            principal_id = %requester.id,
            reason = %decision.reason,
            "Join denied"
        );
        return Err(RegistryError::Authorization(decision.reason));
    }

    room.participant_count = room.participant_count.saturating_add(1);
    room.last_activity = now;
    Ok(Mutation::Write)
}
