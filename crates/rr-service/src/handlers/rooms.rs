//! Room handlers.
//!
//! Thin adapters from HTTP to the lifecycle coordinator. Every route here
//! sits behind `require_principal`, so a `Principal` extension is present.
//!
//! Request bodies are deserialized manually so malformed JSON yields a 400
//! `VALIDATION_ERROR` instead of Axum's default 422.

use crate::errors::RegistryError;
use crate::models::{
    AccessDecision, CreateOrJoinRequest, InviteRequest, InviteResponse, IssueCredentialRequest,
    ListRoomsQuery, ListRoomsResponse, Principal, Room, ScopeRefs, SignedCredential,
};
use crate::routes::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::instrument;

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, RegistryError> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(target: "rr.handlers.rooms", error = %e, "Invalid request body");
        RegistryError::Validation("Invalid request body".to_string())
    })
}

/// Handler for POST /api/v1/rooms
///
/// Create-or-join. Returns the room after the operation.
#[instrument(skip_all, name = "rr.rooms.create_or_join")]
pub async fn create_or_join(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    body: Bytes,
) -> Result<Json<Room>, RegistryError> {
    let request: CreateOrJoinRequest = parse_body(&body)?;
    let room = state
        .coordinator
        .create_or_join(&request, &principal)
        .await?;
    Ok(Json(room))
}

/// Handler for GET /api/v1/rooms?scope=..&team_ref=..&global_ref=..
#[instrument(skip_all, name = "rr.rooms.list")]
pub async fn list_rooms(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<ListRoomsQuery>,
) -> Result<Json<ListRoomsResponse>, RegistryError> {
    let scope = query
        .scope
        .ok_or_else(|| RegistryError::Validation("scope query parameter is required".to_string()))?;
    let refs = ScopeRefs {
        team_ref: query.team_ref,
        global_ref: query.global_ref,
    };

    let rooms = state
        .coordinator
        .list_active(scope, &principal, &refs)
        .await?;
    Ok(Json(ListRoomsResponse { rooms }))
}

/// Handler for POST /api/v1/rooms/:id/invite
#[instrument(skip_all, name = "rr.rooms.invite", fields(room_id = %id))]
pub async fn invite(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<InviteResponse>, RegistryError> {
    let request: InviteRequest = parse_body(&body)?;
    let allowed_principals = state
        .coordinator
        .invite(&id, &principal.email, &request.emails)
        .await?;
    Ok(Json(InviteResponse { allowed_principals }))
}

/// Handler for GET /api/v1/rooms/:id/access
#[instrument(skip_all, name = "rr.rooms.check_access", fields(room_id = %id))]
pub async fn check_access(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<Json<AccessDecision>, RegistryError> {
    let decision = state.coordinator.check_access(&id, &principal).await?;
    Ok(Json(decision))
}

/// Handler for POST /api/v1/rooms/:id/end
///
/// Idempotent; ending an absent or inactive room is a 204 as well.
#[instrument(skip_all, name = "rr.rooms.end", fields(room_id = %id))]
pub async fn end_room(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<StatusCode, RegistryError> {
    tracing::debug!(
        target: "rr.handlers.rooms",
        room_id = %id,
        principal_id = %principal.id,
        "End requested"
    );
    state.coordinator.end(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for POST /api/v1/rooms/:id/heartbeat
#[instrument(skip_all, name = "rr.rooms.heartbeat", fields(room_id = %id))]
pub async fn heartbeat(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, RegistryError> {
    state.coordinator.heartbeat(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for POST /api/v1/rooms/:id/credential
///
/// The body is optional; an empty body requests the defaults.
#[instrument(skip_all, name = "rr.rooms.issue_credential", fields(room_id = %id))]
pub async fn issue_credential(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<SignedCredential>, RegistryError> {
    let request: IssueCredentialRequest = if body.is_empty() {
        IssueCredentialRequest::default()
    } else {
        parse_body(&body)?
    };

    let signed = state
        .coordinator
        .issue_credential(&id, &principal, &request)
        .await?;
    Ok(Json(signed))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_body_rejects_malformed_json() {
        let err = parse_body::<CreateOrJoinRequest>(&Bytes::from_static(b"{not json"))
            .unwrap_err();
        assert!(matches!(err, RegistryError::Validation(_)));
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_parse_body_rejects_unknown_fields() {
        let err = parse_body::<InviteRequest>(&Bytes::from_static(
            br#"{"emails":["a@x.com"],"role":"admin"}"#,
        ))
        .unwrap_err();
        assert!(matches!(err, RegistryError::Validation(_)));
    }

    #[test]
    fn test_parse_body_accepts_create_request() {
        let request: CreateOrJoinRequest = parse_body(&Bytes::from_static(
            br#"{"id":"standup","title":"Standup","scope":"team","team_ref":"t1","media_kind":"audio"}"#,
        ))
        .unwrap();
        assert_eq!(request.id.as_deref(), Some("standup"));
        assert_eq!(request.team_ref.as_deref(), Some("t1"));
    }
}
