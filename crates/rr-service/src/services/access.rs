//! Access evaluator.
//!
//! Pure function of a room and a requester. No I/O, no clock.

use crate::models::{
    AccessDecision, Principal, Room, RoomScope, REASON_INVITED, REASON_NOT_INVITED,
    REASON_OPEN_SCOPE, REASON_OWNER, REASON_PRIVATE_ROOM,
};

/// Decide whether `requester` may join `room`.
///
/// - Personal: only the owner (matched by id).
/// - Team: the owner or an allowlisted email (case-insensitive).
/// - Global: anyone.
///
/// The room's `active` flag is not considered here.
pub fn evaluate(room: &Room, requester: &Principal) -> AccessDecision {
    match &room.scope {
        RoomScope::Personal => {
            if requester.id == room.owner.id {
                AccessDecision::allow(REASON_OWNER)
            } else {
                AccessDecision::deny(REASON_PRIVATE_ROOM)
            }
        }
        RoomScope::Team {
            allowed_principals, ..
        } => {
            if room.owner.has_email(&requester.email) {
                AccessDecision::allow(REASON_OWNER)
            } else if is_allowlisted(allowed_principals, &requester.email) {
                AccessDecision::allow(REASON_INVITED)
            } else {
                AccessDecision::deny(REASON_NOT_INVITED)
            }
        }
        RoomScope::Global { .. } => AccessDecision::allow(REASON_OPEN_SCOPE),
    }
}

/// Whether `requester` may extend a Team room's allowlist.
///
/// Same rule as joining: owner or already invited.
pub fn may_invite(room: &Room, requester_email: &str) -> bool {
    match &room.scope {
        RoomScope::Team {
            allowed_principals, ..
        } => {
            room.owner.has_email(requester_email)
                || is_allowlisted(allowed_principals, requester_email)
        }
        _ => false,
    }
}

/// Whether `requester` should see `room` in a listing of its scope.
///
/// Personal rooms are listed to their owner only; Team rooms to the owner
/// and invitees. Global listing is filtered by tag in the coordinator.
pub fn is_listed_for(room: &Room, requester: &Principal) -> bool {
    match room.scope {
        RoomScope::Personal => room.owner.id == requester.id,
        RoomScope::Team { .. } | RoomScope::Global { .. } => evaluate(room, requester).allowed,
    }
}

fn is_allowlisted<'a>(
    allowed: impl IntoIterator<Item = &'a String>,
    email: &str,
) -> bool {
    let email = email.trim();
    allowed
        .into_iter()
        .any(|candidate| candidate.eq_ignore_ascii_case(email))
}
