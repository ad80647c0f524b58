//! Room registry models.
//!
//! Contains the room record, its scope and media kind, access decisions,
//! credentials, and the request/response types of the HTTP API.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Tag used for Global rooms when the caller supplies none.
pub const DEFAULT_GLOBAL_REF: &str = "global";

/// Maximum room id length.
pub const MAX_ROOM_ID_LENGTH: usize = 128;

/// Maximum room title length (after trimming).
pub const MAX_TITLE_LENGTH: usize = 200;

/// Maximum number of emails accepted by a single invite.
pub const MAX_INVITE_EMAILS: usize = 100;

/// Access reason for a Personal room whose owner is someone else.
pub const REASON_PRIVATE_ROOM: &str = "private room";

/// Access reason for a Team room the requester was not invited to.
pub const REASON_NOT_INVITED: &str = "not invited";

/// Access reason for Global rooms.
pub const REASON_OPEN_SCOPE: &str = "open scope";

/// Access reason when the requester owns the room.
pub const REASON_OWNER: &str = "owner";

/// Access reason when the requester is on the Team allowlist.
pub const REASON_INVITED: &str = "invited";

// ============================================================================
// Media kind and capabilities
// ============================================================================

/// Kind of media a room carries.
///
/// Selects both the idle TTL used by the sweeper and the credential
/// lifetime/capability set used by the issuer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// Audio-only room.
    Audio,
    /// Audio and video room.
    Video,
}

impl MediaKind {
    /// Returns the string representation stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }

    /// Parses the database representation.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "audio" => Some(MediaKind::Audio),
            "video" => Some(MediaKind::Video),
            _ => None,
        }
    }

    /// Maximum idle duration before an active room is swept.
    pub fn idle_ttl(self) -> Duration {
        match self {
            MediaKind::Audio => Duration::hours(1),
            MediaKind::Video => Duration::hours(2),
        }
    }

    /// Fixed lifetime of credentials issued for this media kind.
    pub fn credential_lifetime(self) -> Duration {
        match self {
            MediaKind::Audio => Duration::hours(4),
            MediaKind::Video => Duration::hours(7),
        }
    }

    /// Full capability set a credential for this media kind may carry.
    pub fn capabilities(self) -> BTreeSet<Capability> {
        Capability::ALL
            .iter()
            .copied()
            .filter(|c| self == MediaKind::Video || !c.is_video())
            .collect()
    }
}

/// Capability granted to a credential bearer by the media transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Microphone,
    Camera,
    ScreenShare,
    TileView,
    Chat,
    RaiseHand,
}

impl Capability {
    /// Every capability, in declaration order.
    pub const ALL: [Capability; 6] = [
        Capability::Microphone,
        Capability::Camera,
        Capability::ScreenShare,
        Capability::TileView,
        Capability::Chat,
        Capability::RaiseHand,
    ];

    /// Whether the capability only makes sense with a video stream.
    pub fn is_video(self) -> bool {
        matches!(
            self,
            Capability::Camera | Capability::ScreenShare | Capability::TileView
        )
    }
}

// ============================================================================
// Scope
// ============================================================================

/// Scope discriminant, used for listing and sweeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    Personal,
    Team,
    Global,
}

impl ScopeKind {
    /// Every scope kind.
    pub const ALL: [ScopeKind; 3] = [ScopeKind::Personal, ScopeKind::Team, ScopeKind::Global];

    /// Returns the string representation stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeKind::Personal => "personal",
            ScopeKind::Team => "team",
            ScopeKind::Global => "global",
        }
    }

    /// Parses the database representation.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "personal" => Some(ScopeKind::Personal),
            "team" => Some(ScopeKind::Team),
            "global" => Some(ScopeKind::Global),
            _ => None,
        }
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Room scope with its scope-specific linkage.
///
/// `team_ref` and the allowlist only exist for Team rooms, `global_ref` only
/// for Global rooms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoomScope {
    /// Only the owner may join.
    Personal,
    /// The owner and allowlisted emails may join.
    Team {
        team_ref: String,
        allowed_principals: BTreeSet<String>,
    },
    /// Anyone may join.
    Global { global_ref: String },
}

impl RoomScope {
    /// Returns the scope discriminant.
    pub fn kind(&self) -> ScopeKind {
        match self {
            RoomScope::Personal => ScopeKind::Personal,
            RoomScope::Team { .. } => ScopeKind::Team,
            RoomScope::Global { .. } => ScopeKind::Global,
        }
    }
}

/// Scope references supplied alongside a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ScopeRefs {
    /// Team identifier for Team scope.
    #[serde(default)]
    pub team_ref: Option<String>,
    /// Global tag for Global scope.
    #[serde(default)]
    pub global_ref: Option<String>,
}

// ============================================================================
// Principal and Room
// ============================================================================

/// Verified caller identity, supplied by the identity layer.
///
/// Email is redacted in Debug output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Principal")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("email", &"[REDACTED]")
            .field("avatar", &self.avatar)
            .finish()
    }
}

impl Principal {
    /// Case-insensitive email comparison.
    pub fn has_email(&self, email: &str) -> bool {
        self.email.trim().eq_ignore_ascii_case(email.trim())
    }
}

/// A room record as held by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub title: String,
    pub media_kind: MediaKind,
    pub scope: RoomScope,
    pub owner: Principal,
    pub participant_count: u32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Room {
    /// Whether the room is active but idle for longer than its TTL at `now`.
    pub fn is_stale_at(&self, now: DateTime<Utc>) -> bool {
        self.active && now - self.last_activity > self.media_kind.idle_ttl()
    }

    /// Team allowlist, if this is a Team room.
    pub fn allowed_principals(&self) -> Option<&BTreeSet<String>> {
        match &self.scope {
            RoomScope::Team {
                allowed_principals, ..
            } => Some(allowed_principals),
            _ => None,
        }
    }
}

/// Result of evaluating a requester against a room. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessDecision {
    pub allowed: bool,
    pub reason: String,
}

impl AccessDecision {
    pub fn allow(reason: &str) -> Self {
        Self {
            allowed: true,
            reason: reason.to_string(),
        }
    }

    pub fn deny(reason: &str) -> Self {
        Self {
            allowed: false,
            reason: reason.to_string(),
        }
    }
}

// ============================================================================
// Credentials
// ============================================================================

/// Capability-restricted credential for the media transport.
///
/// Stateless: reconstructable from the signed token, never stored.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub subject_id: String,
    pub subject_name: String,
    pub subject_email: String,
    pub room_id: String,
    pub moderator: bool,
    pub capabilities: BTreeSet<Capability>,
    pub issued_at: DateTime<Utc>,
    pub not_before: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("subject_id", &self.subject_id)
            .field("subject_email", &"[REDACTED]")
            .field("room_id", &self.room_id)
            .field("moderator", &self.moderator)
            .field("capabilities", &self.capabilities)
            .field("issued_at", &self.issued_at)
            .field("not_before", &self.not_before)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Credential plus its signed JWT form. The token is redacted in Debug output.
#[derive(Clone, Serialize)]
pub struct SignedCredential {
    pub token: String,
    pub credential: Credential,
}

impl fmt::Debug for SignedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedCredential")
            .field("token", &"[REDACTED]")
            .field("credential", &self.credential)
            .finish()
    }
}

// ============================================================================
// API models
// ============================================================================

/// Readiness check response.
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    /// Service readiness status ("ready" or "not_ready").
    pub status: &'static str,

    /// Store backend name ("memory" or "postgres").
    pub store: &'static str,

    /// Store reachability.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_status: Option<&'static str>,

    /// Whether credential signing is configured.
    pub credentials: &'static str,

    /// Error message (generic, no infrastructure details).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Request body for `POST /api/v1/rooms`.
///
/// Fields are optional at the serde level so that a missing field is reported
/// as a validation error naming the field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateOrJoinRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub scope: Option<ScopeKind>,
    /// Media kind for a new room (default: video).
    #[serde(default)]
    pub media_kind: Option<MediaKind>,
    #[serde(default)]
    pub team_ref: Option<String>,
    #[serde(default)]
    pub global_ref: Option<String>,
    #[serde(default)]
    pub allowed_principals: Option<Vec<String>>,
}

/// A validated create-or-join request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSpec {
    pub id: String,
    pub title: String,
    pub media_kind: MediaKind,
    pub scope: RoomScope,
}

impl CreateOrJoinRequest {
    /// Validate the request and build the scope it describes.
    ///
    /// # Errors
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self, default_global_ref: &str) -> Result<RoomSpec, &'static str> {
        let id = self.id.as_deref().ok_or("Room id is required")?;
        validate_room_id(id)?;

        let title = self
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or("Room title is required")?;
        if title.chars().count() > MAX_TITLE_LENGTH {
            return Err("Room title must be at most 200 characters");
        }

        let kind = self.scope.ok_or("Room scope is required")?;
        let scope = match kind {
            ScopeKind::Personal => RoomScope::Personal,
            ScopeKind::Team => {
                let team_ref = non_empty(self.team_ref.as_deref())
                    .ok_or("team_ref is required for team rooms")?;
                let allowed_principals = self
                    .allowed_principals
                    .as_deref()
                    .unwrap_or_default()
                    .iter()
                    .map(|e| normalize_email(e))
                    .collect::<Result<BTreeSet<_>, _>>()?;
                RoomScope::Team {
                    team_ref: team_ref.to_string(),
                    allowed_principals,
                }
            }
            ScopeKind::Global => RoomScope::Global {
                global_ref: non_empty(self.global_ref.as_deref())
                    .unwrap_or(default_global_ref)
                    .to_string(),
            },
        };

        Ok(RoomSpec {
            id: id.to_string(),
            title: title.to_string(),
            media_kind: self.media_kind.unwrap_or(MediaKind::Video),
            scope,
        })
    }
}

/// Query string for `GET /api/v1/rooms`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListRoomsQuery {
    #[serde(default)]
    pub scope: Option<ScopeKind>,
    #[serde(default)]
    pub team_ref: Option<String>,
    #[serde(default)]
    pub global_ref: Option<String>,
}

/// Response for `GET /api/v1/rooms`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListRoomsResponse {
    pub rooms: Vec<Room>,
}

/// Request body for `POST /api/v1/rooms/{id}/invite`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InviteRequest {
    pub emails: Vec<String>,
}

/// Response for `POST /api/v1/rooms/{id}/invite`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteResponse {
    pub allowed_principals: Vec<String>,
}

/// Request body for `POST /api/v1/rooms/{id}/credential`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IssueCredentialRequest {
    /// Ask for moderator rights (default: granted to the owner only).
    #[serde(default)]
    pub moderator: Option<bool>,
    /// Ask for a subset of capabilities (default: all for the media kind).
    #[serde(default)]
    pub capabilities: Option<BTreeSet<Capability>>,
}

/// JSON Web Key Set served at `/.well-known/jwks.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

/// Ed25519 public key in JWK form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    pub crv: String,
    pub kid: String,
    pub x: String,
    #[serde(rename = "use")]
    pub key_use: String,
    pub alg: String,
}

// ============================================================================
// Validation helpers
// ============================================================================

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Validate a caller-chosen room id.
///
/// # Errors
///
/// Returns an error message if the id is empty, too long, or contains
/// characters outside `[A-Za-z0-9_.-]`.
pub fn validate_room_id(id: &str) -> Result<(), &'static str> {
    if id.is_empty() {
        return Err("Room id is required");
    }
    if id.len() > MAX_ROOM_ID_LENGTH {
        return Err("Room id must be at most 128 characters");
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err("Room id may only contain letters, digits, '-', '_' and '.'");
    }
    Ok(())
}

/// Validate and normalize the emails of a single invite.
///
/// # Errors
///
/// Returns an error message unless 1..=100 well-formed emails are given.
pub fn normalize_invitees(emails: &[String]) -> Result<Vec<String>, &'static str> {
    if emails.is_empty() {
        return Err("At least one email is required");
    }
    if emails.len() > MAX_INVITE_EMAILS {
        return Err("At most 100 emails may be invited at once");
    }
    emails.iter().map(|e| normalize_email(e)).collect()
}

/// Trim and lowercase an email, rejecting obviously malformed values.
///
/// # Errors
///
/// Returns an error message unless the value has exactly one `@` with
/// non-empty local and domain parts.
pub fn normalize_email(email: &str) -> Result<String, &'static str> {
    let email = email.trim().to_ascii_lowercase();
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace) =>
        {
            Ok(email)
        }
        _ => Err("Invalid email address"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn principal(id: &str, email: &str) -> Principal {
        Principal {
            id: id.to_string(),
            name: id.to_uppercase(),
            email: email.to_string(),
            avatar: None,
        }
    }

    fn room(media_kind: MediaKind, last_activity: DateTime<Utc>) -> Room {
        Room {
            id: "r1".to_string(),
            title: "Room".to_string(),
            media_kind,
            scope: RoomScope::Personal,
            owner: principal("u1", "a@x.com"),
            participant_count: 1,
            active: true,
            created_at: last_activity,
            last_activity,
        }
    }

    #[test]
    fn test_media_kind_ttls() {
        assert_eq!(MediaKind::Audio.idle_ttl(), Duration::hours(1));
        assert_eq!(MediaKind::Video.idle_ttl(), Duration::hours(2));
        assert_eq!(MediaKind::Audio.credential_lifetime(), Duration::hours(4));
        assert_eq!(MediaKind::Video.credential_lifetime(), Duration::hours(7));
    }

    #[test]
    fn test_audio_capabilities_exclude_video() {
        let caps = MediaKind::Audio.capabilities();
        assert!(caps.contains(&Capability::Microphone));
        assert!(caps.contains(&Capability::Chat));
        assert!(caps.iter().all(|c| !c.is_video()));

        let video = MediaKind::Video.capabilities();
        assert_eq!(video.len(), Capability::ALL.len());
    }

    #[test]
    fn test_scope_kind_roundtrip_strings() {
        for kind in ScopeKind::ALL {
            assert_eq!(ScopeKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ScopeKind::parse("org"), None);
        assert_eq!(MediaKind::parse("screen"), None);
    }

    #[test]
    fn test_room_scope_serializes_as_tagged_union() {
        let scope = RoomScope::Global {
            global_ref: "lobby".to_string(),
        };
        let json = serde_json::to_value(&scope).unwrap();
        assert_eq!(json["kind"], "global");
        assert_eq!(json["global_ref"], "lobby");
    }

    #[test]
    fn test_is_stale_at_respects_media_kind() {
        let now = Utc::now();
        let audio = room(MediaKind::Audio, now - Duration::minutes(65));
        let video = room(MediaKind::Video, now - Duration::minutes(65));

        assert!(audio.is_stale_at(now));
        assert!(!video.is_stale_at(now));

        let mut ended = audio.clone();
        ended.active = false;
        assert!(!ended.is_stale_at(now));
    }

    #[test]
    fn test_is_stale_at_exact_ttl_is_not_stale() {
        let now = Utc::now();
        let audio = room(MediaKind::Audio, now - Duration::hours(1));
        assert!(!audio.is_stale_at(now));
    }

    #[test]
    fn test_principal_debug_redacts_email() {
        let p = principal("u1", "secret@x.com");
        let debug = format!("{p:?}");
        assert!(debug.contains("u1"));
        assert!(!debug.contains("secret@x.com"));
    }

    #[test]
    fn test_validate_requires_fields() {
        let mut req = CreateOrJoinRequest::default();
        assert_eq!(req.validate("global"), Err("Room id is required"));

        req.id = Some("standup-mon".to_string());
        assert_eq!(req.validate("global"), Err("Room title is required"));

        req.title = Some("   ".to_string());
        assert_eq!(req.validate("global"), Err("Room title is required"));

        req.title = Some(" Standup ".to_string());
        assert_eq!(req.validate("global"), Err("Room scope is required"));

        req.scope = Some(ScopeKind::Personal);
        let spec = req.validate("global").unwrap();
        assert_eq!(spec.title, "Standup");
        assert_eq!(spec.media_kind, MediaKind::Video);
        assert_eq!(spec.scope, RoomScope::Personal);
    }

    #[test]
    fn test_validate_team_requires_team_ref_and_normalizes_emails() {
        let mut req = CreateOrJoinRequest {
            id: Some("team-sync".to_string()),
            title: Some("Sync".to_string()),
            scope: Some(ScopeKind::Team),
            allowed_principals: Some(vec![" B@X.com ".to_string(), "b@x.com".to_string()]),
            ..Default::default()
        };
        assert_eq!(
            req.validate("global"),
            Err("team_ref is required for team rooms")
        );

        req.team_ref = Some("team-42".to_string());
        let spec = req.validate("global").unwrap();
        match spec.scope {
            RoomScope::Team {
                team_ref,
                allowed_principals,
            } => {
                assert_eq!(team_ref, "team-42");
                assert_eq!(allowed_principals.len(), 1);
                assert!(allowed_principals.contains("b@x.com"));
            }
            other => panic!("unexpected scope: {other:?}"),
        }
    }

    #[test]
    fn test_validate_global_defaults_ref() {
        let req = CreateOrJoinRequest {
            id: Some("global-room-1".to_string()),
            title: Some("Lobby".to_string()),
            scope: Some(ScopeKind::Global),
            media_kind: Some(MediaKind::Audio),
            ..Default::default()
        };
        let spec = req.validate("global").unwrap();
        assert_eq!(
            spec.scope,
            RoomScope::Global {
                global_ref: "global".to_string()
            }
        );
        assert_eq!(spec.media_kind, MediaKind::Audio);
    }

    #[test]
    fn test_validate_room_id_charset() {
        assert!(validate_room_id("standup-mon_2.0").is_ok());
        assert!(validate_room_id("has space").is_err());
        assert!(validate_room_id("slash/id").is_err());
        assert!(validate_room_id(&"a".repeat(MAX_ROOM_ID_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Bob@X.COM ").unwrap(), "bob@x.com");
        assert!(normalize_email("no-at-sign").is_err());
        assert!(normalize_email("@x.com").is_err());
        assert!(normalize_email("a@").is_err());
        assert!(normalize_email("a@b@c").is_err());
        assert!(normalize_email("a b@x.com").is_err());
    }

    #[test]
    fn test_normalize_invitees() {
        assert!(normalize_invitees(&[]).is_err());

        let too_many: Vec<String> = (0..=MAX_INVITE_EMAILS)
            .map(|i| format!("u{i}@x.com"))
            .collect();
        assert!(normalize_invitees(&too_many).is_err());

        let bad = vec!["ok@x.com".to_string(), "broken".to_string()];
        assert!(normalize_invitees(&bad).is_err());

        let ok = vec!["C@x.com".to_string()];
        assert_eq!(normalize_invitees(&ok).unwrap(), vec!["c@x.com".to_string()]);
    }

    #[test]
    fn test_signed_credential_debug_redacts_token() {
        let now = Utc::now();
        let signed = SignedCredential {
            token: "eyJhbGciOi.secret.sig".to_string(),
            credential: Credential {
                subject_id: "u1".to_string(),
                subject_name: "U1".to_string(),
                subject_email: "a@x.com".to_string(),
                room_id: "r1".to_string(),
                moderator: false,
                capabilities: MediaKind::Audio.capabilities(),
                issued_at: now,
                not_before: now,
                expires_at: now,
            },
        };
        let debug = format!("{signed:?}");
        assert!(!debug.contains("eyJhbGciOi"));
        assert!(!debug.contains("a@x.com"));
    }
}
