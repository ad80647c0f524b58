//! Credential issuer.
//!
//! Produces short-lived, capability-restricted EdDSA JWTs that the media
//! transport verifies against the registry's JWKS document.
//!
//! # Security
//!
//! - Capabilities are intersected with the media-kind set, never widened
//! - Moderator rights go to the room owner only
//! - Private key bytes live in a `SecretBox` and are zeroized on drop
//! - Tokens and emails are never logged

use crate::config::Config;
use crate::errors::RegistryError;
use crate::models::{
    Capability, Credential, Jwk, Jwks, Principal, Room, SignedCredential,
};
use crate::observability::metrics;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use common::jwt::{self, JwtSigningError};
use common::secret::{ExposeSecret, SecretBox};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;
use uuid::Uuid;

/// JWT claims of an issued credential.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialClaims {
    /// Subject (principal id)
    pub sub: String,
    pub name: String,
    pub email: String,
    /// Room the credential is scoped to
    pub room: String,
    pub moderator: bool,
    pub capabilities: Vec<Capability>,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    /// Unique token identifier
    pub jti: String,
    pub iss: String,
    pub aud: String,
}

/// Custom Debug implementation that redacts the email and token id.
impl fmt::Debug for CredentialClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialClaims")
            .field("sub", &self.sub)
            .field("email", &"[REDACTED]")
            .field("room", &self.room)
            .field("moderator", &self.moderator)
            .field("capabilities", &self.capabilities)
            .field("iat", &self.iat)
            .field("nbf", &self.nbf)
            .field("exp", &self.exp)
            .field("jti", &"[REDACTED]")
            .finish()
    }
}

/// Signs credential claims.
///
/// Implementations run on the blocking pool and must be safe to call from
/// many threads at once.
pub trait CredentialSigner: Send + Sync {
    /// Sign the claims into a compact JWT.
    fn sign(&self, claims: &CredentialClaims) -> Result<String, RegistryError>;

    /// Verification key for the JWKS document.
    fn public_jwk(&self) -> Jwk;
}

/// Ed25519 signer holding a PKCS#8 private key.
pub struct Ed25519Signer {
    private_key_pkcs8: SecretBox<Vec<u8>>,
    public_key: Vec<u8>,
    key_id: String,
}

impl Ed25519Signer {
    /// Build a signer from a base64 PKCS#8 document.
    ///
    /// # Errors
    ///
    /// `Configuration` if the key cannot be decoded.
    pub fn from_base64(key_b64: &str, key_id: &str) -> Result<Self, RegistryError> {
        let pkcs8 = jwt::decode_signing_key(key_b64).map_err(signing_error)?;
        Self::from_pkcs8(pkcs8, key_id)
    }

    /// Build a signer from raw PKCS#8 bytes.
    ///
    /// # Errors
    ///
    /// `Configuration` if the document is not an Ed25519 key.
    pub fn from_pkcs8(pkcs8: Vec<u8>, key_id: &str) -> Result<Self, RegistryError> {
        let public_key = jwt::public_key_from_pkcs8(&pkcs8).map_err(signing_error)?;
        Ok(Self {
            private_key_pkcs8: SecretBox::new(Box::new(pkcs8)),
            public_key,
            key_id: key_id.to_string(),
        })
    }
}

impl CredentialSigner for Ed25519Signer {
    fn sign(&self, claims: &CredentialClaims) -> Result<String, RegistryError> {
        jwt::sign_eddsa(claims, self.private_key_pkcs8.expose_secret(), &self.key_id)
            .map_err(signing_error)
    }

    fn public_jwk(&self) -> Jwk {
        Jwk {
            kty: "OKP".to_string(),
            crv: "Ed25519".to_string(),
            kid: self.key_id.clone(),
            x: jwt::encode_public_key_jwk(&self.public_key),
            key_use: "sig".to_string(),
            alg: "EdDSA".to_string(),
        }
    }
}

fn signing_error(err: JwtSigningError) -> RegistryError {
    match err {
        JwtSigningError::InvalidKey(reason) => RegistryError::Configuration(reason),
        JwtSigningError::SigningFailed => {
            RegistryError::Internal("credential signing failed".to_string())
        }
    }
}

/// Issues credentials for validated (room, requester) pairs.
///
/// Stateless apart from immutable key material; cheap to clone.
#[derive(Clone)]
pub struct CredentialIssuer {
    signer: Option<Arc<dyn CredentialSigner>>,
    issuer: String,
    audience: String,
    clock_skew: Duration,
    signing_timeout: std::time::Duration,
}

impl CredentialIssuer {
    /// Build the issuer from configuration.
    ///
    /// A missing signing key is allowed here; issuance then fails with
    /// `Configuration`.
    pub fn from_config(config: &Config) -> Result<Self, RegistryError> {
        let signer = match &config.signing_key {
            Some(key) => Some(Arc::new(Ed25519Signer::from_base64(
                key.expose_secret(),
                &config.signing_key_id,
            )?) as Arc<dyn CredentialSigner>),
            None => None,
        };

        Ok(Self {
            signer,
            issuer: config.credential_issuer.clone(),
            audience: config.credential_audience.clone(),
            clock_skew: Duration::seconds(config.credential_clock_skew_seconds),
            signing_timeout: std::time::Duration::from_millis(config.signing_timeout_ms),
        })
    }

    /// Replace the signer (tests inject slow or failing signers).
    pub fn with_signer(mut self, signer: Arc<dyn CredentialSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Override the signing deadline.
    pub fn with_signing_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.signing_timeout = timeout;
        self
    }

    /// Whether key material is configured.
    pub fn is_configured(&self) -> bool {
        self.signer.is_some()
    }

    /// Expected `iss` claim.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Expected `aud` claim.
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// JWKS document for the configured key (empty when unconfigured).
    pub fn jwks(&self) -> Jwks {
        Jwks {
            keys: self
                .signer
                .as_ref()
                .map(|s| s.public_jwk())
                .into_iter()
                .collect(),
        }
    }

    /// Build the unsigned credential for `requester` in `room` at `now`.
    ///
    /// `moderator` is honoured only for the room owner. `requested` narrows
    /// the media-kind capability set; it never widens it.
    pub fn build_credential(
        &self,
        room: &Room,
        requester: &Principal,
        moderator: Option<bool>,
        requested: Option<&BTreeSet<Capability>>,
        now: DateTime<Utc>,
    ) -> Credential {
        let issued_at = now.trunc_subsecs(0);
        let is_owner = requester.id == room.owner.id;
        let wants_moderator = moderator.unwrap_or(is_owner);

        if wants_moderator && !is_owner {
            tracing::info!(
                target: "rr.services.credentials",
                room_id = %room.id,
                principal_id = %requester.id,
                "Moderator requested by non-owner, downgraded"
            );
        }

        let allowed = room.media_kind.capabilities();
        let capabilities = match requested {
            Some(requested) => allowed.intersection(requested).copied().collect(),
            None => allowed,
        };

        Credential {
            subject_id: requester.id.clone(),
            subject_name: requester.name.clone(),
            subject_email: requester.email.clone(),
            room_id: room.id.clone(),
            moderator: wants_moderator && is_owner,
            capabilities,
            issued_at,
            not_before: issued_at - self.clock_skew,
            expires_at: issued_at + room.media_kind.credential_lifetime(),
        }
    }

    fn claims_for(&self, credential: &Credential) -> CredentialClaims {
        CredentialClaims {
            sub: credential.subject_id.clone(),
            name: credential.subject_name.clone(),
            email: credential.subject_email.clone(),
            room: credential.room_id.clone(),
            moderator: credential.moderator,
            capabilities: credential.capabilities.iter().copied().collect(),
            iat: credential.issued_at.timestamp(),
            nbf: credential.not_before.timestamp(),
            exp: credential.expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        }
    }

    /// Issue a signed credential.
    ///
    /// The caller has already checked that the room exists, is active and
    /// admits the requester.
    ///
    /// # Errors
    ///
    /// - `Configuration` - no signing key configured
    /// - `CredentialTimeout` - signing exceeded the deadline (retryable)
    /// - `Internal` - the signing task failed
    #[instrument(skip_all, name = "rr.credentials.issue", fields(room_id = %room.id))]
    pub async fn issue(
        &self,
        room: &Room,
        requester: &Principal,
        moderator: Option<bool>,
        requested: Option<&BTreeSet<Capability>>,
    ) -> Result<SignedCredential, RegistryError> {
        let media_kind = room.media_kind.as_str();
        let start = Instant::now();

        let Some(signer) = self.signer.clone() else {
            metrics::record_credential_issued(media_kind, "configuration", start.elapsed());
            return Err(RegistryError::Configuration(
                "credential signing key is not configured".to_string(),
            ));
        };

        let credential = self.build_credential(room, requester, moderator, requested, Utc::now());
        let claims = self.claims_for(&credential);

        let signing = tokio::task::spawn_blocking(move || signer.sign(&claims));
        let result = match tokio::time::timeout(self.signing_timeout, signing).await {
            Ok(Ok(signed)) => signed,
            Ok(Err(join_err)) => Err(RegistryError::Internal(format!(
                "signing task failed: {join_err}"
            ))),
            Err(_) => {
                tracing::warn!(
                    target: "rr.services.credentials",
                    room_id = %room.id,
                    timeout_ms = u64::try_from(self.signing_timeout.as_millis()).unwrap_or(u64::MAX),
                    "Credential signing exceeded deadline"
                );
                Err(RegistryError::CredentialTimeout)
            }
        };

        let status = match &result {
            Ok(_) => "success",
            Err(e) => e.metric_label(),
        };
        metrics::record_credential_issued(media_kind, status, start.elapsed());

        let token = result?;

        tracing::info!(
            target: "rr.services.credentials",
            room_id = %room.id,
            principal_id = %requester.id,
            moderator = credential.moderator,
            media_kind,
            "Credential issued"
        );

        Ok(SignedCredential { token, credential })
    }
}
