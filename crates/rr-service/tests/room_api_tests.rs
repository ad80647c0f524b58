//! Room API end-to-end tests.
//!
//! Run the production router on a random port and exercise it over HTTP
//! with identity headers, the way the identity layer would call it.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use common::jwt::{verify_eddsa, VerifyOptions};
use rr_service::models::{Jwks, ListRoomsResponse, Room};
use rr_test_utils::{alice, bob, principal, test_signing_key, TestRegistryServer};
use serde_json::{json, Value};

#[tokio::test]
async fn test_health_and_readiness() -> Result<(), anyhow::Error> {
    let server = TestRegistryServer::spawn().await?;
    let client = reqwest::Client::new();

    let health = client.get(format!("{}/health", server.url())).send().await?;
    assert_eq!(health.status(), 200);
    assert_eq!(health.text().await?, "OK");

    let ready = client.get(format!("{}/ready", server.url())).send().await?;
    assert_eq!(ready.status(), 200);
    let body: Value = ready.json().await?;
    assert_eq!(body["status"], "ready");
    assert_eq!(body["store"], "memory");
    assert_eq!(body["credentials"], "not_configured");

    Ok(())
}

#[tokio::test]
async fn test_missing_identity_is_401() -> Result<(), anyhow::Error> {
    let server = TestRegistryServer::spawn().await?;

    let response = reqwest::Client::new()
        .post(format!("{}/api/v1/rooms", server.url()))
        .json(&json!({"id": "r1", "title": "R", "scope": "personal"}))
        .send()
        .await?;

    assert_eq!(response.status(), 401);
    let body: Value = response.json().await?;
    assert_eq!(body["error"]["code"], "UNAUTHENTICATED");
    assert_eq!(server.store().len().await, 0);

    Ok(())
}

#[tokio::test]
async fn test_create_join_and_list() -> Result<(), anyhow::Error> {
    let server = TestRegistryServer::spawn().await?;
    let as_alice = server.as_principal(&alice());
    let as_bob = server.as_principal(&bob());
    let body = json!({"id": "lobby", "title": "Lobby", "scope": "global", "media_kind": "audio"});

    let created: Room = as_alice.post("/api/v1/rooms").json(&body).send().await?.json().await?;
    assert_eq!(created.participant_count, 1);
    assert_eq!(created.owner.id, alice().id);

    let joined: Room = as_bob.post("/api/v1/rooms").json(&body).send().await?.json().await?;
    assert_eq!(joined.participant_count, 2);
    assert_eq!(joined.owner.id, alice().id);

    let listed: ListRoomsResponse = as_bob
        .get("/api/v1/rooms?scope=global")
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(listed.rooms.len(), 1);
    assert_eq!(listed.rooms[0].id, "lobby");

    let other_tag: ListRoomsResponse = as_bob
        .get("/api/v1/rooms?scope=global&global_ref=elsewhere")
        .send()
        .await?
        .json()
        .await?;
    assert!(other_tag.rooms.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_validation_errors_are_400() -> Result<(), anyhow::Error> {
    let server = TestRegistryServer::spawn().await?;
    let as_alice = server.as_principal(&alice());

    let cases = [
        json!({"title": "No id", "scope": "personal"}),
        json!({"id": "r1", "scope": "personal"}),
        json!({"id": "r1", "title": "T"}),
        json!({"id": "r1", "title": "T", "scope": "team"}),
        json!({"id": "r1", "title": "T", "scope": "galaxy"}),
        json!({"id": "r1", "title": "T", "scope": "personal", "owner": "me"}),
    ];

    for body in cases {
        let response = as_alice.post("/api/v1/rooms").json(&body).send().await?;
        assert_eq!(response.status(), 400, "body: {body}");
        let json: Value = response.json().await?;
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
    }

    let missing_scope = as_alice.get("/api/v1/rooms").send().await?;
    assert_eq!(missing_scope.status(), 400);

    assert_eq!(server.store().len().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_team_invite_over_http() -> Result<(), anyhow::Error> {
    let server = TestRegistryServer::spawn().await?;
    let owner = server.as_principal(&principal("u1", "Alice", "a@x.com"));
    let guest = server.as_principal(&principal("u2", "Bob", "b@x.com"));
    let body = json!({"id": "team-sync", "title": "Sync", "scope": "team", "team_ref": "t1"});

    assert_eq!(owner.post("/api/v1/rooms").json(&body).send().await?.status(), 200);

    let denied = guest.post("/api/v1/rooms").json(&body).send().await?;
    assert_eq!(denied.status(), 403);
    let denied: Value = denied.json().await?;
    assert_eq!(denied["error"]["code"], "FORBIDDEN");
    assert_eq!(denied["error"]["message"], "not invited");

    let stolen = guest
        .post("/api/v1/rooms/team-sync/invite")
        .json(&json!({"emails": ["b@x.com"]}))
        .send()
        .await?;
    assert_eq!(stolen.status(), 403);

    let invited: Value = owner
        .post("/api/v1/rooms/team-sync/invite")
        .json(&json!({"emails": [" B@X.com "]}))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(invited["allowed_principals"], json!(["b@x.com"]));

    let access: Value = guest
        .get("/api/v1/rooms/team-sync/access")
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(access["allowed"], true);
    assert_eq!(access["reason"], "invited");

    let joined: Room = guest.post("/api/v1/rooms").json(&body).send().await?.json().await?;
    assert_eq!(joined.participant_count, 2);

    Ok(())
}

#[tokio::test]
async fn test_invite_on_unknown_room_is_404() -> Result<(), anyhow::Error> {
    let server = TestRegistryServer::spawn().await?;

    let response = server
        .as_principal(&alice())
        .post("/api/v1/rooms/ghost/invite")
        .json(&json!({"emails": ["b@x.com"]}))
        .send()
        .await?;
    assert_eq!(response.status(), 404);

    Ok(())
}

#[tokio::test]
async fn test_end_and_heartbeat_are_idempotent() -> Result<(), anyhow::Error> {
    let server = TestRegistryServer::spawn().await?;
    let as_alice = server.as_principal(&alice());
    as_alice
        .post("/api/v1/rooms")
        .json(&json!({"id": "standup", "title": "Standup", "scope": "personal"}))
        .send()
        .await?;

    for _ in 0..2 {
        let ended = as_alice.post("/api/v1/rooms/standup/end").send().await?;
        assert_eq!(ended.status(), 204);
    }
    let heartbeat = as_alice.post("/api/v1/rooms/standup/heartbeat").send().await?;
    assert_eq!(heartbeat.status(), 204);
    let absent = as_alice.post("/api/v1/rooms/ghost/end").send().await?;
    assert_eq!(absent.status(), 204);

    let listed: ListRoomsResponse = as_alice
        .get("/api/v1/rooms?scope=personal")
        .send()
        .await?
        .json()
        .await?;
    assert!(listed.rooms.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_credential_without_signing_key_is_500() -> Result<(), anyhow::Error> {
    let server = TestRegistryServer::spawn().await?;
    let as_alice = server.as_principal(&alice());
    as_alice
        .post("/api/v1/rooms")
        .json(&json!({"id": "standup", "title": "Standup", "scope": "personal"}))
        .send()
        .await?;

    let response = as_alice.post("/api/v1/rooms/standup/credential").send().await?;
    assert_eq!(response.status(), 500);
    let body: Value = response.json().await?;
    assert_eq!(body["error"]["code"], "CONFIGURATION_ERROR");

    Ok(())
}

#[tokio::test]
async fn test_credential_verifies_against_jwks() -> Result<(), anyhow::Error> {
    let key = test_signing_key(9)?;
    let server = TestRegistryServer::spawn_with_signing_key(&key.to_base64()).await?;
    let as_alice = server.as_principal(&alice());
    let as_bob = server.as_principal(&bob());

    as_alice
        .post("/api/v1/rooms")
        .json(&json!({"id": "lobby", "title": "Lobby", "scope": "global", "media_kind": "audio"}))
        .send()
        .await?;

    let jwks: Jwks = reqwest::get(format!("{}/.well-known/jwks.json", server.url()))
        .await?
        .json()
        .await?;
    assert_eq!(jwks.keys.len(), 1);
    let jwk = &jwks.keys[0];
    assert_eq!(jwk.kid, "test-key");
    assert_eq!(jwk.alg, "EdDSA");
    assert_eq!(jwk.x, key.jwk_x());

    let response = as_bob
        .post("/api/v1/rooms/lobby/credential")
        .json(&json!({"moderator": true, "capabilities": ["microphone", "camera", "chat"]}))
        .send()
        .await?;
    assert_eq!(response.status(), 200);
    let signed: Value = response.json().await?;

    // Non-owner is downgraded; camera is dropped for an audio room.
    assert_eq!(signed["credential"]["moderator"], false);
    assert_eq!(
        signed["credential"]["capabilities"],
        json!(["microphone", "chat"])
    );

    let public_key = URL_SAFE_NO_PAD.decode(&jwk.x)?;
    let options = VerifyOptions::new(
        server.config().credential_issuer.clone(),
        server.config().credential_audience.clone(),
    );
    let claims: Value = verify_eddsa(signed["token"].as_str().unwrap(), &public_key, &options)?;
    assert_eq!(claims["sub"], bob().id);
    assert_eq!(claims["room"], "lobby");
    assert_eq!(claims["moderator"], false);
    assert_eq!(claims["exp"].as_i64().unwrap() - claims["iat"].as_i64().unwrap(), 4 * 3600);

    Ok(())
}

#[tokio::test]
async fn test_credential_denied_for_private_room_of_another() -> Result<(), anyhow::Error> {
    let key = test_signing_key(4)?;
    let server = TestRegistryServer::spawn_with_signing_key(&key.to_base64()).await?;
    server
        .as_principal(&alice())
        .post("/api/v1/rooms")
        .json(&json!({"id": "mine", "title": "Mine", "scope": "personal"}))
        .send()
        .await?;

    let response = server
        .as_principal(&bob())
        .post("/api/v1/rooms/mine/credential")
        .send()
        .await?;
    assert_eq!(response.status(), 403);
    let body: Value = response.json().await?;
    assert_eq!(body["error"]["message"], "private room");

    Ok(())
}
