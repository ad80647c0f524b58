//! Deterministic cryptographic fixtures for testing
//!
//! Provides reproducible Ed25519 signing keys in the base64 PKCS#8 form the
//! registry reads from `RR_SIGNING_KEY`.

use base64::engine::general_purpose;
use base64::Engine;
use ring::signature::{Ed25519KeyPair, KeyPair};
use thiserror::Error;

/// Test fixture error type
#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("Cryptographic operation failed: {0}")]
    Crypto(String),
}

/// A deterministic Ed25519 signing key.
#[derive(Clone)]
pub struct TestSigningKey {
    /// PKCS#8 v1 document.
    pub pkcs8: Vec<u8>,

    /// Raw 32-byte public key.
    pub public_key: Vec<u8>,
}

impl TestSigningKey {
    /// The key as `RR_SIGNING_KEY` expects it (standard base64).
    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(&self.pkcs8)
    }

    /// The `x` member of the matching OKP JWK.
    pub fn jwk_x(&self) -> String {
        general_purpose::URL_SAFE_NO_PAD.encode(&self.public_key)
    }
}

/// Generate a deterministic Ed25519 signing key for testing.
///
/// The same seed always produces the same keypair.
///
/// # Example
/// ```rust,ignore
/// let key = test_signing_key(1)?;
/// assert_eq!(key.to_base64(), test_signing_key(1)?.to_base64());
/// ```
pub fn test_signing_key(seed: u8) -> Result<TestSigningKey, FixtureError> {
    let mut seed_bytes = [0u8; 32];
    seed_bytes[0] = seed;
    for (i, byte) in seed_bytes.iter_mut().enumerate().skip(1) {
        *byte = seed.wrapping_mul(i as u8).wrapping_add(i as u8);
    }

    let key_pair = Ed25519KeyPair::from_seed_unchecked(&seed_bytes)
        .map_err(|e| FixtureError::Crypto(format!("Failed to generate test keypair: {:?}", e)))?;

    Ok(TestSigningKey {
        pkcs8: build_pkcs8_from_seed(&seed_bytes),
        public_key: key_pair.public_key().as_ref().to_vec(),
    })
}

/// Build a PKCS#8 v1 document from an Ed25519 seed.
///
/// Test-only. Production keys come from `ring::rand::SystemRandom`.
fn build_pkcs8_from_seed(seed: &[u8; 32]) -> Vec<u8> {
    // SEQUENCE { version INTEGER 0, AlgorithmIdentifier { OID 1.3.101.112 },
    //            privateKey OCTET STRING { OCTET STRING seed } }
    let mut pkcs8 = Vec::with_capacity(48);

    pkcs8.extend_from_slice(&[0x30, 0x2e]);
    pkcs8.extend_from_slice(&[0x02, 0x01, 0x00]);
    pkcs8.extend_from_slice(&[0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70]);
    pkcs8.extend_from_slice(&[0x04, 0x22, 0x04, 0x20]);
    pkcs8.extend_from_slice(seed);

    pkcs8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signing_key_is_deterministic() {
        let a = test_signing_key(1).unwrap();
        let b = test_signing_key(1).unwrap();
        let c = test_signing_key(2).unwrap();

        assert_eq!(a.pkcs8, b.pkcs8);
        assert_eq!(a.public_key, b.public_key);
        assert_ne!(a.public_key, c.public_key);
    }

    #[test]
    fn test_signing_key_parses_as_pkcs8() {
        let key = test_signing_key(7).unwrap();
        let parsed = Ed25519KeyPair::from_pkcs8_maybe_unchecked(&key.pkcs8).unwrap();
        assert_eq!(parsed.public_key().as_ref(), key.public_key.as_slice());
    }

    #[test]
    fn test_base64_round_trips_through_registry_decoder() {
        let key = test_signing_key(3).unwrap();
        let decoded = common::jwt::decode_signing_key(&key.to_base64()).unwrap();
        assert_eq!(decoded, key.pkcs8);
        assert_eq!(key.jwk_x(), common::jwt::encode_public_key_jwk(&key.public_key));
    }
}
