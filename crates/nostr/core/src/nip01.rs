//! NIP-01: Basic protocol flow description.
//!
//! Event structure, canonical serialization, id derivation, BIP-340 signing
//! and verification.

use bitcoin::hashes::{Hash, sha256};
use bitcoin::key::Secp256k1;
use bitcoin::secp256k1::{Message, SecretKey, XOnlyPublicKey, schnorr};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Errors that can occur during NIP-01 operations.
#[derive(Debug, Error)]
pub enum Nip01Error {
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("signing error: {0}")]
    Signing(String),

    #[error("verification error: {0}")]
    Verification(String),

    #[error("invalid secret key: {0}")]
    InvalidSecretKey(String),
}

/// A signed Nostr event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// 32-bytes lowercase hex-encoded sha256 of the serialized event data
    pub id: String,
    /// 32-bytes lowercase hex-encoded public key of the event creator
    pub pubkey: String,
    /// Unix timestamp in seconds
    pub created_at: u64,
    /// Event kind (integer between 0 and 65535)
    pub kind: u16,
    /// Array of arrays of strings (tags)
    pub tags: Vec<Vec<String>>,
    /// Arbitrary string content
    pub content: String,
    /// 64-bytes lowercase hex signature
    pub sig: String,
}

impl Event {
    /// The unsigned part of the event, used to recompute the id.
    pub fn unsigned(&self) -> UnsignedEvent {
        UnsignedEvent {
            pubkey: self.pubkey.clone(),
            created_at: self.created_at,
            kind: self.kind,
            tags: self.tags.clone(),
            content: self.content.clone(),
        }
    }
}

/// An unsigned event (before signing).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedEvent {
    pub pubkey: String,
    pub created_at: u64,
    pub kind: u16,
    pub tags: Vec<Vec<String>>,
    pub content: String,
}

/// A template for creating events. The pubkey comes from the signing key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTemplate {
    /// Unix timestamp in seconds
    pub created_at: u64,
    /// Event kind
    pub kind: u16,
    /// Array of arrays of strings (tags)
    pub tags: Vec<Vec<String>>,
    /// Arbitrary string content
    pub content: String,
}

impl EventTemplate {
    /// Template stamped with the current time and no tags.
    pub fn new(kind: u16, content: impl Into<String>) -> Self {
        Self {
            created_at: now(),
            kind,
            tags: Vec::new(),
            content: content.into(),
        }
    }
}

/// Current unix time in seconds.
pub fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Generate a random 32-byte secret key.
pub fn generate_secret_key() -> [u8; 32] {
    loop {
        let mut key = [0u8; 32];
        rand::rng().fill_bytes(&mut key);
        // Out-of-range scalars are astronomically rare but not impossible.
        if SecretKey::from_slice(&key).is_ok() {
            return key;
        }
    }
}

/// Get the x-only public key (32 bytes) from a secret key.
pub fn get_public_key(secret_key: &[u8; 32]) -> Result<[u8; 32], Nip01Error> {
    let secp = Secp256k1::new();
    let sk = SecretKey::from_slice(secret_key)
        .map_err(|e| Nip01Error::InvalidSecretKey(e.to_string()))?;
    let (xonly, _parity) = sk.x_only_public_key(&secp);
    Ok(xonly.serialize())
}

/// Get the public key as a hex string from a secret key.
pub fn get_public_key_hex(secret_key: &[u8; 32]) -> Result<String, Nip01Error> {
    Ok(hex::encode(get_public_key(secret_key)?))
}

/// Serialize an unsigned event for hashing.
///
/// Format: `[0, pubkey, created_at, kind, tags, content]`
pub fn serialize_event(event: &UnsignedEvent) -> Result<String, Nip01Error> {
    if !validate_unsigned_event(event) {
        return Err(Nip01Error::InvalidEvent(
            "can't serialize event with wrong or missing properties".to_string(),
        ));
    }

    serde_json::to_string(&(
        0,
        &event.pubkey,
        event.created_at,
        event.kind,
        &event.tags,
        &event.content,
    ))
    .map_err(|e| Nip01Error::Serialization(e.to_string()))
}

/// Get the event hash (id) from an unsigned event.
pub fn get_event_hash(event: &UnsignedEvent) -> Result<String, Nip01Error> {
    let serialized = serialize_event(event)?;
    let hash = sha256::Hash::hash(serialized.as_bytes());
    Ok(hex::encode(hash.as_byte_array()))
}

fn is_lower_hex(value: &str, len: usize) -> bool {
    value.len() == len
        && value
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

/// Validate an unsigned event structure (pubkey must be 64 lowercase hex chars).
pub fn validate_unsigned_event(event: &UnsignedEvent) -> bool {
    is_lower_hex(&event.pubkey, 64)
}

/// Validate a signed event structure (not including signature verification).
pub fn validate_event(event: &Event) -> bool {
    is_lower_hex(&event.id, 64) && is_lower_hex(&event.pubkey, 64) && is_lower_hex(&event.sig, 128)
}

/// Sign an event template with a secret key, producing a complete signed event.
///
/// The id is content-derived, so signing the same template twice yields the
/// same id.
pub fn finalize_event(
    template: &EventTemplate,
    secret_key: &[u8; 32],
) -> Result<Event, Nip01Error> {
    let secp = Secp256k1::new();
    let sk = SecretKey::from_slice(secret_key).map_err(|e| Nip01Error::Signing(e.to_string()))?;
    let keypair = bitcoin::secp256k1::Keypair::from_secret_key(&secp, &sk);
    let (xonly_pk, _parity) = keypair.x_only_public_key();

    let unsigned = UnsignedEvent {
        pubkey: hex::encode(xonly_pk.serialize()),
        created_at: template.created_at,
        kind: template.kind,
        tags: template.tags.clone(),
        content: template.content.clone(),
    };
    let id = get_event_hash(&unsigned)?;

    let id_bytes =
        hex::decode(&id).map_err(|e| Nip01Error::Signing(format!("invalid id hex: {}", e)))?;
    let message = Message::from_digest_slice(&id_bytes)
        .map_err(|e| Nip01Error::Signing(format!("invalid message: {}", e)))?;
    let sig = secp.sign_schnorr_no_aux_rand(&message, &keypair);

    Ok(Event {
        id,
        pubkey: unsigned.pubkey,
        created_at: unsigned.created_at,
        kind: unsigned.kind,
        tags: unsigned.tags,
        content: unsigned.content,
        sig: hex::encode(sig.serialize()),
    })
}

/// Verify an event's id and signature.
///
/// Returns `Ok(false)` for structurally valid events whose id or signature do
/// not check out, and an error only when a field cannot be decoded at all.
pub fn verify_event(event: &Event) -> Result<bool, Nip01Error> {
    if !validate_event(event) {
        return Ok(false);
    }

    if get_event_hash(&event.unsigned())? != event.id {
        return Ok(false);
    }

    let secp = Secp256k1::verification_only();

    let id_bytes = hex::decode(&event.id)
        .map_err(|e| Nip01Error::Verification(format!("invalid id hex: {}", e)))?;
    let message = Message::from_digest_slice(&id_bytes)
        .map_err(|e| Nip01Error::Verification(format!("invalid message: {}", e)))?;

    let sig_bytes = hex::decode(&event.sig)
        .map_err(|e| Nip01Error::Verification(format!("invalid sig hex: {}", e)))?;
    let sig = schnorr::Signature::from_slice(&sig_bytes)
        .map_err(|e| Nip01Error::Verification(format!("invalid signature: {}", e)))?;

    let pubkey_bytes = hex::decode(&event.pubkey)
        .map_err(|e| Nip01Error::Verification(format!("invalid pubkey hex: {}", e)))?;
    let pubkey = match XOnlyPublicKey::from_slice(&pubkey_bytes) {
        Ok(pk) => pk,
        // Not a point on the curve: the event can't have been signed by it.
        Err(_) => return Ok(false),
    };

    Ok(secp.verify_schnorr(&sig, &message, &pubkey).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_PRIVATE_KEY: &str =
        "d217c1ff2f8a65c3e3a1740db3b9f58b8c848bb45e26d00ed4714e4a0f4ceecf";

    fn test_private_key() -> [u8; 32] {
        let bytes = hex::decode(TEST_PRIVATE_KEY).unwrap();
        let mut key = [0u8; 32];
        key.copy_from_slice(&bytes);
        key
    }

    fn template(content: &str) -> EventTemplate {
        EventTemplate {
            created_at: 1617932115,
            kind: 892,
            tags: vec![],
            content: content.to_string(),
        }
    }

    #[test]
    fn test_generated_key_is_usable() {
        let sk = generate_secret_key();
        let pk = get_public_key_hex(&sk).unwrap();
        assert_eq!(pk.len(), 64);
        assert!(is_lower_hex(&pk, 64));
    }

    #[test]
    fn test_zero_secret_key_rejected() {
        assert!(get_public_key(&[0u8; 32]).is_err());
        assert!(finalize_event(&template("x"), &[0u8; 32]).is_err());
    }

    #[test]
    fn test_serialize_event_format() {
        let public_key = get_public_key_hex(&test_private_key()).unwrap();
        let unsigned = UnsignedEvent {
            pubkey: public_key.clone(),
            created_at: 1617932115,
            kind: 892,
            tags: vec![],
            content: "{\"data\":\"abc\",\"type\":\"message\"}".to_string(),
        };

        let serialized = serialize_event(&unsigned).unwrap();
        let expected = format!(
            "[0,\"{}\",1617932115,892,[],\"{{\\\"data\\\":\\\"abc\\\",\\\"type\\\":\\\"message\\\"}}\"]",
            public_key
        );
        assert_eq!(serialized, expected);
    }

    #[test]
    fn test_serialize_rejects_uppercase_pubkey() {
        let public_key = get_public_key_hex(&test_private_key()).unwrap();
        let unsigned = UnsignedEvent {
            pubkey: public_key.to_uppercase(),
            created_at: 0,
            kind: 1,
            tags: vec![],
            content: String::new(),
        };
        assert!(serialize_event(&unsigned).is_err());
    }

    #[test]
    fn test_finalize_and_verify() {
        let sk = test_private_key();
        let event = finalize_event(&template("hello"), &sk).unwrap();

        assert_eq!(event.pubkey, get_public_key_hex(&sk).unwrap());
        assert_eq!(event.kind, 892);
        assert_eq!(event.id, get_event_hash(&event.unsigned()).unwrap());
        assert!(verify_event(&event).unwrap());
    }

    #[test]
    fn test_id_is_content_derived() {
        let sk = test_private_key();
        let a = finalize_event(&template("same"), &sk).unwrap();
        let b = finalize_event(&template("same"), &sk).unwrap();
        let c = finalize_event(&template("different"), &sk).unwrap();

        assert_eq!(a.id, b.id);
        assert_eq!(a.sig, b.sig);
        assert_ne!(a.id, c.id);
    }

    #[test]
    fn test_tampered_content_fails_verification() {
        let mut event = finalize_event(&template("original"), &test_private_key()).unwrap();
        event.content = "forged".to_string();
        assert!(!verify_event(&event).unwrap());
    }

    #[test]
    fn test_foreign_signature_fails_verification() {
        let event = finalize_event(&template("original"), &test_private_key()).unwrap();
        let other = finalize_event(&template("original"), &generate_secret_key()).unwrap();

        let mut forged = event.clone();
        forged.sig = other.sig;
        assert!(!verify_event(&forged).unwrap());
    }

    #[test]
    fn test_malformed_fields_fail_validation() {
        let mut event = finalize_event(&template("x"), &test_private_key()).unwrap();
        event.sig = "zz".repeat(64);
        assert!(!validate_event(&event));
        assert!(!verify_event(&event).unwrap());
    }

    #[test]
    fn test_event_json_roundtrip() {
        let event = finalize_event(&template("json"), &test_private_key()).unwrap();
        let json = serde_json::to_string(&event).unwrap();
        let parsed: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
        assert!(verify_event(&parsed).unwrap());
    }

    #[test]
    fn test_template_new_uses_current_time() {
        let before = now();
        let template = EventTemplate::new(892, "content");
        assert!(template.created_at >= before);
        assert!(template.tags.is_empty());
    }
}
