//! NIP-19: bech32-encoded entities.
//!
//! Only the bare key forms (`npub`, `nsec`) are supported.

use bech32::{Bech32, Hrp};
use thiserror::Error;

const HRP_NPUB: Hrp = Hrp::parse_unchecked("npub");
const HRP_NSEC: Hrp = Hrp::parse_unchecked("nsec");

/// Errors that can occur during NIP-19 operations.
#[derive(Debug, Error)]
pub enum Nip19Error {
    #[error("bech32 encoding error: {0}")]
    Encode(String),

    #[error("bech32 decoding error: {0}")]
    Decode(String),

    #[error("unsupported prefix: {0}")]
    UnsupportedPrefix(String),

    #[error("invalid data length: expected 32 bytes, got {0}")]
    InvalidLength(usize),

    #[error("invalid hex key: {0}")]
    InvalidHex(String),
}

/// A decoded NIP-19 entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nip19Entity {
    /// `npub`: x-only public key
    Pubkey([u8; 32]),
    /// `nsec`: secret key
    Secret([u8; 32]),
}

fn encode(hrp: Hrp, data: &[u8; 32]) -> Result<String, Nip19Error> {
    bech32::encode::<Bech32>(hrp, data).map_err(|e| Nip19Error::Encode(e.to_string()))
}

fn to_array(data: &[u8]) -> Result<[u8; 32], Nip19Error> {
    data.try_into()
        .map_err(|_| Nip19Error::InvalidLength(data.len()))
}

/// Encode a public key as `npub1…`.
pub fn encode_npub(public_key: &[u8; 32]) -> Result<String, Nip19Error> {
    encode(HRP_NPUB, public_key)
}

/// Encode a secret key as `nsec1…`.
pub fn encode_nsec(secret_key: &[u8; 32]) -> Result<String, Nip19Error> {
    encode(HRP_NSEC, secret_key)
}

/// Decode an `npub` or `nsec` string.
pub fn decode(value: &str) -> Result<Nip19Entity, Nip19Error> {
    let (hrp, data) = bech32::decode(value).map_err(|e| Nip19Error::Decode(e.to_string()))?;

    match hrp.to_lowercase().as_str() {
        "npub" => Ok(Nip19Entity::Pubkey(to_array(&data)?)),
        "nsec" => Ok(Nip19Entity::Secret(to_array(&data)?)),
        other => Err(Nip19Error::UnsupportedPrefix(other.to_string())),
    }
}

/// Parse a public key given either as `npub1…` or as 64 hex characters.
pub fn parse_public_key(value: &str) -> Result<[u8; 32], Nip19Error> {
    let value = value.trim();
    if value.to_lowercase().starts_with("npub1") {
        return match decode(value)? {
            Nip19Entity::Pubkey(pk) => Ok(pk),
            Nip19Entity::Secret(_) => Err(Nip19Error::UnsupportedPrefix("nsec".to_string())),
        };
    }

    let bytes = hex::decode(value).map_err(|e| Nip19Error::InvalidHex(e.to_string()))?;
    to_array(&bytes)
}

/// Parse a secret key given either as `nsec1…` or as 64 hex characters.
pub fn parse_secret_key(value: &str) -> Result<[u8; 32], Nip19Error> {
    let value = value.trim();
    if value.to_lowercase().starts_with("nsec1") {
        return match decode(value)? {
            Nip19Entity::Secret(sk) => Ok(sk),
            Nip19Entity::Pubkey(_) => Err(Nip19Error::UnsupportedPrefix("npub".to_string())),
        };
    }

    let bytes = hex::decode(value).map_err(|e| Nip19Error::InvalidHex(e.to_string()))?;
    to_array(&bytes)
}
