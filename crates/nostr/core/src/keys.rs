//! Keypair wrapper tying the NIP-01, NIP-04 and NIP-19 helpers to one identity.

use crate::nip01::{self, Event, EventTemplate, Nip01Error};
use crate::nip04::{self, Nip04Error};
use crate::nip19::{self, Nip19Error};
use std::fmt;
use thiserror::Error;

/// Errors that can occur while building or using [`Keys`].
#[derive(Debug, Error)]
pub enum KeyError {
    #[error(transparent)]
    Nip01(#[from] Nip01Error),

    #[error(transparent)]
    Nip19(#[from] Nip19Error),
}

/// A secp256k1 keypair.
#[derive(Clone, PartialEq, Eq)]
pub struct Keys {
    secret_key: [u8; 32],
    public_key: [u8; 32],
}

impl Keys {
    /// Generate a fresh random keypair.
    pub fn generate() -> Self {
        let secret_key = nip01::generate_secret_key();
        // A generated key is always in range.
        let public_key = nip01::get_public_key(&secret_key).unwrap_or_default();
        Self {
            secret_key,
            public_key,
        }
    }

    pub fn from_secret_key(secret_key: [u8; 32]) -> Result<Self, KeyError> {
        let public_key = nip01::get_public_key(&secret_key)?;
        Ok(Self {
            secret_key,
            public_key,
        })
    }

    /// Parse from `nsec1…` or hex.
    pub fn parse(secret: &str) -> Result<Self, KeyError> {
        Self::from_secret_key(nip19::parse_secret_key(secret)?)
    }

    pub fn secret_key(&self) -> &[u8; 32] {
        &self.secret_key
    }

    pub fn public_key(&self) -> &[u8; 32] {
        &self.public_key
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key)
    }

    pub fn npub(&self) -> Result<String, KeyError> {
        Ok(nip19::encode_npub(&self.public_key)?)
    }

    pub fn nsec(&self) -> Result<String, KeyError> {
        Ok(nip19::encode_nsec(&self.secret_key)?)
    }

    /// Sign a template, assigning the event id.
    pub fn sign(&self, template: &EventTemplate) -> Result<Event, KeyError> {
        Ok(nip01::finalize_event(template, &self.secret_key)?)
    }

    /// NIP-04 encrypt for `recipient`.
    pub fn encrypt(&self, recipient: &[u8; 32], plaintext: &str) -> Result<String, Nip04Error> {
        nip04::encrypt(&self.secret_key, recipient, plaintext)
    }

    /// NIP-04 decrypt a payload exchanged with `peer`.
    pub fn decrypt(&self, peer: &[u8; 32], content: &str) -> Result<String, Nip04Error> {
        nip04::decrypt(&self.secret_key, peer, content)
    }
}

impl fmt::Debug for Keys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keys")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}
