//! Encryption adapter.

use crate::error::Result;
use nostr::Keys;

/// Encrypts payload text between the local identity and a peer.
pub trait Cipher: Send + Sync {
    fn encrypt(&self, identity: &Keys, recipient: &[u8; 32], plaintext: &str) -> Result<String>;

    /// `peer` is the other party of the exchange (the sender when pulling).
    fn decrypt(&self, identity: &Keys, peer: &[u8; 32], ciphertext: &str) -> Result<String>;
}

/// NIP-04: AES-256-CBC keyed by the ECDH shared secret.
#[derive(Debug, Clone, Copy, Default)]
pub struct Nip04Cipher;

impl Cipher for Nip04Cipher {
    fn encrypt(&self, identity: &Keys, recipient: &[u8; 32], plaintext: &str) -> Result<String> {
        Ok(identity.encrypt(recipient, plaintext)?)
    }

    fn decrypt(&self, identity: &Keys, peer: &[u8; 32], ciphertext: &str) -> Result<String> {
        Ok(identity.decrypt(peer, ciphertext)?)
    }
}
