//! NIP-04: Encrypted Direct Message.
//!
//! AES-256-CBC keyed with the x coordinate of the ECDH point between the
//! sender's secret key and the recipient's public key. The wire form is
//! `base64(ciphertext) + "?iv=" + base64(iv)`.

use aes::Aes256;
use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bitcoin::secp256k1::{Parity, PublicKey, SecretKey, XOnlyPublicKey, ecdh};
use rand::RngCore;
use thiserror::Error;

const IV_SEPARATOR: &str = "?iv=";

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Errors that can occur during NIP-04 operations.
#[derive(Debug, Error)]
pub enum Nip04Error {
    #[error("invalid secret key: {0}")]
    InvalidSecretKey(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption failed: {0}")]
    Decryption(String),
}

/// x coordinate of `secret_key * public_key`.
fn shared_key(secret_key: &[u8; 32], public_key: &[u8; 32]) -> Result<[u8; 32], Nip04Error> {
    let sk =
        SecretKey::from_slice(secret_key).map_err(|e| Nip04Error::InvalidSecretKey(e.to_string()))?;
    let xonly = XOnlyPublicKey::from_slice(public_key)
        .map_err(|e| Nip04Error::InvalidPublicKey(e.to_string()))?;
    // Both parities share an x coordinate, so the ECDH x coordinate is too.
    let pk = PublicKey::from_x_only_public_key(xonly, Parity::Even);

    let point = ecdh::shared_secret_point(&pk, &sk);
    let mut key = [0u8; 32];
    key.copy_from_slice(&point[..32]);
    Ok(key)
}

/// Encrypt `plaintext` from the owner of `secret_key` to the x-only `public_key`.
pub fn encrypt(
    secret_key: &[u8; 32],
    public_key: &[u8; 32],
    plaintext: &str,
) -> Result<String, Nip04Error> {
    let key = shared_key(secret_key, public_key)?;

    let mut iv = [0u8; 16];
    rand::rng().fill_bytes(&mut iv);

    let ciphertext = Aes256CbcEnc::new_from_slices(&key, &iv)
        .map_err(|e| Nip04Error::Encryption(e.to_string()))?
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

    Ok(format!(
        "{}{}{}",
        BASE64.encode(ciphertext),
        IV_SEPARATOR,
        BASE64.encode(iv)
    ))
}

/// Decrypt a NIP-04 payload exchanged between the owner of `secret_key` and
/// the x-only `public_key` of the other party.
pub fn decrypt(
    secret_key: &[u8; 32],
    public_key: &[u8; 32],
    content: &str,
) -> Result<String, Nip04Error> {
    let (ciphertext_b64, iv_b64) = content
        .split_once(IV_SEPARATOR)
        .ok_or_else(|| Nip04Error::InvalidPayload("missing iv".to_string()))?;

    let ciphertext = BASE64
        .decode(ciphertext_b64)
        .map_err(|e| Nip04Error::InvalidPayload(format!("ciphertext: {}", e)))?;
    let iv = BASE64
        .decode(iv_b64)
        .map_err(|e| Nip04Error::InvalidPayload(format!("iv: {}", e)))?;
    if iv.len() != 16 {
        return Err(Nip04Error::InvalidPayload(format!(
            "iv must be 16 bytes, got {}",
            iv.len()
        )));
    }

    let key = shared_key(secret_key, public_key)?;
    let plaintext = Aes256CbcDec::new_from_slices(&key, &iv)
        .map_err(|e| Nip04Error::Decryption(e.to_string()))?
        .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        .map_err(|e| Nip04Error::Decryption(e.to_string()))?;

    String::from_utf8(plaintext).map_err(|e| Nip04Error::Decryption(e.to_string()))
}
