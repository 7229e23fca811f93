//! Nostr protocol primitives for Emperor.
//!
//! This crate provides:
//! - NIP-01: Basic protocol (events, signing, verification)
//! - NIP-04: Encrypted Direct Messages
//! - NIP-19: bech32-encoded keys (`npub`, `nsec`)
//! - [`Keys`]: a keypair tying the above together

mod keys;
mod nip01;
mod nip04;
mod nip19;

pub use keys::{KeyError, Keys};

// NIP-01: Basic protocol
pub use nip01::{
    Event, EventTemplate, Nip01Error, UnsignedEvent, finalize_event, generate_secret_key,
    get_event_hash, get_public_key, get_public_key_hex, now, serialize_event, validate_event,
    validate_unsigned_event, verify_event,
};

// NIP-04: Encrypted Direct Messages
pub use nip04::{Nip04Error, decrypt, encrypt};

// NIP-19: bech32-encoded entities
pub use nip19::{
    Nip19Entity, Nip19Error, decode, encode_npub, encode_nsec, parse_public_key,
    parse_secret_key,
};
