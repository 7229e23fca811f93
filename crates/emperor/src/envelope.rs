//! Envelope codec: the JSON wrapper carried in an event's `content`.
//!
//! ```json
//! {"data": "<nip04 ciphertext>", "type": "message"}
//! ```

use crate::error::{EmperorError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Event kind reserved for emperor envelopes.
pub const APP_KIND: u16 = 892;

/// What the ciphertext decrypts to.
///
/// Unrecognized tags (e.g. the legacy `emperor`) are kept verbatim and read
/// as messages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PayloadType {
    Message,
    File,
    Other(String),
}

impl PayloadType {
    pub fn as_str(&self) -> &str {
        match self {
            PayloadType::Message => "message",
            PayloadType::File => "file",
            PayloadType::Other(tag) => tag,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, PayloadType::File)
    }
}

impl From<String> for PayloadType {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "message" => PayloadType::Message,
            "file" => PayloadType::File,
            _ => PayloadType::Other(tag),
        }
    }
}

impl From<&str> for PayloadType {
    fn from(tag: &str) -> Self {
        PayloadType::from(tag.to_string())
    }
}

impl From<PayloadType> for String {
    fn from(payload_type: PayloadType) -> Self {
        match payload_type {
            PayloadType::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for PayloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Ciphertext of the JSON-encoded payload
    pub data: String,
    #[serde(rename = "type")]
    pub payload_type: PayloadType,
}

/// Wrap `ciphertext` into event content.
pub fn encode(ciphertext: &str, payload_type: &PayloadType) -> Result<String> {
    let envelope = Envelope {
        data: ciphertext.to_string(),
        payload_type: payload_type.clone(),
    };
    serde_json::to_string(&envelope).map_err(|e| EmperorError::Envelope(e.to_string()))
}

/// Parse event content back into an [`Envelope`].
pub fn decode(content: &str) -> Result<Envelope> {
    serde_json::from_str(content).map_err(|e| EmperorError::Envelope(e.to_string()))
}
