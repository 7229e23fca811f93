//! Plaintext payloads and how pulled payloads are materialized.

use crate::envelope::PayloadType;
use crate::error::{EmperorError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

/// What a sender pushes.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Any JSON value; a plain text message is a JSON string.
    Message(Value),
    /// Raw bytes, carried base64-encoded.
    File(Vec<u8>),
}

impl Payload {
    pub fn text(text: impl Into<String>) -> Self {
        Payload::Message(Value::String(text.into()))
    }

    pub fn payload_type(&self) -> PayloadType {
        match self {
            Payload::Message(_) => PayloadType::Message,
            Payload::File(_) => PayloadType::File,
        }
    }

    /// The JSON text that gets encrypted.
    pub fn to_plaintext(&self) -> Result<String> {
        let value = match self {
            Payload::Message(value) => value.clone(),
            Payload::File(bytes) => Value::String(BASE64.encode(bytes)),
        };
        Ok(serde_json::to_string(&value)?)
    }

    /// Inverse of [`Payload::to_plaintext`] for a given envelope type.
    pub fn from_plaintext(payload_type: &PayloadType, plaintext: &str) -> Result<Self> {
        if payload_type.is_file() {
            let encoded: String = serde_json::from_str(plaintext)
                .map_err(|e| EmperorError::Payload(format!("file payload is not a JSON string: {}", e)))?;
            let bytes = BASE64
                .decode(encoded.as_bytes())
                .map_err(|e| EmperorError::Payload(format!("file payload is not base64: {}", e)))?;
            return Ok(Payload::File(bytes));
        }

        // Legacy senders may have produced text that is not JSON at all.
        let value = serde_json::from_str(plaintext)
            .unwrap_or_else(|_| Value::String(plaintext.to_string()));
        Ok(Payload::Message(value))
    }
}

/// Result of a successful pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pulled {
    Message {
        publish_id: String,
        /// A JSON string unwrapped, anything else as JSON text
        text: String,
    },
    File {
        publish_id: String,
        path: PathBuf,
        size: usize,
    },
}

impl Pulled {
    pub fn publish_id(&self) -> &str {
        match self {
            Pulled::Message { publish_id, .. } | Pulled::File { publish_id, .. } => publish_id,
        }
    }

    /// Turn a decrypted payload into its final form, saving files into `output_dir`.
    pub fn materialize(publish_id: String, payload: Payload, output_dir: &Path) -> Result<Self> {
        match payload {
            Payload::Message(Value::String(text)) => Ok(Pulled::Message { publish_id, text }),
            Payload::Message(value) => Ok(Pulled::Message {
                publish_id,
                text: value.to_string(),
            }),
            Payload::File(bytes) => {
                let path = save_file(output_dir, &bytes)?;
                Ok(Pulled::File {
                    publish_id,
                    path,
                    size: bytes.len(),
                })
            }
        }
    }
}

/// Write `bytes` to a freshly named file in `dir`. Existing files are never
/// overwritten.
pub fn save_file(dir: &Path, bytes: &[u8]) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;

    loop {
        let path = dir.join(Uuid::new_v4().simple().to_string());
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(bytes)?;
                file.sync_all()?;
                info!("Saved {} bytes to {}", bytes.len(), path.display());
                return Ok(path);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }
}
