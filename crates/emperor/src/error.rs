//! Emperor error types

use nostr::{KeyError, Nip04Error};
use nostr_client::ClientError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmperorError {
    /// The cancellation token fired before the operation completed
    #[error("operation cancelled")]
    Cancelled,

    /// No retrieved event matched and decrypted
    #[error("no matching envelope found{}", .publish_id.as_deref().map(|id| format!(" for {}", id)).unwrap_or_default())]
    NotFound { publish_id: Option<String> },

    #[error("invalid publish id {0:?}: expected 64 hex characters")]
    InvalidPublishId(String),

    #[error("invalid envelope: {0}")]
    Envelope(String),

    #[error("invalid payload: {0}")]
    Payload(String),

    #[error("encryption error: {0}")]
    Crypto(#[from] Nip04Error),

    #[error("key error: {0}")]
    Key(#[from] KeyError),

    #[error("identity error: {0}")]
    Identity(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("relay error: {0}")]
    Relay(#[from] ClientError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EmperorError>;
