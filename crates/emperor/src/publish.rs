//! Publish protocol: encrypt, wrap, sign, then broadcast until a relay takes it.

use crate::cipher::Cipher;
use crate::envelope::{self, APP_KIND};
use crate::error::Result;
use crate::payload::Payload;
use crate::retry::{retry_until_accepted, sleep_or_cancel};
use nostr::{EventTemplate, Keys};
use nostr_client::{ClientError, ClientMessage, RelayTransport};
use serde::Serialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct PublishOptions {
    /// Wait between rejected writes
    pub retry_backoff: Duration,
    /// Wait after the first accepted write so in-flight frames flush
    pub settle: Duration,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            retry_backoff: Duration::from_secs(1),
            settle: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishReceipt {
    /// Event id of the envelope; what the recipient pulls by
    pub publish_id: String,
    #[serde(skip)]
    pub attempts: u32,
}

/// Publish `payload` for `recipient` and close `session` afterwards.
///
/// Transport failures are retried forever; only `cancel` ends the loop early,
/// in which case no publish id is returned.
pub async fn publish<S, C>(
    session: &S,
    identity: &Keys,
    cipher: &C,
    recipient: &[u8; 32],
    payload: &Payload,
    options: &PublishOptions,
    cancel: &CancellationToken,
) -> Result<PublishReceipt>
where
    S: RelayTransport + ?Sized,
    C: Cipher + ?Sized,
{
    let outcome = publish_envelope(session, identity, cipher, recipient, payload, options, cancel).await;
    session.close().await;
    outcome
}

async fn publish_envelope<S, C>(
    session: &S,
    identity: &Keys,
    cipher: &C,
    recipient: &[u8; 32],
    payload: &Payload,
    options: &PublishOptions,
    cancel: &CancellationToken,
) -> Result<PublishReceipt>
where
    S: RelayTransport + ?Sized,
    C: Cipher + ?Sized,
{
    let plaintext = payload.to_plaintext()?;
    let ciphertext = cipher.encrypt(identity, recipient, &plaintext)?;
    let content = envelope::encode(&ciphertext, &payload.payload_type())?;
    let event = identity.sign(&EventTemplate::new(APP_KIND, content))?;
    let frame = ClientMessage::Event(event.clone())
        .to_json()
        .map_err(ClientError::from)?;

    info!(publish_id = %event.id, payload_type = %payload.payload_type(), "Publishing envelope");

    let accepted =
        retry_until_accepted(options.retry_backoff, cancel, || session.publish_raw(&frame)).await?;
    debug!(
        relays = accepted.value,
        attempts = accepted.attempts,
        "Envelope accepted by transport"
    );

    sleep_or_cancel(options.settle, cancel).await?;

    Ok(PublishReceipt {
        publish_id: event.id,
        attempts: accepted.attempts,
    })
}
