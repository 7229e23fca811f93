//! Subscribe protocol: request the sender's envelopes, wait, then take the
//! first event that verifies and decrypts.

use crate::cipher::Cipher;
use crate::envelope::{self, APP_KIND};
use crate::error::{EmperorError, Result};
use crate::payload::{Payload, Pulled};
use crate::retry::{retry_until_accepted, sleep_or_cancel};
use nostr::{Event, Keys};
use nostr_client::{ClientError, ClientMessage, Filter, RelayTransport, generate_subscription_id};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct PullOptions {
    /// Wait between rejected REQ writes
    pub retry_backoff: Duration,
    /// How long relays get to replay stored events
    pub settle: Duration,
    /// Where file payloads are written
    pub output_dir: PathBuf,
}

impl Default for PullOptions {
    fn default() -> Self {
        Self {
            retry_backoff: Duration::from_secs(1),
            settle: Duration::from_secs(10),
            output_dir: PathBuf::from("."),
        }
    }
}

/// Why a pooled event was passed over.
#[derive(Debug, Error)]
enum Skip {
    #[error("id does not match")]
    Id,
    #[error("author does not match")]
    Author,
    #[error("kind {0} is not an envelope")]
    Kind(u16),
    #[error("signature does not verify")]
    Signature,
    #[error(transparent)]
    Open(#[from] EmperorError),
}

/// Fetch and decode the envelope `sender` published for us.
///
/// With `expected_id` only that event is accepted; without it the first valid
/// envelope from `sender` wins. The subscription is closed and `session` torn
/// down on every path.
pub async fn pull<S, C>(
    session: &S,
    identity: &Keys,
    cipher: &C,
    sender: &[u8; 32],
    expected_id: Option<&str>,
    options: &PullOptions,
    cancel: &CancellationToken,
) -> Result<Pulled>
where
    S: RelayTransport + ?Sized,
    C: Cipher + ?Sized,
{
    let subscription_id = generate_subscription_id();
    let outcome = pull_envelope(
        session,
        identity,
        cipher,
        sender,
        expected_id,
        options,
        cancel,
        &subscription_id,
    )
    .await;

    if let Err(e) = session.close_subscription(&subscription_id).await {
        debug!("CLOSE for {} not sent: {}", subscription_id, e);
    }
    session.close().await;
    outcome
}

async fn pull_envelope<S, C>(
    session: &S,
    identity: &Keys,
    cipher: &C,
    sender: &[u8; 32],
    expected_id: Option<&str>,
    options: &PullOptions,
    cancel: &CancellationToken,
    subscription_id: &str,
) -> Result<Pulled>
where
    S: RelayTransport + ?Sized,
    C: Cipher + ?Sized,
{
    let sender_hex = hex::encode(sender);
    let mut filter = Filter::new()
        .authors(vec![sender_hex.clone()])
        .kinds(vec![APP_KIND]);
    if let Some(id) = expected_id {
        filter = filter.ids(vec![id.to_string()]);
    }

    session.register_subscription(subscription_id, vec![filter.clone()]);
    let request = ClientMessage::req(subscription_id, vec![filter])
        .to_json()
        .map_err(ClientError::from)?;

    info!(subscription_id, sender = %sender_hex, "Requesting envelopes");
    retry_until_accepted(options.retry_backoff, cancel, || session.publish_raw(&request)).await?;
    sleep_or_cancel(options.settle, cancel).await?;

    for pooled in session.drain_pool() {
        match open_envelope(&pooled.event, identity, cipher, sender, &sender_hex, expected_id) {
            Ok(payload) => {
                info!(publish_id = %pooled.event.id, relay = %pooled.relay_url, "Envelope found");
                return Pulled::materialize(pooled.event.id, payload, &options.output_dir);
            }
            Err(reason) => debug!(event_id = %pooled.event.id, "Skipping event: {}", reason),
        }
    }

    Err(EmperorError::NotFound {
        publish_id: expected_id.map(str::to_string),
    })
}

/// Normalize a publish id as typed by a user: trimmed, lowercased and
/// exactly 64 hex digits.
pub fn parse_publish_id(value: &str) -> Result<String> {
    let id = value.trim().to_ascii_lowercase();
    if id.len() != 64 || !id.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(EmperorError::InvalidPublishId(value.trim().to_string()));
    }
    Ok(id)
}

/// Checks are ordered cheapest first; decryption only runs on events that
/// are provably the sender's.
fn open_envelope<C>(
    event: &Event,
    identity: &Keys,
    cipher: &C,
    sender: &[u8; 32],
    sender_hex: &str,
    expected_id: Option<&str>,
) -> std::result::Result<Payload, Skip>
where
    C: Cipher + ?Sized,
{
    if expected_id.is_some_and(|id| id != event.id) {
        return Err(Skip::Id);
    }
    if event.pubkey != sender_hex {
        return Err(Skip::Author);
    }
    if event.kind != APP_KIND {
        return Err(Skip::Kind(event.kind));
    }
    if !nostr::verify_event(event).unwrap_or(false) {
        return Err(Skip::Signature);
    }

    let envelope = envelope::decode(&event.content)?;
    let plaintext = cipher.decrypt(identity, sender, &envelope.data)?;
    Ok(Payload::from_plaintext(&envelope.payload_type, &plaintext)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_publish_id() {
        let id = "ab".repeat(32);
        assert_eq!(parse_publish_id(&id).unwrap(), id);
        assert_eq!(parse_publish_id(&format!("  {}\n", id.to_uppercase())).unwrap(), id);

        let prefixed = format!("0x{}", id);
        let not_hex = format!("{}zz", &id[..62]);
        for bad in ["", "abc", prefixed.as_str(), not_hex.as_str()] {
            assert!(matches!(
                parse_publish_id(bad),
                Err(EmperorError::InvalidPublishId(_))
            ));
        }
    }
}
