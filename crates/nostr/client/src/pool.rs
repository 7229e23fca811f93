//! Relay pool: one session over several relays.
//!
//! The pool connects to every endpoint up front, broadcasts writes to all
//! connected relays and funnels subscription events from every relay into a
//! single [`MessagePool`]. Individual relay failures are logged, never fatal.

use crate::error::{ClientError, Result};
use crate::message::{ClientMessage, Filter, RelayMessage};
use crate::message_pool::{Drain, MessagePool, PooledEvent};
use crate::relay::{InboundMessage, InboundSender, RelayConfig, RelayConnection};
use crate::subscription::SubscriptionTracker;
use futures::future::join_all;
use nostr::Event;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type Subscriptions = Arc<RwLock<HashMap<String, SubscriptionTracker>>>;

/// A pool of Nostr relay connections.
pub struct RelayPool {
    relays: Vec<RelayConnection>,
    subscriptions: Subscriptions,
    pool: Arc<MessagePool>,
    inbound_tx: InboundSender,
    dispatcher: JoinHandle<()>,
}

impl RelayPool {
    /// Connect to every endpoint concurrently.
    ///
    /// Malformed endpoints are skipped and unreachable relays stay
    /// disconnected; both are logged. Duplicate endpoints collapse into one.
    pub async fn open<I, S>(endpoints: I, config: RelayConfig) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut relays = Vec::new();
        for endpoint in endpoints {
            let endpoint = endpoint.as_ref();
            match RelayConnection::with_config(endpoint, config.clone()) {
                Ok(relay) => {
                    if seen.insert(relay.url().to_string()) {
                        relays.push(relay);
                    }
                }
                Err(e) => warn!("Skipping relay {}: {}", endpoint, e),
            }
        }

        let subscriptions: Subscriptions = Arc::new(RwLock::new(HashMap::new()));
        let pool = Arc::new(MessagePool::new());
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let dispatcher = tokio::spawn(dispatch(
            inbound_rx,
            Arc::clone(&subscriptions),
            Arc::clone(&pool),
        ));

        let session = Self {
            relays,
            subscriptions,
            pool,
            inbound_tx,
            dispatcher,
        };

        let results = join_all(
            session
                .relays
                .iter()
                .map(|relay| relay.connect(session.inbound_tx.clone())),
        )
        .await;
        for (relay, result) in session.relays.iter().zip(results) {
            if let Err(e) = result {
                warn!("Failed to connect to {}: {}", relay.url(), e);
            }
        }

        info!(
            "Relay pool open: {}/{} relays connected",
            session.connected_count(),
            session.relays.len()
        );
        session
    }

    /// URLs of every relay in the pool, connected or not.
    pub fn relay_urls(&self) -> Vec<String> {
        self.relays.iter().map(|r| r.url().to_string()).collect()
    }

    pub fn connected_count(&self) -> usize {
        self.relays.iter().filter(|r| r.is_connected()).count()
    }

    /// Retain inbound events for `subscription_id` that match `filters`.
    ///
    /// This only records interest; the REQ itself is sent through
    /// [`RelayPool::publish_raw`] so callers control retries.
    pub fn register_subscription(&self, subscription_id: &str, filters: Vec<Filter>) {
        let mut tracker = SubscriptionTracker::new(subscription_id, filters);
        for relay in self.relays.iter().filter(|r| r.is_connected()) {
            tracker.add_relay(relay.url().as_str());
        }
        debug!(
            "Registered subscription {} on {} relays",
            subscription_id,
            tracker.relay_count()
        );
        self.subscriptions
            .write()
            .insert(subscription_id.to_string(), tracker);
    }

    /// Forget a subscription; later events for it are dropped.
    pub fn unregister_subscription(&self, subscription_id: &str) -> bool {
        self.subscriptions.write().remove(subscription_id).is_some()
    }

    /// Whether every relay carrying the subscription has sent EOSE.
    pub fn subscription_finished(&self, subscription_id: &str) -> bool {
        self.subscriptions
            .read()
            .get(subscription_id)
            .is_some_and(|tracker| tracker.all_eose())
    }

    /// Write `message` to every connected relay.
    ///
    /// Returns how many relays accepted the write. When none did, disconnected
    /// relays are reconnected (best effort) and [`ClientError::PublishFailed`]
    /// is returned so the caller can retry.
    pub async fn publish_raw(&self, message: &str) -> Result<usize> {
        let connected: Vec<&RelayConnection> =
            self.relays.iter().filter(|r| r.is_connected()).collect();

        let results = join_all(connected.iter().map(|relay| relay.send_text(message))).await;
        let mut accepted = 0;
        for (relay, result) in connected.iter().zip(results) {
            match result {
                Ok(()) => accepted += 1,
                Err(e) => debug!("Write to {} failed: {}", relay.url(), e),
            }
        }

        if accepted > 0 {
            return Ok(accepted);
        }

        self.reconnect().await;
        Err(ClientError::PublishFailed(format!(
            "no relay accepted the message ({} configured)",
            self.relays.len()
        )))
    }

    /// Publish `["EVENT", event]` to every connected relay.
    pub async fn publish_event(&self, event: &Event) -> Result<usize> {
        let message = ClientMessage::Event(event.clone()).to_json()?;
        self.publish_raw(&message).await
    }

    /// Reconnect disconnected relays and re-send registered subscriptions.
    async fn reconnect(&self) {
        let disconnected: Vec<&RelayConnection> =
            self.relays.iter().filter(|r| !r.is_connected()).collect();
        if disconnected.is_empty() {
            return;
        }
        debug!("Reconnecting {} relays", disconnected.len());

        let results = join_all(
            disconnected
                .iter()
                .map(|relay| relay.connect(self.inbound_tx.clone())),
        )
        .await;

        for (relay, result) in disconnected.into_iter().zip(results) {
            if let Err(e) = result {
                debug!("Reconnect to {} failed: {}", relay.url(), e);
                continue;
            }
            info!("Reconnected to {}", relay.url());

            let requests: Vec<ClientMessage> = {
                let mut subs = self.subscriptions.write();
                subs.values_mut()
                    .map(|tracker| {
                        tracker.add_relay(relay.url().as_str());
                        tracker.req()
                    })
                    .collect()
            };
            for request in requests {
                if let Err(e) = relay.send(&request).await {
                    warn!("Failed to resubscribe on {}: {}", relay.url(), e);
                }
            }
        }
    }

    /// Remove the events buffered so far, oldest first.
    pub fn drain_pool(&self) -> Drain<'_> {
        self.pool.drain()
    }

    pub fn message_pool(&self) -> &MessagePool {
        &self.pool
    }

    /// Disconnect every relay and stop routing inbound messages.
    pub async fn close(&self) {
        join_all(self.relays.iter().map(|relay| relay.disconnect())).await;
        self.dispatcher.abort();
        debug!("Relay pool closed");
    }
}

impl Drop for RelayPool {
    fn drop(&mut self) {
        // Relay readers are aborted by RelayConnection's own Drop.
        self.dispatcher.abort();
    }
}

/// Route inbound relay messages until the pool goes away.
async fn dispatch(
    mut inbound: mpsc::UnboundedReceiver<InboundMessage>,
    subscriptions: Subscriptions,
    pool: Arc<MessagePool>,
) {
    while let Some(InboundMessage {
        relay_url,
        message,
    }) = inbound.recv().await
    {
        match message {
            RelayMessage::Event {
                subscription_id,
                event,
            } => {
                let accepted = subscriptions
                    .read()
                    .get(&subscription_id)
                    .map(|tracker| tracker.accepts(&event));
                match accepted {
                    Some(true) => pool.push(PooledEvent {
                        relay_url,
                        subscription_id,
                        event,
                    }),
                    Some(false) => debug!(
                        "Dropping event {} from {}: outside subscription {}",
                        event.id, relay_url, subscription_id
                    ),
                    None => debug!(
                        "Dropping event {} from {}: unknown subscription {}",
                        event.id, relay_url, subscription_id
                    ),
                }
            }
            RelayMessage::Eose { subscription_id } => {
                if let Some(tracker) = subscriptions.write().get_mut(&subscription_id) {
                    tracker.mark_eose(relay_url.as_str());
                    if tracker.all_eose() {
                        debug!("All relays sent EOSE for {}", subscription_id);
                    }
                }
            }
            RelayMessage::Ok {
                event_id,
                success,
                message,
            } => {
                if success {
                    debug!("{} accepted {}", relay_url, event_id);
                } else {
                    warn!("{} rejected {}: {}", relay_url, event_id, message);
                }
            }
            RelayMessage::Closed {
                subscription_id,
                message,
            } => {
                warn!(
                    "{} closed subscription {}: {}",
                    relay_url, subscription_id, message
                );
                if let Some(tracker) = subscriptions.write().get_mut(&subscription_id) {
                    tracker.remove_relay(&relay_url);
                }
            }
            RelayMessage::Notice { message } => info!("Notice from {}: {}", relay_url, message),
            RelayMessage::Auth { .. } => {
                debug!("{} requested authentication, ignoring", relay_url)
            }
            RelayMessage::Count {
                subscription_id,
                count,
            } => debug!("{} counted {} for {}", relay_url, count, subscription_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn offline_config() -> RelayConfig {
        RelayConfig {
            connect_timeout: Duration::from_millis(500),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_open_skips_malformed_endpoints() {
        let pool = RelayPool::open(
            ["not a url", "https://wrong.scheme", "ws://127.0.0.1:1", "ws://127.0.0.1:1/"],
            offline_config(),
        )
        .await;

        assert_eq!(pool.relay_urls(), vec!["ws://127.0.0.1:1/".to_string()]);
        assert_eq!(pool.connected_count(), 0);
    }

    #[tokio::test]
    async fn test_publish_without_relays_fails() {
        let pool = RelayPool::open(["ws://127.0.0.1:1"], offline_config()).await;
        assert!(matches!(
            pool.publish_raw("[\"CLOSE\",\"x\"]").await,
            Err(ClientError::PublishFailed(_))
        ));
        pool.close().await;
    }

    #[tokio::test]
    async fn test_subscription_registry() {
        let pool = RelayPool::open(Vec::<String>::new(), offline_config()).await;
        pool.register_subscription("sub1", vec![Filter::new().kinds(vec![892])]);

        // No relay carries it, so it can never be finished.
        assert!(!pool.subscription_finished("sub1"));
        assert!(pool.unregister_subscription("sub1"));
        assert!(!pool.unregister_subscription("sub1"));
        assert_eq!(pool.drain_pool().count(), 0);
    }
}
