//! Subscription bookkeeping shared by the relays of a pool.

use crate::message::{ClientMessage, Filter};
use nostr::Event;
use std::collections::HashSet;
use uuid::Uuid;

/// Generate a unique subscription ID.
pub fn generate_subscription_id() -> String {
    Uuid::new_v4().simple().to_string()[..16].to_string()
}

/// Tracks the filters of one subscription and which relays have finished
/// sending stored events for it.
#[derive(Debug, Clone)]
pub struct SubscriptionTracker {
    pub id: String,
    pub filters: Vec<Filter>,
    /// Relays the REQ was sent to
    relays: HashSet<String>,
    /// Relays that have sent EOSE
    eose_relays: HashSet<String>,
}

impl SubscriptionTracker {
    pub fn new(id: impl Into<String>, filters: Vec<Filter>) -> Self {
        Self {
            id: id.into(),
            filters,
            relays: HashSet::new(),
            eose_relays: HashSet::new(),
        }
    }

    /// The REQ frame that (re)creates this subscription on a relay.
    pub fn req(&self) -> ClientMessage {
        ClientMessage::req(self.id.clone(), self.filters.clone())
    }

    /// An event is routed to this subscription if any filter accepts it.
    /// A subscription without filters accepts everything.
    pub fn accepts(&self, event: &Event) -> bool {
        self.filters.is_empty() || self.filters.iter().any(|f| f.matches(event))
    }

    pub fn add_relay(&mut self, relay_url: impl Into<String>) {
        let relay_url = relay_url.into();
        // A re-sent REQ replays stored events, so the old EOSE no longer counts.
        self.eose_relays.remove(&relay_url);
        self.relays.insert(relay_url);
    }

    pub fn remove_relay(&mut self, relay_url: &str) {
        self.relays.remove(relay_url);
        self.eose_relays.remove(relay_url);
    }

    pub fn mark_eose(&mut self, relay_url: impl Into<String>) {
        self.eose_relays.insert(relay_url.into());
    }

    /// Whether every relay carrying the subscription has sent EOSE.
    pub fn all_eose(&self) -> bool {
        !self.relays.is_empty() && self.relays.iter().all(|r| self.eose_relays.contains(r))
    }

    pub fn relay_count(&self) -> usize {
        self.relays.len()
    }
}
