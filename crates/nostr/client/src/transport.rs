//! Transport seam used by higher-level protocols.
//!
//! [`RelayPool`] is the production implementation; tests substitute an
//! in-memory transport to script relay behavior.

use crate::error::Result;
use crate::message::{ClientMessage, Filter};
use crate::message_pool::{Drain, MessagePool};
use crate::pool::RelayPool;
use async_trait::async_trait;

#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// Write a text frame to the relays; `Ok` when at least one accepted it.
    async fn publish_raw(&self, message: &str) -> Result<usize>;

    /// Record interest in events for `subscription_id` matching `filters`.
    fn register_subscription(&self, subscription_id: &str, filters: Vec<Filter>);

    /// Events retained for registered subscriptions.
    fn message_pool(&self) -> &MessagePool;

    fn drain_pool(&self) -> Drain<'_> {
        self.message_pool().drain()
    }

    /// Send `["CLOSE", id]` once, without retrying.
    async fn close_subscription(&self, subscription_id: &str) -> Result<usize> {
        let message = ClientMessage::close(subscription_id).to_json()?;
        self.publish_raw(&message).await
    }

    /// Tear down connections.
    async fn close(&self) {}
}

#[async_trait]
impl RelayTransport for RelayPool {
    async fn publish_raw(&self, message: &str) -> Result<usize> {
        RelayPool::publish_raw(self, message).await
    }

    fn register_subscription(&self, subscription_id: &str, filters: Vec<Filter>) {
        RelayPool::register_subscription(self, subscription_id, filters)
    }

    fn message_pool(&self) -> &MessagePool {
        RelayPool::message_pool(self)
    }

    async fn close_subscription(&self, subscription_id: &str) -> Result<usize> {
        self.unregister_subscription(subscription_id);
        let message = ClientMessage::close(subscription_id).to_json()?;
        RelayPool::publish_raw(self, &message).await
    }

    async fn close(&self) {
        RelayPool::close(self).await
    }
}
