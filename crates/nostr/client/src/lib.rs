//! Nostr relay WebSocket client.
//!
//! This crate provides:
//! - WebSocket connections to Nostr relays, with a configurable TLS policy
//! - Message parsing (NIP-01 relay protocol) and filter matching
//! - A [`RelayPool`] that broadcasts writes and buffers subscription events
//!   from every relay in one [`MessagePool`]
//!
//! # Example
//!
//! ```rust,no_run
//! use nostr_client::{ClientMessage, Filter, RelayConfig, RelayPool, generate_subscription_id};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = RelayPool::open(["wss://nos.lol"], RelayConfig::default()).await;
//!
//!     let sub_id = generate_subscription_id();
//!     let filters = vec![Filter::new().kinds(vec![892]).limit(10)];
//!     pool.register_subscription(&sub_id, filters.clone());
//!     pool.publish_raw(&ClientMessage::req(sub_id, filters).to_json()?).await?;
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(5)).await;
//!     for pooled in pool.drain_pool() {
//!         println!("{} from {}", pooled.event.id, pooled.relay_url);
//!     }
//!     pool.close().await;
//!     Ok(())
//! }
//! ```

mod error;
mod message;
mod message_pool;
mod pool;
mod relay;
mod subscription;
#[cfg(any(test, feature = "test-support"))]
mod test_relay;
mod tls;
mod transport;

pub use error::{ClientError, Result};
pub use message::{ClientMessage, Filter, MessageError, RelayMessage};
pub use message_pool::{Drain, MessagePool, PooledEvent};
pub use pool::RelayPool;
pub use relay::{ConnectionState, InboundMessage, InboundSender, RelayConfig, RelayConnection};
pub use subscription::{SubscriptionTracker, generate_subscription_id};
#[cfg(any(test, feature = "test-support"))]
pub use test_relay::TestRelay;
pub use tls::TlsPolicy;
pub use transport::RelayTransport;
