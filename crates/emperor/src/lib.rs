//! Emperor: encrypted message and file transfer over Nostr relays.
//!
//! A sender encrypts a payload for a recipient with NIP-04, wraps it in a
//! small JSON envelope and publishes it as a kind [`APP_KIND`] event. The
//! event id is the publish id; the recipient pulls by that id and the
//! sender's public key.
//!
//! ```no_run
//! use emperor::{Nip04Cipher, Payload, PublishOptions, publish};
//! use nostr::Keys;
//! use nostr_client::{RelayConfig, RelayPool};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> emperor::Result<()> {
//! let identity = Keys::generate();
//! let recipient = Keys::generate();
//! let session = RelayPool::open(["wss://relay.damus.io"], RelayConfig::default()).await;
//!
//! let receipt = publish(
//!     &session,
//!     &identity,
//!     &Nip04Cipher,
//!     recipient.public_key(),
//!     &Payload::text("hello"),
//!     &PublishOptions::default(),
//!     &CancellationToken::new(),
//! )
//! .await?;
//! println!("publish id: {}", receipt.publish_id);
//! # Ok(())
//! # }
//! ```

pub mod cipher;
pub mod cli;
pub mod config;
pub mod envelope;
pub mod error;
pub mod identity;
pub mod payload;
pub mod publish;
pub mod retry;
pub mod subscribe;

pub use cipher::{Cipher, Nip04Cipher};
pub use config::{DEFAULT_RELAYS, EmperorConfig, load_relay_endpoints};
pub use envelope::{APP_KIND, Envelope, PayloadType};
pub use error::{EmperorError, Result};
pub use identity::{KEYFILE_NAME, get_or_create_identity, load_identity, parse_public_key};
pub use payload::{Payload, Pulled};
pub use publish::{PublishOptions, PublishReceipt, publish};
pub use retry::{Accepted, retry_until_accepted, until_cancelled};
pub use subscribe::{PullOptions, parse_publish_id, pull};
