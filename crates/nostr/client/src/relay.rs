//! Single relay connection management
//!
//! A [`RelayConnection`] owns one websocket. Writes go through a shared sink;
//! reads run on a background task that parses frames and forwards them to
//! whoever owns the inbound channel (normally a [`crate::RelayPool`]).

use crate::error::{ClientError, Result};
use crate::message::{ClientMessage, RelayMessage};
use crate::tls::TlsPolicy;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async_tls_with_config, tungstenite::Message,
};
use tracing::{debug, info, warn};
use url::Url;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Relay connection configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Certificate policy for `wss://`
    pub tls: TlsPolicy,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            tls: TlsPolicy::Verify,
        }
    }
}

/// A frame received from a relay, tagged with its origin.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub relay_url: String,
    pub message: RelayMessage,
}

pub type InboundSender = mpsc::UnboundedSender<InboundMessage>;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// Relay connection
pub struct RelayConnection {
    url: Url,
    config: RelayConfig,
    state: Arc<RwLock<ConnectionState>>,
    /// Write half; `None` while disconnected
    sink: Arc<Mutex<Option<WsSink>>>,
    /// Bumped under the sink lock whenever a new sink is installed
    generation: Arc<AtomicU64>,
    recv_task: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl RelayConnection {
    /// Create a new relay connection (does not connect yet)
    pub fn with_config(url: &str, config: RelayConfig) -> Result<Self> {
        let url = Url::parse(url.trim())?;

        if url.scheme() != "ws" && url.scheme() != "wss" {
            return Err(ClientError::InvalidUrl(format!(
                "URL must use ws:// or wss:// scheme, got: {}",
                url.scheme()
            )));
        }

        Ok(Self {
            url,
            config,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            sink: Arc::new(Mutex::new(None)),
            generation: Arc::new(AtomicU64::new(0)),
            recv_task: parking_lot::Mutex::new(None),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Connect and start forwarding parsed frames to `inbound`.
    pub async fn connect(&self, inbound: InboundSender) -> Result<()> {
        {
            let mut state = self.state.write();
            if *state != ConnectionState::Disconnected {
                return Err(ClientError::AlreadyConnected);
            }
            *state = ConnectionState::Connecting;
        }

        info!("Connecting to relay: {}", self.url);

        let connector = match self.config.tls.connector() {
            Ok(connector) => connector,
            Err(e) => {
                *self.state.write() = ConnectionState::Disconnected;
                return Err(e);
            }
        };

        let ws_stream = match timeout(
            self.config.connect_timeout,
            connect_async_tls_with_config(self.url.as_str(), None, false, Some(connector)),
        )
        .await
        {
            Ok(Ok((stream, _))) => stream,
            Ok(Err(e)) => {
                *self.state.write() = ConnectionState::Disconnected;
                return Err(ClientError::WebSocket(e.to_string()));
            }
            Err(_) => {
                *self.state.write() = ConnectionState::Disconnected;
                return Err(ClientError::Timeout(format!(
                    "Connection timeout after {:?}",
                    self.config.connect_timeout
                )));
            }
        };

        if let Some(previous) = self.recv_task.lock().take() {
            previous.abort();
        }

        let (sink, stream) = ws_stream.split();
        let generation = {
            let mut guard = self.sink.lock().await;
            *guard = Some(sink);
            self.generation.fetch_add(1, Ordering::SeqCst) + 1
        };
        *self.state.write() = ConnectionState::Connected;
        info!("Connected to relay: {}", self.url);

        self.start_recv_loop(stream, inbound, generation);
        Ok(())
    }

    fn start_recv_loop(
        &self,
        mut stream: SplitStream<WsStream>,
        inbound: InboundSender,
        generation: u64,
    ) {
        let state = Arc::clone(&self.state);
        let sink = Arc::clone(&self.sink);
        let current = Arc::clone(&self.generation);
        let url = self.url.to_string();

        let handle = tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => match RelayMessage::from_json(text.as_str()) {
                        Ok(message) => {
                            let inbound_message = InboundMessage {
                                relay_url: url.clone(),
                                message,
                            };
                            if inbound.send(inbound_message).is_err() {
                                debug!("Inbound channel closed, stopping reader for {}", url);
                                break;
                            }
                        }
                        Err(e) => debug!("Ignoring unparseable frame from {}: {}", url, e),
                    },
                    Ok(Message::Close(_)) => {
                        info!("Relay {} closed connection", url);
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("WebSocket error from {}: {}", url, e);
                        break;
                    }
                }
            }

            release_if_current(&sink, &state, &current, generation).await;
        });

        *self.recv_task.lock() = Some(handle);
    }

    /// Write one text frame. A failed write marks the connection disconnected.
    pub async fn send_text(&self, text: &str) -> Result<()> {
        let mut guard = self.sink.lock().await;
        let sink = guard.as_mut().ok_or(ClientError::NotConnected)?;

        if let Err(e) = sink.send(Message::text(text.to_owned())).await {
            warn!("Write to {} failed: {}", self.url, e);
            guard.take();
            *self.state.write() = ConnectionState::Disconnected;
            return Err(ClientError::WebSocket(e.to_string()));
        }
        Ok(())
    }

    pub async fn send(&self, message: &ClientMessage) -> Result<()> {
        self.send_text(&message.to_json()?).await
    }

    /// Disconnect from the relay
    pub async fn disconnect(&self) -> Result<()> {
        if let Some(handle) = self.recv_task.lock().take() {
            handle.abort();
        }

        if let Some(mut sink) = self.sink.lock().await.take() {
            let _ = sink.close().await;
            info!("Disconnected from relay: {}", self.url);
        }

        *self.state.write() = ConnectionState::Disconnected;
        Ok(())
    }
}

/// Drop the sink and mark the relay disconnected, unless a newer connection
/// has replaced the one owned by `generation`.
async fn release_if_current(
    sink: &Mutex<Option<WsSink>>,
    state: &RwLock<ConnectionState>,
    current: &AtomicU64,
    generation: u64,
) {
    let mut guard = sink.lock().await;
    if current.load(Ordering::SeqCst) != generation {
        return;
    }
    guard.take();
    *state.write() = ConnectionState::Disconnected;
}

impl Drop for RelayConnection {
    fn drop(&mut self) {
        if let Some(handle) = self.recv_task.lock().take() {
            handle.abort();
        }
    }
}
