//! In-process relay for tests.
//!
//! Stores every published event, answers `EVENT` with `OK`, and answers `REQ`
//! by replaying *all* stored events followed by `EOSE`. It deliberately does
//! not apply filters so client-side filtering gets exercised.

use futures::{SinkExt, StreamExt};
use nostr::Event;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::debug;

#[derive(Debug, Default)]
struct RelayState {
    events: Vec<Event>,
    received: Vec<String>,
}

/// A websocket relay bound to an ephemeral localhost port.
pub struct TestRelay {
    addr: SocketAddr,
    state: Arc<Mutex<RelayState>>,
    task: JoinHandle<()>,
}

impl TestRelay {
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let state = Arc::new(Mutex::new(RelayState::default()));

        let accept_state = Arc::clone(&state);
        let task = tokio::spawn(async move {
            // Dropping the set on abort tears down every open connection.
            let mut connections = JoinSet::new();
            while let Ok((stream, _)) = listener.accept().await {
                connections.spawn(serve(stream, Arc::clone(&accept_state)));
            }
        });

        Ok(Self { addr, state, task })
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Add an event as if some other client had published it.
    pub fn store(&self, event: Event) {
        self.state.lock().events.push(event);
    }

    pub fn stored_events(&self) -> Vec<Event> {
        self.state.lock().events.clone()
    }

    /// Every text frame received, in arrival order.
    pub fn received(&self) -> Vec<String> {
        self.state.lock().received.clone()
    }

    /// Stop listening and drop all connections.
    pub fn shutdown(&self) {
        self.task.abort();
    }
}

impl Drop for TestRelay {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(stream: TcpStream, state: Arc<Mutex<RelayState>>) {
    let ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            debug!("test relay handshake failed: {}", e);
            return;
        }
    };
    let (mut write, mut read) = ws.split();

    while let Some(Ok(frame)) = read.next().await {
        let Message::Text(text) = frame else {
            continue;
        };
        let text = text.as_str().to_string();
        state.lock().received.push(text.clone());

        let Ok(frame) = serde_json::from_str::<Vec<Value>>(&text) else {
            continue;
        };

        let replies = match frame.first().and_then(Value::as_str) {
            Some("EVENT") => match frame.get(1).cloned().map(serde_json::from_value::<Event>) {
                Some(Ok(event)) => {
                    let reply = json!(["OK", event.id, true, ""]);
                    state.lock().events.push(event);
                    vec![reply]
                }
                _ => vec![json!(["NOTICE", "invalid: malformed event"])],
            },
            Some("REQ") => {
                let subscription_id = frame.get(1).and_then(Value::as_str).unwrap_or_default();
                let mut replies: Vec<Value> = state
                    .lock()
                    .events
                    .iter()
                    .map(|event| json!(["EVENT", subscription_id, event]))
                    .collect();
                replies.push(json!(["EOSE", subscription_id]));
                replies
            }
            _ => Vec::new(),
        };

        for reply in replies {
            if write.send(Message::text(reply.to_string())).await.is_err() {
                return;
            }
        }
    }
}
