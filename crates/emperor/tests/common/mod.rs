//! Shared test helpers.

#![allow(dead_code)]

use async_trait::async_trait;
use nostr::Event;
use nostr_client::{ClientError, Filter, MessagePool, PooledEvent, RelayTransport, Result};
use serde_json::Value;
use std::sync::Mutex;
use std::sync::Once;
use std::sync::atomic::{AtomicU32, Ordering};

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// In-memory stand-in for a relay session.
///
/// Writes can be scripted to fail. Accepted `EVENT` frames are stored and
/// every accepted `REQ` replays all stored events into the pool unfiltered,
/// like a careless relay would.
#[derive(Default)]
pub struct ScriptedRelay {
    pool: MessagePool,
    stored: Mutex<Vec<Event>>,
    frames: Mutex<Vec<String>>,
    subscriptions: Mutex<Vec<(String, Vec<Filter>)>>,
    failures_left: AtomicU32,
    attempts: AtomicU32,
    closes: AtomicU32,
}

impl ScriptedRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next `count` writes.
    pub fn fail_next(&self, count: u32) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    pub fn fail_forever(&self) {
        self.fail_next(u32::MAX);
    }

    pub fn store(&self, event: Event) {
        self.stored.lock().unwrap().push(event);
    }

    pub fn stored(&self) -> Vec<Event> {
        self.stored.lock().unwrap().clone()
    }

    /// Accepted frames, in order.
    pub fn frames(&self) -> Vec<String> {
        self.frames.lock().unwrap().clone()
    }

    pub fn subscriptions(&self) -> Vec<(String, Vec<Filter>)> {
        self.subscriptions.lock().unwrap().clone()
    }

    /// Every write attempt, accepted or not.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> u32 {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RelayTransport for ScriptedRelay {
    async fn publish_raw(&self, message: &str) -> Result<usize> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ClientError::PublishFailed("scripted failure".to_string()));
        }

        self.frames.lock().unwrap().push(message.to_string());
        let frame: Vec<Value> = serde_json::from_str(message).unwrap();
        match frame[0].as_str() {
            Some("EVENT") => {
                let event: Event = serde_json::from_value(frame[1].clone()).unwrap();
                self.store(event);
            }
            Some("REQ") => {
                let subscription_id = frame[1].as_str().unwrap().to_string();
                for event in self.stored() {
                    self.pool.push(PooledEvent {
                        relay_url: "mock://relay".to_string(),
                        subscription_id: subscription_id.clone(),
                        event,
                    });
                }
            }
            _ => {}
        }
        Ok(1)
    }

    fn register_subscription(&self, subscription_id: &str, filters: Vec<Filter>) {
        self.subscriptions
            .lock()
            .unwrap()
            .push((subscription_id.to_string(), filters));
    }

    fn message_pool(&self) -> &MessagePool {
        &self.pool
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}
