//! Shared queue of subscription events received from any relay.

use nostr::Event;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// An event delivered for a registered subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct PooledEvent {
    pub relay_url: String,
    pub subscription_id: String,
    pub event: Event,
}

/// FIFO of [`PooledEvent`]s. Relay readers append concurrently; consumers
/// take events out with [`MessagePool::drain`].
#[derive(Debug, Default)]
pub struct MessagePool {
    events: Mutex<VecDeque<PooledEvent>>,
}

impl MessagePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: PooledEvent) {
        self.events.lock().push_back(event);
    }

    pub fn pop(&self) -> Option<PooledEvent> {
        self.events.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Lazily remove the events queued right now.
    ///
    /// The iterator yields at most as many events as were queued when it was
    /// created; anything appended afterwards stays for the next drain.
    pub fn drain(&self) -> Drain<'_> {
        Drain {
            pool: self,
            remaining: self.len(),
        }
    }
}

/// Iterator returned by [`MessagePool::drain`].
pub struct Drain<'a> {
    pool: &'a MessagePool,
    remaining: usize,
}

impl Iterator for Drain<'_> {
    type Item = PooledEvent;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let next = self.pool.pop();
        if next.is_none() {
            self.remaining = 0;
        }
        next
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}
