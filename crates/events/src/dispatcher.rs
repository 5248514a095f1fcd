//! Per-variant fan-out of realtime events.
//!
//! Subscribers register for a single [`RealtimeEventKind`] and receive a copy
//! of every event of that kind (broadcast semantics within the variant).
//! Delivery is best-effort fan-out over `std::sync::mpsc` channels: a dropped
//! receiver is detected on the next publish and its sender discarded.
//!
//! Events of different kinds never share a channel, so a slow consumer of one
//! kind cannot delay another kind's subscribers.

use std::collections::HashMap;
use std::sync::{Mutex, mpsc};
use std::time::Duration;

use thiserror::Error;

use crate::event::{RealtimeEvent, RealtimeEventKind};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Publish failed due to internal lock poisoning.
    #[error("event dispatcher lock poisoned")]
    Poisoned,
}

/// A subscription to one event kind.
///
/// Designed for single-threaded consumption; hand it to one task/thread and
/// drain it there. Dropping the subscription unsubscribes (lazily, on the
/// next publish of that kind).
#[derive(Debug)]
pub struct Subscription {
    receiver: mpsc::Receiver<RealtimeEvent>,
}

impl Subscription {
    pub fn new(receiver: mpsc::Receiver<RealtimeEvent>) -> Self {
        Self { receiver }
    }

    /// Block until the next event is available.
    pub fn recv(&self) -> Result<RealtimeEvent, mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event without blocking.
    pub fn try_recv(&self) -> Result<RealtimeEvent, mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for an event.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<RealtimeEvent, mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// Fan-out hub holding one subscriber list per event kind.
#[derive(Debug, Default)]
pub struct EventDispatcher {
    subscribers: Mutex<HashMap<RealtimeEventKind, Vec<mpsc::Sender<RealtimeEvent>>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `event` to every live subscriber of its kind.
    pub fn publish(&self, event: RealtimeEvent) -> Result<(), DispatchError> {
        let mut subs = self.subscribers.lock().map_err(|_| DispatchError::Poisoned)?;

        if let Some(senders) = subs.get_mut(&event.kind()) {
            // Drop any dead subscribers while publishing.
            senders.retain(|tx| tx.send(event.clone()).is_ok());
        }

        Ok(())
    }

    /// Register a subscriber for one event kind.
    pub fn subscribe(&self, kind: RealtimeEventKind) -> Subscription {
        let (tx, rx) = mpsc::channel();

        // A poisoned lock still yields a subscription; it just never
        // receives anything.
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.entry(kind).or_default().push(tx);
        }

        Subscription::new(rx)
    }

    /// Number of live subscriber slots for `kind` (dead ones are only pruned
    /// on publish, so this is an upper bound).
    pub fn subscriber_count(&self, kind: RealtimeEventKind) -> usize {
        self.subscribers
            .lock()
            .map(|subs| subs.get(&kind).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}
