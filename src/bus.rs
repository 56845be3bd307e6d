//! # Broadcast bus for gate lifecycle events.
//!
//! Thin wrapper around [`tokio::sync::broadcast`]. The control loop
//! publishes an [`Event`] on every transition; subscribers (observers,
//! tests, metrics) consume them without ever feeding back into admission
//! decisions.

use tokio::sync::broadcast;

use crate::event::Event;

/// Broadcast channel for gate events.
#[derive(Clone)]
pub(crate) struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus with the given channel capacity.
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publishes an event to all subscribers.
    ///
    /// A quiet bus simply drops the event.
    pub(crate) fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Subscribes and returns a fresh receiver.
    pub(crate) fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
