use std::time::SystemTime;

/// Classification of gate lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A job was granted a slot, on arrival or promoted from the stack.
    Admitted,
    /// A job was parked in the stack.
    Enqueued,
    /// The oldest waiter was dropped to make room for a newer arrival, or
    /// trimmed by a reconfigure. It received
    /// [`GateError::StackFull`](crate::GateError::StackFull).
    Displaced,
    /// The oldest waiter's deadline elapsed. It received
    /// [`GateError::Timeout`](crate::GateError::Timeout).
    WaitExpired,
    /// An arrival was rejected because the gate is closing.
    RejectedClosing,
    /// A running job released its slot.
    Released,
    /// New options were applied.
    Reconfigured,
    /// Graceful close requested; the gate is draining.
    Closing,
    /// The close grace period expired with jobs still pending.
    GraceExceeded,
    /// The controller has terminated.
    Terminated,
}

/// Gate lifecycle event with gauge metadata.
///
/// `active`/`queued` are the controller's counters right after the event
/// was applied.
#[derive(Debug, Clone)]
pub struct Event {
    pub kind: EventKind,
    pub at: SystemTime,
    /// Jobs holding a slot after the event.
    pub active: Option<usize>,
    /// Waiters parked after the event.
    pub queued: Option<usize>,
}

impl Event {
    pub fn now(kind: EventKind) -> Self {
        Self {
            kind,
            at: SystemTime::now(),
            active: None,
            queued: None,
        }
    }

    pub fn with_active(mut self, n: usize) -> Self {
        self.active = Some(n);
        self
    }

    pub fn with_queued(mut self, n: usize) -> Self {
        self.queued = Some(n);
        self
    }
}
