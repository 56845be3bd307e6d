//! # Pending-waiter record and the bounded LIFO stack.
//!
//! Pure data structures: no locking, no tasks of their own. The control
//! loop is the sole owner and mutator.

use std::collections::VecDeque;

use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::error::GateError;

/// A single pending admission request.
///
/// Carries the one-shot result channel back to the caller and, once
/// parked, the deadline stamped at enqueue. The channel receives exactly
/// one value over the waiter's lifetime: `Ok(())` on admission or a
/// terminal [`GateError`].
pub(crate) struct Waiter {
    tx: oneshot::Sender<Result<(), GateError>>,

    /// Set iff the waiter was parked under a wait timeout. Waiters share
    /// one timeout configuration and are stamped in arrival order, so
    /// deadlines are monotonic from bottom to top.
    pub(crate) deadline: Option<Instant>,
}

impl Waiter {
    pub(crate) fn new(tx: oneshot::Sender<Result<(), GateError>>) -> Self {
        Self { tx, deadline: None }
    }

    /// Grants the slot. Returns `false` when the caller abandoned its
    /// `acquire` call; the slot must not be counted then.
    pub(crate) fn admit(self) -> bool {
        self.tx.send(Ok(())).is_ok()
    }

    /// Delivers a terminal error. A gone caller changes nothing here.
    pub(crate) fn reject(self, err: GateError) {
        let _ = self.tx.send(Err(err));
    }
}

/// Bounded LIFO buffer of pending waiters.
///
/// Top (most recently pushed) lives at the back of the deque, bottom
/// (oldest) at the front. Admission pops the top; displacement and
/// deadline expiry shift the bottom, so the stack drains at both ends.
pub(crate) struct LifoStack {
    cap: usize,
    entries: VecDeque<Waiter>,
}

impl LifoStack {
    /// Creates a stack with the given capacity (0 = unbounded).
    pub(crate) fn new(cap: usize) -> Self {
        Self {
            cap,
            entries: VecDeque::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Full only when a bound is set.
    pub(crate) fn is_full(&self) -> bool {
        self.cap > 0 && self.entries.len() >= self.cap
    }

    /// Replaces the capacity. Trimming any excess is the caller's call.
    pub(crate) fn set_capacity(&mut self, cap: usize) {
        self.cap = cap;
    }

    pub(crate) fn over_capacity(&self) -> bool {
        self.cap > 0 && self.entries.len() > self.cap
    }

    /// Parks a waiter on top.
    pub(crate) fn push(&mut self, waiter: Waiter) {
        self.entries.push_back(waiter);
    }

    /// Removes and returns the most recently parked waiter.
    pub(crate) fn pop(&mut self) -> Option<Waiter> {
        self.entries.pop_back()
    }

    /// Removes and returns the oldest waiter.
    pub(crate) fn shift(&mut self) -> Option<Waiter> {
        self.entries.pop_front()
    }

    /// Peeks at the oldest waiter, the next to expire.
    pub(crate) fn bottom(&self) -> Option<&Waiter> {
        self.entries.front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn waiter() -> (Waiter, oneshot::Receiver<Result<(), GateError>>) {
        let (tx, rx) = oneshot::channel();
        (Waiter::new(tx), rx)
    }

    #[test]
    fn pop_takes_the_freshest() {
        let mut stack = LifoStack::new(0);
        let (a, mut rx_a) = waiter();
        let (b, mut rx_b) = waiter();
        stack.push(a);
        stack.push(b);

        assert!(stack.pop().expect("top").admit());
        assert_eq!(rx_b.try_recv().unwrap(), Ok(()));
        assert!(rx_a.try_recv().is_err());
    }

    #[test]
    fn shift_takes_the_oldest() {
        let mut stack = LifoStack::new(0);
        let (a, mut rx_a) = waiter();
        let (b, mut rx_b) = waiter();
        stack.push(a);
        stack.push(b);

        stack.shift().expect("bottom").reject(GateError::StackFull);
        assert_eq!(rx_a.try_recv().unwrap(), Err(GateError::StackFull));
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn capacity_zero_is_unbounded() {
        let mut stack = LifoStack::new(0);
        for _ in 0..64 {
            let (w, _rx) = waiter();
            stack.push(w);
            assert!(!stack.is_full());
        }
    }

    #[test]
    fn bound_and_trim_predicate() {
        let mut stack = LifoStack::new(2);
        for _ in 0..2 {
            let (w, _rx) = waiter();
            stack.push(w);
        }
        assert!(stack.is_full());
        assert!(!stack.over_capacity());

        stack.set_capacity(1);
        assert!(stack.over_capacity());
        stack.shift();
        assert!(!stack.over_capacity());
    }

    #[test]
    fn admit_reports_abandoned_caller() {
        let (w, rx) = waiter();
        drop(rx);
        assert!(!w.admit());
    }
}
