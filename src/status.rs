//! # Gate state snapshot.

/// Snapshot of the gate's state, returned by
/// [`Gate::status`](crate::Gate::status).
///
/// Once `closed` is set the remaining fields are zero/false: the
/// controller is gone and there is nothing left to count.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Status {
    /// Number of jobs currently being executed.
    pub active: usize,

    /// Number of jobs waiting in the stack.
    pub queued: usize,

    /// The gate is draining after a graceful close.
    pub closing: bool,

    /// The gate has terminated.
    pub closed: bool,
}

impl Status {
    /// The terminal snapshot, reported without engaging the control loop.
    pub(crate) fn closed() -> Self {
        Status {
            closed: true,
            ..Status::default()
        }
    }
}
