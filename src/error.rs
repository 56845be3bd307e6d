//! # Errors emitted by the gate.
//!
//! [`GateError`] covers the three admission outcomes that terminate an
//! [`acquire`](crate::Gate::acquire) call. The gate produces no other
//! errors: once a job has been admitted, nothing here can fail it anymore.

use thiserror::Error;

/// Admission errors.
///
/// Each variant is terminal for the individual `acquire` call: the caller
/// receives the error instead of a permit and no release is required.
/// None of them are retried internally.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateError {
    /// The stack reached `max_stack_size` and this waiter was the oldest:
    /// a newer arrival displaced it, or a reconfigure trimmed it.
    #[error("stack is full")]
    StackFull,

    /// The waiter's deadline elapsed before a slot opened.
    #[error("timeout")]
    Timeout,

    /// The gate is closing or closed; no admission is possible.
    #[error("gate closed")]
    Closed,
}

impl GateError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            GateError::StackFull => "stack_full",
            GateError::Timeout => "wait_timeout",
            GateError::Closed => "gate_closed",
        }
    }
}
