//! # The single-writer control loop.
//!
//! All mutable gate state (options, the LIFO stack, the active count, the
//! lifecycle flags) lives inside one task. Callers only talk to it over
//! channels, and the loop interleaves five event sources plus two timers
//! in a single `select!`:
//!
//! ```text
//!   acquire ───► req ──┐                  ┌── bottom-waiter deadline
//!   release ───► done ─┤                  ├── close grace deadline
//!   status ────► stat ─┼─► ControlLoop ◄──┘
//!   close / ───► ctl ──┘       │
//!   reconfigure             cancels
//!                              ▼
//!                   quit (CancellationToken)
//! ```
//!
//! Arrival precedence, LIFO promotion and oldest-first expiry are decided
//! here and nowhere else; see the individual handlers on `GateState`.
//!
//! Because every waiter shares the gate's one timeout configuration and
//! deadlines are stamped in arrival order, the oldest waiter is always the
//! next to expire: one `sleep_until` on the bottom of the stack covers the
//! whole buffer.

use futures::future;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::{
    bus::Bus,
    config::Options,
    error::GateError,
    event::{Event, EventKind},
    stack::{LifoStack, Waiter},
    status::Status,
};

/// Control-channel message.
///
/// Teardown and reconfiguration share one lane, so when they race,
/// whichever the loop services first wins and the other observes the
/// result.
pub(crate) enum Command {
    Reconfigure {
        options: Options,
        reply: oneshot::Sender<Result<(), GateError>>,
    },
    Close {
        forced: bool,
        /// Acked when the command has been applied, so `close()` returns
        /// only after arrivals are guaranteed to bounce.
        done: oneshot::Sender<()>,
    },
}

/// The controller task. One per gate, spawned by
/// [`Gate::with`](crate::Gate::with); owns every piece of mutable state.
pub(crate) struct ControlLoop {
    req_rx: mpsc::Receiver<Waiter>,
    done_rx: mpsc::Receiver<()>,
    status_rx: mpsc::Receiver<oneshot::Sender<Status>>,
    ctl_rx: mpsc::Receiver<Command>,
    quit: CancellationToken,
    state: GateState,
}

/// The state the loop serializes. Handlers live here so select arms can
/// borrow the receivers and the state independently.
struct GateState {
    options: Options,
    stack: LifoStack,
    active: usize,
    closing: bool,
    bus: Bus,
}

impl ControlLoop {
    pub(crate) fn new(
        options: Options,
        req_rx: mpsc::Receiver<Waiter>,
        done_rx: mpsc::Receiver<()>,
        status_rx: mpsc::Receiver<oneshot::Sender<Status>>,
        ctl_rx: mpsc::Receiver<Command>,
        quit: CancellationToken,
        bus: Bus,
    ) -> Self {
        Self {
            req_rx,
            done_rx,
            status_rx,
            ctl_rx,
            quit,
            state: GateState {
                stack: LifoStack::new(options.max_stack_size),
                options,
                active: 0,
                closing: false,
                bus,
            },
        }
    }

    /// Runs until a teardown path breaks the loop, then broadcasts
    /// termination.
    ///
    /// A channel returning `None` means every `Gate` clone is gone; parked
    /// waiters cannot exist at that point because a parked caller keeps
    /// its handle borrowed, so tearing down is safe.
    pub(crate) async fn run(mut self) {
        let mut close_deadline: Option<Instant> = None;

        loop {
            let wait_deadline = self.state.next_expiry();

            tokio::select! {
                arrival = self.req_rx.recv() => match arrival {
                    Some(waiter) => self.state.on_arrival(waiter),
                    None => break,
                },
                done = self.done_rx.recv() => match done {
                    Some(()) => {
                        if self.state.on_release() {
                            break;
                        }
                    }
                    None => break,
                },
                query = self.status_rx.recv() => match query {
                    Some(reply) => self.state.on_status(reply),
                    None => break,
                },
                cmd = self.ctl_rx.recv() => match cmd {
                    Some(Command::Reconfigure { options, reply }) => {
                        self.state.on_reconfigure(options, reply);
                    }
                    Some(Command::Close { forced: true, done }) => {
                        self.state.reject_queued();
                        let _ = done.send(());
                        break;
                    }
                    Some(Command::Close { forced: false, done }) => {
                        let drained = self.state.on_close();
                        let _ = done.send(());
                        if drained {
                            break;
                        }
                        if !self.state.options.close_timeout.is_zero() {
                            close_deadline =
                                Some(Instant::now() + self.state.options.close_timeout);
                        }
                    }
                    None => break,
                },
                _ = wake_at(wait_deadline) => self.state.on_expired(),
                _ = wake_at(close_deadline) => {
                    self.state.on_grace_exceeded();
                    break;
                }
            }
        }

        self.state.publish(EventKind::Terminated);
        self.quit.cancel();
    }
}

/// Pending forever when unarmed, which keeps the select arm quiet.
async fn wake_at(at: Option<Instant>) {
    match at {
        Some(at) => time::sleep_until(at).await,
        None => future::pending().await,
    }
}

impl GateState {
    fn next_expiry(&self) -> Option<Instant> {
        self.stack.bottom().and_then(|w| w.deadline)
    }

    /// Arrival precedence: closing, free slot, full stack, park.
    fn on_arrival(&mut self, mut waiter: Waiter) {
        if self.closing {
            waiter.reject(GateError::Closed);
            self.publish(EventKind::RejectedClosing);
            return;
        }

        if self.active < self.options.max_concurrency {
            if waiter.admit() {
                self.active += 1;
                self.publish(EventKind::Admitted);
            }
            return;
        }

        // Displacement runs before push so the bound holds across the event.
        if self.stack.is_full() {
            if let Some(oldest) = self.stack.shift() {
                oldest.reject(GateError::StackFull);
                self.publish(EventKind::Displaced);
            }
        }

        if !self.options.timeout.is_zero() {
            waiter.deadline = Some(Instant::now() + self.options.timeout);
        }
        self.stack.push(waiter);
        self.publish(EventKind::Enqueued);
    }

    /// Completion: free the slot, promote the freshest waiter, and report
    /// whether a graceful drain just finished.
    fn on_release(&mut self) -> bool {
        self.active = self.active.saturating_sub(1);
        self.publish(EventKind::Released);
        self.fill_slots();
        self.closing && self.active == 0 && self.stack.is_empty()
    }

    /// The bottom waiter's deadline fired. No slot was held.
    fn on_expired(&mut self) {
        if let Some(oldest) = self.stack.shift() {
            oldest.reject(GateError::Timeout);
            self.publish(EventKind::WaitExpired);
        }
    }

    fn on_status(&self, reply: oneshot::Sender<Status>) {
        let _ = reply.send(Status {
            active: self.active,
            queued: self.stack.len(),
            closing: self.closing,
            closed: false,
        });
    }

    /// Swaps the options, trims the bottom beyond the new capacity, then
    /// drains the top into any newly opened slots, all in this one tick.
    ///
    /// Deadlines of already-parked waiters stay frozen; a new `timeout`
    /// only applies to later arrivals.
    fn on_reconfigure(&mut self, options: Options, reply: oneshot::Sender<Result<(), GateError>>) {
        self.options = options.normalized();
        self.stack.set_capacity(self.options.max_stack_size);

        while self.stack.over_capacity() {
            if let Some(oldest) = self.stack.shift() {
                oldest.reject(GateError::StackFull);
                self.publish(EventKind::Displaced);
            }
        }

        self.fill_slots();
        self.publish(EventKind::Reconfigured);
        let _ = reply.send(Ok(()));
    }

    /// Graceful close: stop admitting, report whether already drained.
    fn on_close(&mut self) -> bool {
        self.closing = true;
        self.publish(EventKind::Closing);
        self.active == 0 && self.stack.is_empty()
    }

    /// The grace period ran out: queued waiters are rejected, in-flight
    /// jobs are left to finish on their own.
    fn on_grace_exceeded(&mut self) {
        self.reject_queued();
        self.publish(EventKind::GraceExceeded);
    }

    /// Rejects every parked waiter with `Closed`.
    fn reject_queued(&mut self) {
        while let Some(waiter) = self.stack.shift() {
            waiter.reject(GateError::Closed);
        }
    }

    /// Promotes from the top while slots are open, skipping waiters whose
    /// callers are gone.
    fn fill_slots(&mut self) {
        while self.active < self.options.max_concurrency {
            let Some(waiter) = self.stack.pop() else {
                break;
            };
            if waiter.admit() {
                self.active += 1;
                self.publish(EventKind::Admitted);
            }
        }
    }

    fn publish(&self, kind: EventKind) {
        self.bus.publish(
            Event::now(kind)
                .with_active(self.active)
                .with_queued(self.stack.len()),
        );
    }
}
