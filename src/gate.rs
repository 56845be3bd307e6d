//! # Caller-facing gate handle.
//!
//! [`Gate`] is a cheap, cloneable bundle of channel senders plus the
//! termination token. Every suspension point in this module is a two-way
//! select between making progress and observing termination, so no caller
//! can deadlock on a gate that died underneath it.

use std::future::Future;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::{
    bus::Bus,
    config::Options,
    core::{Command, ControlLoop},
    error::GateError,
    event::Event,
    observer::Observer,
    stack::Waiter,
    status::Status,
};

/// Capacity of the lifecycle event bus.
const EVENT_CAPACITY: usize = 1024;

/// Admission gate for expensive jobs.
///
/// Bounds how many jobs run at once and how many may wait, handing free
/// slots to the *freshest* waiter first (LIFO). The gate never spawns or
/// runs jobs; callers bring their own tasks and merely ask for a slot.
///
/// Cloning is cheap and all clones drive the same controller. The gate
/// should be [closed](Gate::close) once it is no longer used; dropping
/// the last clone also tears the controller down.
///
/// # Example
/// ```
/// use jobgate::{Gate, Options};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let gate = Gate::with(Options {
///     max_concurrency: 2,
///     max_stack_size: 8,
///     ..Options::default()
/// });
///
/// let out = gate.run(async { 2 + 2 }).await;
/// assert_eq!(out, Ok(4));
/// gate.close().await;
/// # }
/// ```
#[derive(Clone)]
pub struct Gate {
    req_tx: mpsc::Sender<Waiter>,
    done_tx: mpsc::Sender<()>,
    status_tx: mpsc::Sender<oneshot::Sender<Status>>,
    ctl_tx: mpsc::Sender<Command>,
    quit: CancellationToken,
    bus: Bus,
}

impl Gate {
    /// Creates a gate with concurrency 1, an unbounded stack and no
    /// timeouts. See [`Gate::with`].
    pub fn new() -> Self {
        Self::with(Options::default())
    }

    /// Creates a gate configured by `options` and spawns its controller.
    ///
    /// Must be called from within a tokio runtime.
    pub fn with(options: Options) -> Self {
        let options = options.normalized();

        // Capacity 1 keeps the hand-off as close to a rendezvous as mpsc
        // allows; arrivals are serialized by the loop either way.
        let (req_tx, req_rx) = mpsc::channel(1);
        let (done_tx, done_rx) = mpsc::channel(1);
        let (status_tx, status_rx) = mpsc::channel(1);
        let (ctl_tx, ctl_rx) = mpsc::channel(1);
        let quit = CancellationToken::new();
        let bus = Bus::new(EVENT_CAPACITY);

        tokio::spawn(
            ControlLoop::new(
                options,
                req_rx,
                done_rx,
                status_rx,
                ctl_rx,
                quit.clone(),
                bus.clone(),
            )
            .run(),
        );

        Self {
            req_tx,
            done_tx,
            status_tx,
            ctl_tx,
            quit,
            bus,
        }
    }

    /// Waits for a slot.
    ///
    /// Resolves to a [`Permit`] once the job may run; the permit must be
    /// [released](Permit::release) when the job is done. On rejection the
    /// error says why: displaced ([`GateError::StackFull`]), waited too
    /// long ([`GateError::Timeout`]), or the gate is closing/closed
    /// ([`GateError::Closed`]). No release is required on rejection.
    pub async fn acquire(&self) -> Result<Permit, GateError> {
        let (tx, rx) = oneshot::channel();
        let waiter = Waiter::new(tx);

        tokio::select! {
            sent = self.req_tx.send(waiter) => {
                if sent.is_err() {
                    return Err(GateError::Closed);
                }
            }
            _ = self.quit.cancelled() => return Err(GateError::Closed),
        }

        match rx.await {
            Ok(Ok(())) => Ok(Permit {
                done_tx: self.done_tx.clone(),
                quit: self.quit.clone(),
            }),
            Ok(Err(err)) => Err(err),
            // The controller dropped the waiter while tearing down.
            Err(_) => Err(GateError::Closed),
        }
    }

    /// Admission-gated execution: acquires, awaits `job`, releases.
    ///
    /// The returned error is only ever about admission; once the job has
    /// started, its output comes back unconditionally.
    pub async fn run<F>(&self, job: F) -> Result<F::Output, GateError>
    where
        F: Future,
    {
        let permit = self.acquire().await?;
        let out = job.await;
        permit.release().await;
        Ok(out)
    }

    /// Returns a snapshot of the gate's state.
    ///
    /// After termination this reports `closed: true` without engaging the
    /// controller.
    pub async fn status(&self) -> Status {
        let (tx, rx) = oneshot::channel();

        tokio::select! {
            sent = self.status_tx.send(tx) => {
                if sent.is_err() {
                    return Status::closed();
                }
            }
            _ = self.quit.cancelled() => return Status::closed(),
        }

        rx.await.unwrap_or_else(|_| Status::closed())
    }

    /// Replaces the gate's options in one controller tick.
    ///
    /// Raising `max_concurrency` drains waiters from the top of the stack
    /// into the new slots; lowering `max_stack_size` trims the oldest
    /// waiters with [`GateError::StackFull`]. Deadlines of already-parked
    /// waiters are frozen; a new `timeout` only applies to later arrivals.
    pub async fn reconfigure(&self, options: Options) -> Result<(), GateError> {
        let (tx, rx) = oneshot::channel();
        let cmd = Command::Reconfigure {
            options,
            reply: tx,
        };

        tokio::select! {
            sent = self.ctl_tx.send(cmd) => {
                if sent.is_err() {
                    return Err(GateError::Closed);
                }
            }
            _ = self.quit.cancelled() => return Err(GateError::Closed),
        }

        rx.await.unwrap_or(Err(GateError::Closed))
    }

    /// Gracefully closes the gate.
    ///
    /// New arrivals are rejected with [`GateError::Closed`] from the
    /// moment this returns; active and queued jobs are drained. With a
    /// non-zero `close_timeout` the drain is bounded: when the grace
    /// period expires, queued waiters are rejected and the gate terminates
    /// without waiting for in-flight jobs.
    ///
    /// Idempotent. Calling again before termination re-arms the grace
    /// timer, and [`close_forced`](Gate::close_forced) afterwards
    /// accelerates the teardown.
    pub async fn close(&self) {
        self.send_close(false).await;
    }

    /// Closes the gate immediately.
    ///
    /// Queued waiters are rejected with [`GateError::Closed`]. In-flight
    /// jobs keep running; their [`Permit::release`] becomes a no-op.
    pub async fn close_forced(&self) {
        self.send_close(true).await;
    }

    async fn send_close(&self, forced: bool) {
        let (tx, rx) = oneshot::channel();
        let cmd = Command::Close { forced, done: tx };

        tokio::select! {
            sent = self.ctl_tx.send(cmd) => {
                if sent.is_err() {
                    return;
                }
            }
            _ = self.quit.cancelled() => return,
        }

        // Resolves on ack, or with an error once the loop is gone; either
        // way the close has taken effect.
        let _ = rx.await;
    }

    /// Resolves once the controller has terminated.
    ///
    /// This is the broadcast every caller path selects against; it fires
    /// exactly once, after which all API calls complete immediately.
    pub async fn closed(&self) {
        self.quit.cancelled().await;
    }

    /// Subscribes to the gate's lifecycle [`Event`] stream.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Spawns a listener forwarding lifecycle events to `observer`.
    ///
    /// The listener ends together with the event stream.
    pub fn observe<O>(&self, observer: O)
    where
        O: Observer,
    {
        let mut rx = self.bus.subscribe();
        tokio::spawn(async move {
            while let Ok(ev) = rx.recv().await {
                observer.on_event(&ev).await;
            }
        });
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

/// Permission to run one job.
///
/// Returned by a successful [`Gate::acquire`]. Call
/// [`release`](Permit::release) once the job is done; consuming `self`
/// makes a double release unrepresentable. Dropping a permit without
/// releasing leaks the slot for the gate's lifetime.
#[must_use = "a permit holds a concurrency slot; release it when the job is done"]
pub struct Permit {
    done_tx: mpsc::Sender<()>,
    quit: CancellationToken,
}

impl Permit {
    /// Posts the completion, freeing the slot for the freshest waiter.
    ///
    /// A no-op if the gate terminated in the meantime (forced close);
    /// never blocks on a dead controller.
    pub async fn release(self) {
        tokio::select! {
            _ = self.done_tx.send(()) => {}
            _ = self.quit.cancelled() => {}
        }
    }
}
