//! # jobgate
//!
//! **jobgate** is an admission gate for long running or otherwise
//! expensive jobs: it bounds how many run at once and how many may wait,
//! and it hands free slots to the *freshest* waiter first (LIFO). When the
//! wait stack is full, the oldest waiter is dropped; when a waiter
//! outstays its deadline, it is timed out. The gate never spawns work —
//! callers bring their own tasks and only ask permission.
//!
//! LIFO admission is the point: under a burst, the stale requests are the
//! ones a client has most likely already given up on, so the gate sheds
//! those and serves the fresh ones.
//!
//! ## Features
//!
//! | Area              | Description                                                        | Key types                  |
//! |-------------------|--------------------------------------------------------------------|----------------------------|
//! | **Gating**        | Two-step acquire/release, or a one-call wrapper around a job.      | [`Gate`], [`Permit`]       |
//! | **Configuration** | Concurrency/stack bounds, wait and close timeouts, live reconfig.  | [`Options`]                |
//! | **Introspection** | State snapshots and a lifecycle event stream.                      | [`Status`], [`Event`], [`Observer`] |
//! | **Errors**        | The three terminal admission outcomes.                             | [`GateError`]              |
//! | **HTTP**          | tower middleware mapping rejections to status codes.               | [`http::GateLayer`]        |
//!
//! ## Optional features
//! - `logging`: exports [`LogWriter`], a stdout observer _(demo/reference only)_.
//! - `http`: exports the [`http`] adapter module (pulls in `http` + `tower`).
//!
//! ```no_run
//! use std::time::Duration;
//! use jobgate::{Gate, GateError, Options};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let gate = Gate::with(Options {
//!         max_concurrency: 256,
//!         max_stack_size: 256 * 256,
//!         timeout: Duration::from_millis(9),
//!         ..Options::default()
//!     });
//!
//!     let mut set = tokio::task::JoinSet::new();
//!     for _ in 0..1024 {
//!         let gate = gate.clone();
//!         set.spawn(async move {
//!             gate.run(async { /* expensive work */ }).await
//!         });
//!     }
//!
//!     let mut dropped = 0;
//!     while let Some(res) = set.join_next().await {
//!         if let Ok(Err(GateError::StackFull | GateError::Timeout)) = res {
//!             dropped += 1;
//!         }
//!     }
//!
//!     gate.close().await;
//!     println!("dropped {dropped} jobs");
//! }
//! ```
//!
//! ---

mod bus;
mod config;
mod core;
mod error;
mod event;
mod gate;
mod observer;
mod stack;
mod status;

#[cfg(feature = "http")]
pub mod http;

// ---- Public re-exports ----

pub use config::Options;
pub use error::GateError;
pub use event::{Event, EventKind};
pub use gate::{Gate, Permit};
pub use observer::Observer;
pub use status::Status;

// Optional: expose a simple built-in stdout observer (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use observer::LogWriter;
