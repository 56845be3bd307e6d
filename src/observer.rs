//! # Observer hook for gate lifecycle events.
//!
//! Implement [`Observer`] and attach it with
//! [`Gate::observe`](crate::Gate::observe) to follow admissions,
//! displacements and teardown without polling
//! [`status`](crate::Gate::status).

use async_trait::async_trait;

use crate::event::Event;

/// Receives every gate lifecycle event, in publish order.
///
/// Observers run outside the control loop. A slow observer can lag the
/// broadcast channel and miss events; it can never block admission.
#[async_trait]
pub trait Observer: Send + Sync + 'static {
    async fn on_event(&self, event: &Event);
}

/// Stdout observer for demos and debugging.
///
/// Enabled via the `logging` feature.
#[cfg(feature = "logging")]
pub struct LogWriter;

#[cfg(feature = "logging")]
#[async_trait]
impl Observer for LogWriter {
    async fn on_event(&self, e: &Event) {
        use crate::event::EventKind;

        match e.kind {
            EventKind::Admitted => {
                println!("[admitted] active={:?} queued={:?}", e.active, e.queued);
            }
            EventKind::Enqueued => {
                println!("[enqueued] active={:?} queued={:?}", e.active, e.queued);
            }
            EventKind::Displaced => {
                println!("[displaced] queued={:?}", e.queued);
            }
            EventKind::WaitExpired => {
                println!("[wait-expired] queued={:?}", e.queued);
            }
            EventKind::RejectedClosing => {
                println!("[rejected-closing]");
            }
            EventKind::Released => {
                println!("[released] active={:?} queued={:?}", e.active, e.queued);
            }
            EventKind::Reconfigured => {
                println!("[reconfigured] active={:?} queued={:?}", e.active, e.queued);
            }
            EventKind::Closing => {
                println!("[closing] active={:?} queued={:?}", e.active, e.queued);
            }
            EventKind::GraceExceeded => {
                println!("[grace-exceeded]");
            }
            EventKind::Terminated => {
                println!("[terminated]");
            }
        }
    }
}
