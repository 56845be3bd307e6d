//! # HTTP admission middleware.
//!
//! [`GateLayer`] wraps any [`tower::Service`] handling [`http::Request`]s
//! and lets a [`Gate`] decide whether a request may start. Rejections are
//! mapped to configurable status codes; admitted requests pass through
//! untouched.
//!
//! The layer owns its gate and exposes it through [`GateLayer::gate`] so
//! an application can `close()` it during shutdown. Nothing here binds
//! sockets or spawns servers; compose the service into whatever stack
//! serves it.
//!
//! Enabled via the `http` feature.
//!
//! # Example
//! ```
//! use jobgate::http::{GateLayer, HttpOptions, NotFound};
//! use tower::Layer;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let layer = GateLayer::new(HttpOptions::default());
//! let service = layer.layer(NotFound::<String>::default());
//! # drop(service);
//! # }
//! ```

use std::{
    convert::Infallible,
    marker::PhantomData,
    mem,
    task::{Context, Poll},
};

use futures::future::{self, BoxFuture, Ready};
use http::{Request, Response, StatusCode};
use tower::{Layer, Service};

use crate::{config::Options, error::GateError, gate::Gate};

/// Options for the HTTP adapter.
#[derive(Clone, Copy, Debug)]
pub struct HttpOptions {
    /// Gate configuration.
    pub options: Options,

    /// Status for a request displaced from the stack before its
    /// processing started. Defaults to 503 Service Unavailable.
    pub stack_full_status: StatusCode,

    /// Status for a request that waited too long before its processing
    /// started. Defaults to 503 Service Unavailable.
    pub timeout_status: StatusCode,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            options: Options::default(),
            stack_full_status: StatusCode::SERVICE_UNAVAILABLE,
            timeout_status: StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Layer applying gate admission to an inner HTTP service.
///
/// Every service built from one layer shares one gate, so the concurrency
/// ceiling is global across clones of the stack.
#[derive(Clone)]
pub struct GateLayer {
    gate: Gate,
    stack_full_status: StatusCode,
    timeout_status: StatusCode,
}

impl GateLayer {
    /// Creates the layer and its gate. Must be called within a runtime.
    pub fn new(options: HttpOptions) -> Self {
        Self::with_gate(Gate::with(options.options), options)
    }

    /// Wraps an existing gate, e.g. one shared with non-HTTP work. The
    /// gate bounds of `options.options` are ignored in that case.
    pub fn with_gate(gate: Gate, options: HttpOptions) -> Self {
        Self {
            gate,
            stack_full_status: options.stack_full_status,
            timeout_status: options.timeout_status,
        }
    }

    /// The gate behind this layer; close it when the server goes away.
    pub fn gate(&self) -> &Gate {
        &self.gate
    }
}

impl<S> Layer<S> for GateLayer {
    type Service = GateService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        GateService {
            inner,
            gate: self.gate.clone(),
            stack_full_status: self.stack_full_status,
            timeout_status: self.timeout_status,
        }
    }
}

/// Admission-gated HTTP service. Built by [`GateLayer`].
#[derive(Clone)]
pub struct GateService<S> {
    inner: S,
    gate: Gate,
    stack_full_status: StatusCode,
    timeout_status: StatusCode,
}

impl<S, ReqB, ResB> Service<Request<ReqB>> for GateService<S>
where
    S: Service<Request<ReqB>, Response = Response<ResB>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ReqB: Send + 'static,
    ResB: Default + Send + 'static,
{
    type Response = Response<ResB>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqB>) -> Self::Future {
        let gate = self.gate.clone();
        let stack_full = self.stack_full_status;
        let timeout = self.timeout_status;

        // The instance that was polled ready must drive this call; the
        // fresh clone stays behind for the next one.
        let clone = self.inner.clone();
        let mut inner = mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            match gate.run(inner.call(req)).await {
                Ok(rsp) => rsp,
                Err(GateError::StackFull) => Ok(reject(stack_full)),
                Err(GateError::Timeout) => Ok(reject(timeout)),
                // A closed gate serves nothing.
                Err(_) => Ok(reject(StatusCode::SERVICE_UNAVAILABLE)),
            }
        })
    }
}

/// Fallback service for the no-inner-handler case: always 404.
pub struct NotFound<B> {
    _body: PhantomData<fn() -> B>,
}

impl<B> Default for NotFound<B> {
    fn default() -> Self {
        Self { _body: PhantomData }
    }
}

impl<B> Clone for NotFound<B> {
    fn clone(&self) -> Self {
        Self::default()
    }
}

impl<ReqB, B> Service<Request<ReqB>> for NotFound<B>
where
    B: Default,
{
    type Response = Response<B>;
    type Error = Infallible;
    type Future = Ready<Result<Self::Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Infallible>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _req: Request<ReqB>) -> Self::Future {
        future::ready(Ok(reject(StatusCode::NOT_FOUND)))
    }
}

/// Builds an empty response carrying the given status.
fn reject<B: Default>(status: StatusCode) -> Response<B> {
    let mut rsp = Response::new(B::default());
    *rsp.status_mut() = status;
    rsp
}
