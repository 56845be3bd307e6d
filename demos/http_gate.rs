//! # Demo: gating an HTTP service.
//!
//! Builds a gated tower service and drives a burst of requests through it
//! in-process, no sockets involved.
//!
//! Run with: `cargo run --example http_gate --features http`

use std::convert::Infallible;
use std::time::Duration;

use http::{Request, Response, StatusCode};
use tower::{Layer, ServiceExt};

use jobgate::http::{GateLayer, HttpOptions};
use jobgate::Options;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let layer = GateLayer::new(HttpOptions {
        options: Options {
            max_concurrency: 2,
            max_stack_size: 2,
            ..Options::default()
        },
        stack_full_status: StatusCode::TOO_MANY_REQUESTS,
        ..HttpOptions::default()
    });

    let service = layer.layer(tower::service_fn(|_req: Request<String>| async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok::<_, Infallible>(Response::new("hello".to_string()))
    }));

    let mut set = tokio::task::JoinSet::new();
    for i in 0..8 {
        let service = service.clone();
        set.spawn(async move {
            let rsp = service
                .oneshot(Request::new(String::new()))
                .await
                .expect("infallible");
            (i, rsp.status())
        });
    }

    while let Some(res) = set.join_next().await {
        let (i, status) = res.expect("request task");
        println!("[request {i}] {status}");
    }

    layer.gate().close().await;
}
