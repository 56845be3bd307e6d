//! # Demo: shedding a burst of expensive jobs.
//!
//! Ten jobs hit a gate that runs two at a time and parks at most three,
//! with a 50ms wait budget. Watch the freshest requests win.
//!
//! Run with: `cargo run --example burst`

use std::time::Duration;

use jobgate::{Gate, GateError, Options};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let gate = Gate::with(Options {
        max_concurrency: 2,
        max_stack_size: 3,
        timeout: Duration::from_millis(50),
        ..Options::default()
    });

    let mut set = tokio::task::JoinSet::new();
    for i in 0..10 {
        let gate = gate.clone();
        set.spawn(async move {
            let outcome = gate
                .run(async {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                })
                .await;
            (i, outcome)
        });
    }

    while let Some(res) = set.join_next().await {
        let (i, outcome) = res.expect("job task");
        match outcome {
            Ok(()) => println!("[job {i}] done"),
            Err(GateError::StackFull) => println!("[job {i}] shed (stack full)"),
            Err(GateError::Timeout) => println!("[job {i}] shed (waited too long)"),
            Err(GateError::Closed) => println!("[job {i}] gate closed"),
            Err(_) => println!("[job {i}] shed (unknown reason)"),
        }
    }

    gate.close().await;
}
