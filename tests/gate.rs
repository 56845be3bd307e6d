use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::sleep;

use jobgate::{EventKind, Gate, GateError, Options, Status};

/// Tracks concurrent executions and the observed peak.
#[derive(Default)]
struct JobCounter {
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl JobCounter {
    async fn run(&self, d: Duration) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        sleep(d).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Polls status until `pred` holds; the tests' stand-in for the busy
/// loops the original suite uses.
async fn wait_for(gate: &Gate, pred: impl Fn(Status) -> bool) {
    loop {
        if pred(gate.status().await) {
            return;
        }
        sleep(Duration::from_millis(1)).await;
    }
}

#[tokio::test]
async fn single_job() {
    let gate = Gate::with(Options {
        max_concurrency: 1,
        max_stack_size: 1,
        ..Options::default()
    });
    assert_eq!(gate.run(async {}).await, Ok(()));
    gate.close().await;
}

#[tokio::test]
async fn default_concurrency() {
    let gate = Gate::new();
    assert_eq!(gate.run(async {}).await, Ok(()));
    gate.close().await;
}

#[tokio::test]
async fn limits_concurrent_jobs() {
    let gate = Gate::with(Options {
        max_concurrency: 3,
        max_stack_size: 6,
        ..Options::default()
    });
    let counter = Arc::new(JobCounter::default());

    let mut set = JoinSet::new();
    for _ in 0..6 {
        let gate = gate.clone();
        let counter = counter.clone();
        set.spawn(async move { gate.run(counter.run(Duration::from_millis(9))).await });
    }

    while let Some(res) = set.join_next().await {
        assert_eq!(res.unwrap(), Ok(()));
    }

    assert_eq!(counter.peak(), 3);
    gate.close().await;
}

#[tokio::test]
async fn drops_oldest_when_stack_full() {
    let gate = Gate::with(Options {
        max_concurrency: 3,
        max_stack_size: 2,
        ..Options::default()
    });

    let mut set = JoinSet::new();
    for _ in 0..6 {
        let gate = gate.clone();
        set.spawn(async move { gate.run(sleep(Duration::from_millis(9))).await });
    }

    let mut dropped = 0;
    while let Some(res) = set.join_next().await {
        match res.unwrap() {
            Ok(()) => {}
            Err(GateError::StackFull) => dropped += 1,
            Err(err) => panic!("unexpected admission error: {err}"),
        }
    }

    assert_eq!(dropped, 1);
    gate.close().await;
}

#[tokio::test]
async fn times_out_stale_waiters() {
    let gate = Gate::with(Options {
        timeout: Duration::from_millis(1),
        ..Options::default()
    });

    let mut set = JoinSet::new();
    for _ in 0..2 {
        let gate = gate.clone();
        set.spawn(async move { gate.run(sleep(Duration::from_millis(9))).await });
    }

    let mut timed_out = 0;
    while let Some(res) = set.join_next().await {
        match res.unwrap() {
            Ok(()) => {}
            Err(GateError::Timeout) => timed_out += 1,
            Err(err) => panic!("unexpected admission error: {err}"),
        }
    }

    assert_eq!(timed_out, 1);
    gate.close().await;
}

#[tokio::test]
async fn admits_freshest_waiter_first() {
    // Concurrency 1, unbounded stack.
    let gate = Gate::new();
    let permit = gate.acquire().await.expect("first slot");

    let order = Arc::new(Mutex::new(Vec::new()));

    let mut set = JoinSet::new();
    for (i, name) in ["stale", "fresh"].into_iter().enumerate() {
        let gate_clone = gate.clone();
        let order = order.clone();
        set.spawn(
            async move { gate_clone.run(async move { order.lock().unwrap().push(name) }).await },
        );
        wait_for(&gate, move |s| s.queued == i + 1).await;
    }

    permit.release().await;
    while let Some(res) = set.join_next().await {
        assert_eq!(res.unwrap(), Ok(()));
    }

    assert_eq!(order.lock().unwrap().as_slice(), ["fresh", "stale"]);
    gate.close().await;
}

#[tokio::test]
async fn rejects_after_close() {
    let gate = Gate::new();
    gate.close().await;
    gate.closed().await;

    assert!(matches!(gate.acquire().await, Err(GateError::Closed)));
    assert!(matches!(
        gate.reconfigure(Options::default()).await,
        Err(GateError::Closed)
    ));
    assert!(gate.status().await.closed);
}

#[tokio::test]
async fn rejects_new_arrivals_while_draining() {
    let gate = Gate::new();
    let permit = gate.acquire().await.expect("slot");

    gate.close().await;
    assert!(matches!(gate.acquire().await, Err(GateError::Closed)));

    permit.release().await;
    gate.closed().await;
}

#[tokio::test]
async fn graceful_close_drains_queued_jobs() {
    let gate = Gate::new();
    let (release_tx, _keep) = tokio::sync::broadcast::channel::<()>(1);

    let mut set = JoinSet::new();
    for _ in 0..3 {
        let gate = gate.clone();
        let mut go = release_tx.subscribe();
        set.spawn(async move {
            gate.run(async move {
                let _ = go.recv().await;
            })
            .await
        });
    }

    wait_for(&gate, |s| s.active + s.queued == 3).await;
    gate.close().await;

    release_tx.send(()).expect("jobs are subscribed");
    while let Some(res) = set.join_next().await {
        assert_eq!(res.unwrap(), Ok(()));
    }

    // The drain of the last job is what terminates the controller.
    gate.closed().await;
    assert!(matches!(gate.acquire().await, Err(GateError::Closed)));
    assert!(gate.status().await.closed);
}

#[tokio::test]
async fn close_grace_period_rejects_queued_jobs() {
    let gate = Gate::with(Options {
        close_timeout: Duration::from_millis(12),
        ..Options::default()
    });
    let permit = gate.acquire().await.expect("slot");

    let mut set = JoinSet::new();
    for _ in 0..2 {
        let gate = gate.clone();
        set.spawn(async move { gate.acquire().await.err() });
    }

    wait_for(&gate, |s| s.active + s.queued == 3).await;
    gate.close().await;

    while let Some(res) = set.join_next().await {
        assert_eq!(res.unwrap(), Some(GateError::Closed));
    }

    gate.closed().await;
    // The job that outlived the grace period; releasing is a no-op.
    permit.release().await;
}

#[tokio::test]
async fn forced_close_rejects_queued_jobs() {
    let gate = Gate::new();
    let permit = gate.acquire().await.expect("slot");

    let mut set = JoinSet::new();
    for _ in 0..2 {
        let gate = gate.clone();
        set.spawn(async move { gate.acquire().await.err() });
    }

    wait_for(&gate, |s| s.active + s.queued == 3).await;
    gate.close_forced().await;

    while let Some(res) = set.join_next().await {
        assert_eq!(res.unwrap(), Some(GateError::Closed));
    }

    gate.closed().await;
    permit.release().await;
    assert!(matches!(gate.acquire().await, Err(GateError::Closed)));
}

#[tokio::test]
async fn release_after_forced_close_is_a_noop() {
    let gate = Gate::new();
    let permit = gate.acquire().await.expect("slot");

    gate.close_forced().await;
    gate.closed().await;
    permit.release().await;
}

#[tokio::test]
async fn forced_close_accelerates_graceful_close() {
    let gate = Gate::new();
    let permit = gate.acquire().await.expect("slot");

    let mut set = JoinSet::new();
    for _ in 0..2 {
        let gate = gate.clone();
        set.spawn(async move { gate.acquire().await.err() });
    }

    wait_for(&gate, |s| s.active + s.queued == 3).await;
    gate.close().await;
    gate.close_forced().await;

    while let Some(res) = set.join_next().await {
        assert_eq!(res.unwrap(), Some(GateError::Closed));
    }

    gate.closed().await;
    permit.release().await;
}

#[tokio::test]
async fn status_reports_draining() {
    let gate = Gate::new();
    let permit = gate.acquire().await.expect("slot");
    gate.close().await;

    let status = gate.status().await;
    assert!(status.closing && !status.closed);
    assert_eq!(status.active, 1);

    permit.release().await;
    gate.closed().await;
    assert!(gate.status().await.closed);
}

#[tokio::test]
async fn reconfigure_trims_and_promotes_in_one_tick() {
    let gate = Gate::with(Options {
        max_concurrency: 2,
        max_stack_size: 2,
        ..Options::default()
    });

    let first = gate.acquire().await.expect("slot one");
    let second = gate.acquire().await.expect("slot two");

    // Park two waiters in a known order: "stale" bottom, "fresh" top.
    let mut handles = Vec::new();
    for i in 0..2 {
        let gate_clone = gate.clone();
        handles.push(tokio::spawn(async move { gate_clone.acquire().await }));
        wait_for(&gate, move |s| s.queued == i + 1).await;
    }

    gate.reconfigure(Options {
        max_concurrency: 3,
        max_stack_size: 1,
        ..Options::default()
    })
    .await
    .expect("reconfigure");

    // The oldest waiter was trimmed; the freshest got the new slot.
    let stale = handles.remove(0).await.unwrap();
    let fresh = handles.remove(0).await.unwrap();
    assert_eq!(stale.err(), Some(GateError::StackFull));
    let third = fresh.expect("promoted into the raised ceiling");

    let status = gate.status().await;
    assert_eq!((status.active, status.queued), (3, 0));

    first.release().await;
    second.release().await;
    third.release().await;
    gate.close().await;
}

#[tokio::test]
async fn reconfigure_timeout_spares_already_parked_waiters() {
    let gate = Gate::new();
    let permit = gate.acquire().await.expect("slot");

    let handle = {
        let gate = gate.clone();
        tokio::spawn(async move { gate.run(async {}).await })
    };
    wait_for(&gate, |s| s.queued == 1).await;

    gate.reconfigure(Options {
        timeout: Duration::from_millis(1),
        ..Options::default()
    })
    .await
    .expect("reconfigure");

    // Long past the new timeout, the pre-existing waiter is still parked.
    sleep(Duration::from_millis(9)).await;
    assert_eq!(gate.status().await.queued, 1);

    permit.release().await;
    assert_eq!(handle.await.unwrap(), Ok(()));
    gate.close().await;
}

#[tokio::test]
async fn publishes_lifecycle_events() {
    let gate = Gate::new();
    let mut events = gate.subscribe();

    gate.run(async {}).await.expect("admitted");
    gate.close().await;
    gate.closed().await;

    let mut kinds = Vec::new();
    while let Ok(ev) = events.try_recv() {
        kinds.push(ev.kind);
    }

    for expected in [
        EventKind::Admitted,
        EventKind::Released,
        EventKind::Closing,
        EventKind::Terminated,
    ] {
        assert!(kinds.contains(&expected), "missing {expected:?} in {kinds:?}");
    }
}
