//! Queue Properties - execution, concurrency caps, backpressure, ordering
//!
//! Black-box tests against the public bqueue-core API

use bqueue_core::port::job::mocks::{ConcurrencyProbe, Gate, RecordingJob, SleepJob};
use bqueue_core::{
    buffer_size, from_fn, mode, static_workers, workers, CancelToken, ConfigError,
    ProvisioningMode, Queue, QueueError, QueueOption, QueueState, UNBOUNDED,
};
use bqueue_integration_tests::wait_until;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

async fn run_counted_jobs(options: Vec<QueueOption>, jobs: usize) -> Vec<usize> {
    let queue = Queue::new(options).unwrap();
    let counts: Arc<Vec<AtomicUsize>> =
        Arc::new((0..jobs).map(|_| AtomicUsize::new(0)).collect());

    for id in 0..jobs {
        let counts = counts.clone();
        queue
            .enqueue(from_fn(move || async move {
                counts[id].fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
                Ok(())
            }))
            .await;
    }
    assert_ok!(queue.shutdown(CancelToken::never()).await);

    counts.iter().map(|c| c.load(Ordering::SeqCst)).collect()
}

/// Property 1: every job enqueued before a successful shutdown ran exactly once
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_every_job_runs_exactly_once() {
    let scenarios: Vec<(&str, Vec<QueueOption>)> = vec![
        ("static x4", vec![static_workers(), workers(4)]),
        ("dynamic x4", vec![workers(4)]),
        ("dynamic unbounded", vec![workers(UNBOUNDED)]),
        ("static x1, tiny buffer", vec![static_workers(), workers(1), buffer_size(1)]),
    ];

    for (name, options) in scenarios {
        let counts = run_counted_jobs(options, 201).await;
        assert!(
            counts.iter().all(|&c| c == 1),
            "{}: some job did not run exactly once: {:?}",
            name,
            counts
        );
    }
}

/// Property 2: static mode never runs more than W jobs at once
#[tokio::test(start_paused = true)]
async fn test_static_concurrency_capped() {
    let queue = Queue::new([static_workers(), workers(3)]).unwrap();
    let probe = ConcurrencyProbe::new();

    for _ in 0..12 {
        queue
            .enqueue(SleepJob::new(probe.clone(), Duration::from_millis(50)))
            .await;
    }
    assert_ok!(queue.shutdown(CancelToken::never()).await);

    assert_eq!(probe.completed(), 12);
    assert_eq!(probe.peak(), 3);
}

/// Property 3a: dynamic-limited mode never runs more than W jobs at once
#[tokio::test(start_paused = true)]
async fn test_dynamic_limited_concurrency_capped() {
    let queue = Queue::new([workers(4)]).unwrap();
    let probe = ConcurrencyProbe::new();

    for _ in 0..20 {
        queue
            .enqueue(SleepJob::new(probe.clone(), Duration::from_millis(50)))
            .await;
    }
    assert_ok!(queue.shutdown(CancelToken::never()).await);

    assert_eq!(probe.completed(), 20);
    assert_eq!(probe.peak(), 4);
}

/// Property 3b: dynamic-unbounded mode has no cap
#[tokio::test(start_paused = true)]
async fn test_dynamic_unbounded_exceeds_worker_equivalent() {
    let queue = Queue::new([workers(UNBOUNDED)]).unwrap();
    let probe = ConcurrencyProbe::new();

    for _ in 0..20 {
        queue
            .enqueue(SleepJob::new(probe.clone(), Duration::from_secs(1)))
            .await;
    }
    assert_ok!(queue.shutdown(CancelToken::never()).await);

    assert_eq!(probe.completed(), 20);
    assert!(probe.peak() > 4, "peak was {}", probe.peak());
}

/// Property 4: non-blocking enqueue on a full buffer is rejected, size unchanged
#[tokio::test]
async fn test_try_enqueue_rejected_when_full() {
    // One dynamic slot held by a gated job: the dispatcher stops reading
    let queue = Queue::new([workers(1), buffer_size(3)]).unwrap();
    let probe = ConcurrencyProbe::new();
    let gate = Gate::new();

    queue.enqueue(gate.job(probe.clone())).await;
    wait_until(|| probe.running() == 1).await;

    for _ in 0..3 {
        assert_ok!(queue.try_enqueue(gate.job(probe.clone())));
    }
    assert_eq!(queue.buffered(), 3);

    let err = assert_err!(queue.try_enqueue(gate.job(probe.clone())));
    assert!(matches!(err, QueueError::TooBusy));
    assert_eq!(queue.buffered(), 3);
    assert_eq!(probe.running(), 1, "limiter must hold dispatch at one job");

    gate.open();
    assert_ok!(queue.shutdown(CancelToken::never()).await);
    assert_eq!(probe.completed(), 4);
}

/// Blocking enqueue waits for space instead of failing
#[tokio::test]
async fn test_blocking_enqueue_waits_for_space() {
    let queue = Arc::new(Queue::new([static_workers(), workers(1), buffer_size(1)]).unwrap());
    let probe = ConcurrencyProbe::new();
    let gate = Gate::new();

    queue.enqueue(gate.job(probe.clone())).await;
    wait_until(|| probe.running() == 1).await;
    queue.enqueue(gate.job(probe.clone())).await;

    let producer = {
        let queue = queue.clone();
        let job = gate.job(probe.clone());
        tokio::spawn(async move { queue.enqueue(job).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!producer.is_finished(), "enqueue should block on a full buffer");

    gate.open();
    tokio::time::timeout(Duration::from_secs(5), producer)
        .await
        .expect("producer should unblock once space frees")
        .unwrap();

    assert_ok!(queue.shutdown(CancelToken::never()).await);
    assert_eq!(probe.completed(), 3);
}

/// Property 6: invalid construction options
#[tokio::test]
async fn test_construction_failures() {
    let cases: Vec<(Vec<QueueOption>, ConfigError)> = vec![
        (
            vec![static_workers(), workers(-2)],
            ConfigError::InvalidWorkers(-2),
        ),
        (
            vec![mode(ProvisioningMode::Static), workers(0)],
            ConfigError::InvalidWorkers(0),
        ),
        (
            vec![mode(ProvisioningMode::Dynamic), workers(0)],
            ConfigError::InvalidWorkers(0),
        ),
        (
            vec![static_workers(), workers(UNBOUNDED)],
            ConfigError::UnboundedStatic,
        ),
        (vec![buffer_size(-2)], ConfigError::InvalidBufferSize(-2)),
    ];

    for (options, expected) in cases {
        match Queue::new(options) {
            Err(QueueError::Config(actual)) => assert_eq!(actual, expected),
            other => panic!("expected {:?}, got {:?}", expected, other),
        }
    }
}

/// Property 7: a single static worker preserves arrival order
#[tokio::test]
async fn test_single_static_worker_fifo() {
    let queue = Queue::new([static_workers(), workers(1)]).unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));

    for id in 1..=5 {
        queue.enqueue(RecordingJob::new(id, log.clone())).await;
    }
    assert_ok!(queue.shutdown(CancelToken::never()).await);

    assert_eq!(*log.lock().unwrap(), vec![1, 2, 3, 4, 5]);
}

/// Many producers sharing one queue
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_producers() {
    let queue = Arc::new(Queue::new([workers(3), buffer_size(4)]).unwrap());
    let executed = Arc::new(AtomicUsize::new(0));

    let mut producers = tokio::task::JoinSet::new();
    for _ in 0..4 {
        let queue = queue.clone();
        let executed = executed.clone();
        producers.spawn(async move {
            for _ in 0..50 {
                let executed = executed.clone();
                queue
                    .enqueue(from_fn(move || async move {
                        executed.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }))
                    .await;
            }
        });
    }
    while let Some(result) = producers.join_next().await {
        result.unwrap();
    }

    assert_ok!(queue.shutdown(CancelToken::never()).await);
    assert_eq!(executed.load(Ordering::SeqCst), 200);
}

/// Each queue tracks only its own obligations
#[tokio::test]
async fn test_queues_drain_independently() {
    let busy = Queue::new([static_workers(), workers(2), buffer_size(4)]).unwrap();
    let quick = Queue::new([workers(UNBOUNDED), buffer_size(16)]).unwrap();
    let probe = ConcurrencyProbe::new();
    let gate = Gate::new();

    busy.enqueue(gate.job(probe.clone())).await;
    wait_until(|| probe.running() == 1).await;

    let log = Arc::new(Mutex::new(Vec::new()));
    for id in 0..8 {
        quick.enqueue(RecordingJob::new(id, log.clone())).await;
    }
    assert_ok!(quick.shutdown(CancelToken::never()).await);
    assert_eq!(quick.state(), QueueState::Stopped);
    assert_eq!(quick.in_flight(), 0);
    assert_eq!(log.lock().unwrap().len(), 8);

    // The other queue is untouched: still running, both workers live
    assert_eq!(busy.state(), QueueState::Running);
    assert_eq!(busy.in_flight(), 2);
    assert_ok!(busy.try_enqueue(gate.job(probe.clone())));

    gate.open();
    assert_ok!(busy.shutdown(CancelToken::never()).await);
    assert_eq!(busy.state(), QueueState::Stopped);
    assert_eq!(probe.completed(), 2);
}
