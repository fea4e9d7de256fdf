// Job Port
// A unit of work the queue executes exactly once; its body is opaque to the engine

use async_trait::async_trait;
use std::future::Future;
use thiserror::Error;

/// Failure of a single job. Recorded according to the queue's
/// `FailurePolicy`, never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("Job failed: {0}")]
    Failed(String),

    #[error("Job panicked: {0}")]
    Panicked(String),
}

impl JobError {
    pub fn failed(msg: impl Into<String>) -> Self {
        JobError::Failed(msg.into())
    }
}

pub type JobResult = std::result::Result<(), JobError>;

/// Job trait
///
/// Ownership moves into the queue on enqueue and into whichever worker
/// dequeues it, so `execute` consumes the job.
#[async_trait]
pub trait Job: Send + 'static {
    /// Run the job to completion
    async fn execute(self: Box<Self>) -> JobResult;
}

pub type BoxedJob = Box<dyn Job>;

/// Job built from an async closure
pub struct FnJob<F>(F);

/// Wrap an async closure as a job
///
/// ```text
/// queue.enqueue(from_fn(|| async { Ok(()) })).await;
/// ```
pub fn from_fn<F, Fut>(f: F) -> FnJob<F>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = JobResult> + Send + 'static,
{
    FnJob(f)
}

#[async_trait]
impl<F, Fut> Job for FnJob<F>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = JobResult> + Send + 'static,
{
    async fn execute(self: Box<Self>) -> JobResult {
        (self.0)().await
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::watch;

    /// Counts executions and tracks the peak number running at once
    #[derive(Debug, Default)]
    pub struct ConcurrencyProbe {
        running: AtomicUsize,
        peak: AtomicUsize,
        completed: AtomicUsize,
    }

    impl ConcurrencyProbe {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        fn enter(&self) {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
        }

        fn exit(&self) {
            self.running.fetch_sub(1, Ordering::SeqCst);
            self.completed.fetch_add(1, Ordering::SeqCst);
        }

        pub fn running(&self) -> usize {
            self.running.load(Ordering::SeqCst)
        }

        pub fn peak(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }

        pub fn completed(&self) -> usize {
            self.completed.load(Ordering::SeqCst)
        }
    }

    /// Sleeps for a fixed duration while registered with a probe
    pub struct SleepJob {
        probe: Arc<ConcurrencyProbe>,
        duration: Duration,
    }

    impl SleepJob {
        pub fn new(probe: Arc<ConcurrencyProbe>, duration: Duration) -> Self {
            Self { probe, duration }
        }
    }

    #[async_trait]
    impl Job for SleepJob {
        async fn execute(self: Box<Self>) -> JobResult {
            self.probe.enter();
            tokio::time::sleep(self.duration).await;
            self.probe.exit();
            Ok(())
        }
    }

    /// Appends its id to a shared log when executed
    pub struct RecordingJob {
        id: usize,
        log: Arc<Mutex<Vec<usize>>>,
    }

    impl RecordingJob {
        pub fn new(id: usize, log: Arc<Mutex<Vec<usize>>>) -> Self {
            Self { id, log }
        }
    }

    #[async_trait]
    impl Job for RecordingJob {
        async fn execute(self: Box<Self>) -> JobResult {
            self.log.lock().unwrap().push(self.id);
            Ok(())
        }
    }

    /// Blocks until its gate is opened
    pub struct GatedJob {
        probe: Arc<ConcurrencyProbe>,
        gate: watch::Receiver<bool>,
    }

    /// Opens every `GatedJob` created from it
    pub struct Gate {
        tx: watch::Sender<bool>,
    }

    impl Gate {
        pub fn new() -> Self {
            let (tx, _) = watch::channel(false);
            Self { tx }
        }

        pub fn job(&self, probe: Arc<ConcurrencyProbe>) -> GatedJob {
            GatedJob {
                probe,
                gate: self.tx.subscribe(),
            }
        }

        pub fn open(&self) {
            self.tx.send_replace(true);
        }
    }

    impl Default for Gate {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl Job for GatedJob {
        async fn execute(self: Box<Self>) -> JobResult {
            self.probe.enter();
            let mut gate = self.gate.clone();
            let _ = gate.wait_for(|open| *open).await;
            self.probe.exit();
            Ok(())
        }
    }

    /// Always returns `JobError::Failed`
    pub struct FailingJob(pub String);

    #[async_trait]
    impl Job for FailingJob {
        async fn execute(self: Box<Self>) -> JobResult {
            Err(JobError::Failed(self.0))
        }
    }

    /// Panics with the given message
    pub struct PanickingJob(pub &'static str);

    #[async_trait]
    impl Job for PanickingJob {
        async fn execute(self: Box<Self>) -> JobResult {
            panic!("{}", self.0);
        }
    }

    /// Poll `check` until it holds, panicking after roughly two seconds
    pub async fn wait_until(mut check: impl FnMut() -> bool) {
        for _ in 0..1000 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("condition not reached in time");
    }
}
