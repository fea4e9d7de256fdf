// Worker - Job execution loops (static pool and dynamic dispatch)

mod dispatch;
mod handoff;
mod panic_guard;
mod shutdown;
mod tracker;

pub use panic_guard::execute_guarded;
pub use shutdown::{cancel_channel, CancelHandle, CancelReason, CancelToken};
pub use tracker::{CompletionTracker, Obligation};

pub(crate) use dispatch::Dispatcher;
pub(crate) use handoff::Handoff;

use crate::domain::FailurePolicy;
use crate::port::{BoxedJob, DiagnosticSink, JobError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

/// Buffer receiver shared by every static worker
pub(crate) type SharedJobs = Arc<Mutex<mpsc::Receiver<BoxedJob>>>;

/// Runs a single job and applies the failure policy to its result
pub(crate) struct JobRunner {
    policy: FailurePolicy,
    sink: Arc<dyn DiagnosticSink>,
    failures: AtomicUsize,
}

impl JobRunner {
    pub(crate) fn new(policy: FailurePolicy, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            policy,
            sink,
            failures: AtomicUsize::new(0),
        }
    }

    pub(crate) async fn run(&self, job: BoxedJob) {
        if let Err(e) = execute_guarded(job).await {
            self.record_failure(e);
        }
    }

    fn record_failure(&self, e: JobError) {
        if !self.policy.observes_failures() {
            return;
        }
        let failed = self.failures.fetch_add(1, Ordering::AcqRel) + 1;
        match &e {
            JobError::Panicked(msg) => {
                error!(panic_msg = %msg, failed_total = failed, "Job panicked")
            }
            JobError::Failed(_) => warn!(error = %e, failed_total = failed, "Job failed"),
        }
        self.sink.log(format_args!("job failed: {}", e));
    }

    /// Failures recorded under `Log` or `Report`
    pub(crate) fn failures(&self) -> usize {
        self.failures.load(Ordering::Acquire)
    }
}

/// Long-lived static worker: takes jobs from the shared buffer one at a
/// time until it is closed and drained.
pub(crate) struct Worker {
    id: usize,
    jobs: SharedJobs,
    handoff: Option<Arc<Handoff>>,
    runner: Arc<JobRunner>,
}

impl Worker {
    pub(crate) fn new(
        id: usize,
        jobs: SharedJobs,
        handoff: Option<Arc<Handoff>>,
        runner: Arc<JobRunner>,
    ) -> Self {
        Self {
            id,
            jobs,
            handoff,
            runner,
        }
    }

    /// Run worker loop; the obligation resolves when the loop ends
    pub(crate) async fn run(self, obligation: Obligation) {
        debug!(worker_id = self.id, "Worker started");
        let mut processed = 0usize;

        while let Some(job) = self.next_job().await {
            self.runner.run(job).await;
            processed += 1;
        }

        info!(
            worker_id = self.id,
            processed, "Worker stopped: buffer closed and drained"
        );
        drop(obligation);
    }

    async fn next_job(&self) -> Option<BoxedJob> {
        if let Some(handoff) = &self.handoff {
            handoff.ready();
        }
        // Lock is released before the job executes
        self.jobs.lock().await.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::job::mocks::{FailingJob, PanickingJob, RecordingJob};
    use crate::port::sink::mocks::MemorySink;
    use std::sync::Mutex as StdMutex;

    #[tokio::test]
    async fn test_runner_ignores_failures_by_default() {
        let sink = Arc::new(MemorySink::default());
        let runner = JobRunner::new(FailurePolicy::Ignore, sink.clone());

        runner.run(Box::new(FailingJob("nope".into()))).await;

        assert_eq!(runner.failures(), 0);
        assert!(sink.lines().is_empty());
    }

    #[tokio::test]
    async fn test_runner_ignores_panics_by_default() {
        let sink = Arc::new(MemorySink::default());
        let runner = JobRunner::new(FailurePolicy::Ignore, sink.clone());

        runner.run(Box::new(PanickingJob("quiet"))).await;

        assert_eq!(runner.failures(), 0);
        assert!(sink.lines().is_empty());
    }

    #[tokio::test]
    async fn test_runner_logs_failures() {
        let sink = Arc::new(MemorySink::default());
        let runner = JobRunner::new(FailurePolicy::Log, sink.clone());

        runner.run(Box::new(FailingJob("nope".into()))).await;

        assert_eq!(runner.failures(), 1);
        assert!(sink.contains("job failed: Job failed: nope"));
    }

    #[tokio::test]
    async fn test_worker_drains_then_exits() {
        let (tx, rx) = mpsc::channel(8);
        let log = Arc::new(StdMutex::new(Vec::new()));
        for id in 0..3 {
            let job: BoxedJob = Box::new(RecordingJob::new(id, log.clone()));
            assert!(tx.try_send(job).is_ok());
        }
        drop(tx);

        let tracker = CompletionTracker::new();
        let sink = Arc::new(MemorySink::default());
        let runner = Arc::new(JobRunner::new(FailurePolicy::Ignore, sink));
        let worker = Worker::new(1, Arc::new(Mutex::new(rx)), None, runner);

        worker.run(tracker.track()).await;

        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(tracker.pending(), 0);
    }

    async fn wait_for_claim(handoff: &Handoff) {
        loop {
            if let Some(claim) = handoff.try_claim() {
                claim.forget();
                return;
            }
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_worker_announces_each_receive() {
        let (tx, rx) = mpsc::channel(1);
        let handoff = Arc::new(Handoff::new());
        let sink = Arc::new(MemorySink::default());
        let runner = Arc::new(JobRunner::new(FailurePolicy::Ignore, sink));
        let worker = Worker::new(1, Arc::new(Mutex::new(rx)), Some(handoff.clone()), runner);

        let tracker = CompletionTracker::new();
        let handle = tokio::spawn(worker.run(tracker.track()));

        // Parked in its first receive
        wait_for_claim(&handoff).await;
        let log = Arc::new(StdMutex::new(Vec::new()));
        let job: BoxedJob = Box::new(RecordingJob::new(7, log.clone()));
        assert!(tx.try_send(job).is_ok());

        // Parked again after running it
        wait_for_claim(&handoff).await;
        drop(tx);
        tokio_test::assert_ok!(handle.await);

        assert_eq!(*log.lock().unwrap(), vec![7]);
        assert_eq!(tracker.pending(), 0);
    }
}
