// Queue - Bounded job buffer, provisioning and shutdown

use crate::application::worker::{
    CancelToken, CompletionTracker, Dispatcher, Handoff, JobRunner, SharedJobs, Worker,
};
use crate::domain::{FailurePolicy, Provisioning, QueueConfig, QueueOption, QueueState};
use crate::error::{QueueError, Result};
use crate::port::{BoxedJob, Job};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{watch, Semaphore, SemaphorePermit};
use tracing::{info, warn};

/// In-process bounded job queue.
///
/// The queue is live as soon as `new` returns: workers (static) or the
/// dispatcher (dynamic) are already spawned on the current Tokio runtime.
/// Jobs are delivered in FIFO order; completion order is not guaranteed
/// with more than one worker. With `buffer_size(0)` the buffer holds
/// nothing: a job is only accepted when a consumer is waiting for it.
///
/// # Example
/// ```text
/// let queue = Queue::new([static_workers(), workers(2)])?;
/// queue.enqueue(from_fn(|| async { Ok(()) })).await;
/// queue.shutdown(CancelToken::with_timeout(Duration::from_secs(5))).await?;
/// ```
pub struct Queue {
    config: QueueConfig,
    intake: Mutex<Option<mpsc::Sender<BoxedJob>>>,
    closed: watch::Sender<bool>,
    handoff: Option<Arc<Handoff>>,
    tracker: CompletionTracker,
    runner: Arc<JobRunner>,
    state: AtomicU8,
}

impl Queue {
    /// Build and start a queue.
    ///
    /// Options are applied in order over the defaults. Nothing is spawned
    /// and no buffer is allocated if any option fails.
    ///
    /// # Errors
    /// - `QueueError::Config` for an invalid option or combination
    /// - `QueueError::NoRuntime` when called outside a Tokio runtime
    pub fn new<I>(options: I) -> Result<Self>
    where
        I: IntoIterator<Item = QueueOption>,
    {
        let config = QueueConfig::from_options(options)?;
        let handle = Handle::try_current().map_err(|_| QueueError::NoRuntime)?;

        let (tx, rx) = mpsc::channel(config.channel_capacity());
        let handoff = config.is_rendezvous().then(|| Arc::new(Handoff::new()));
        let tracker = CompletionTracker::new();
        let runner = Arc::new(JobRunner::new(
            config.failure_policy(),
            Arc::clone(config.sink()),
        ));

        provision(&config, &handle, rx, &handoff, &tracker, &runner);

        info!(
            mode = %config.mode(),
            workers = %config.workers(),
            buffer_size = config.buffer_size(),
            failure_policy = %config.failure_policy(),
            "Queue started"
        );

        Ok(Self {
            config,
            intake: Mutex::new(Some(tx)),
            closed: watch::channel(false).0,
            handoff,
            tracker,
            runner,
            state: AtomicU8::new(QueueState::Running.as_u8()),
        })
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn state(&self) -> QueueState {
        QueueState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Jobs waiting in the buffer. Reported while intake is open; 0 after.
    /// Always 0 for a rendezvous buffer, where an accepted job already
    /// belongs to a waiting consumer.
    pub fn buffered(&self) -> usize {
        if self.handoff.is_some() {
            return 0;
        }
        self.lock_intake()
            .as_ref()
            .map_or(0, |tx| tx.max_capacity() - tx.capacity())
    }

    /// Outstanding obligations: live workers or dispatcher, plus running
    /// dynamic executors
    pub fn in_flight(&self) -> usize {
        self.tracker.pending()
    }

    /// Job failures recorded under `FailurePolicy::Log` or `Report`
    pub fn failed_jobs(&self) -> usize {
        self.runner.failures()
    }

    /// Add a job, waiting while the buffer is full.
    ///
    /// # Panics
    /// If shutdown has already been initiated, or is initiated while this
    /// call is still waiting for space.
    pub async fn enqueue<J: Job>(&self, job: J) {
        self.enqueue_boxed(Box::new(job)).await
    }

    /// `enqueue` for an already boxed job
    pub async fn enqueue_boxed(&self, job: BoxedJob) {
        let tx = self
            .lock_intake()
            .clone()
            .unwrap_or_else(|| enqueue_after_shutdown());
        let mut closed = self.closed.subscribe();

        let (slot, claim) = tokio::select! {
            biased;
            _ = closed.wait_for(|closed| *closed) => enqueue_after_shutdown(),
            reserved = self.reserve(&tx) => reserved,
        };

        // Intake may have closed between the slot being granted and now
        let intake = self.lock_intake();
        if intake.is_none() {
            enqueue_after_shutdown();
        }
        slot.send(job);
        if let Some(claim) = claim {
            claim.forget();
        }
    }

    /// Wait for buffer space, and for a waiting consumer on a rendezvous
    /// buffer
    async fn reserve<'a>(
        &'a self,
        tx: &'a mpsc::Sender<BoxedJob>,
    ) -> (mpsc::Permit<'a, BoxedJob>, Option<SemaphorePermit<'a>>) {
        let claim = match &self.handoff {
            Some(handoff) => handoff.claim().await,
            None => None,
        };
        match tx.reserve().await {
            Ok(slot) => (slot, claim),
            Err(_) => panic!("bqueue: job buffer closed while the queue was still accepting jobs"),
        }
    }

    /// Add a job without waiting.
    ///
    /// # Errors
    /// `QueueError::TooBusy` if the buffer is full; the job is dropped.
    ///
    /// # Panics
    /// If shutdown has already been initiated.
    pub fn try_enqueue<J: Job>(&self, job: J) -> Result<()> {
        self.try_enqueue_boxed(Box::new(job))
    }

    /// `try_enqueue` for an already boxed job
    pub fn try_enqueue_boxed(&self, job: BoxedJob) -> Result<()> {
        let intake = self.lock_intake();
        let Some(tx) = intake.as_ref() else {
            enqueue_after_shutdown()
        };

        let claim = match &self.handoff {
            Some(handoff) => match handoff.try_claim() {
                Some(claim) => Some(claim),
                None => return Err(QueueError::TooBusy),
            },
            None => None,
        };

        match tx.try_send(job) {
            Ok(()) => {
                if let Some(claim) = claim {
                    claim.forget();
                }
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(QueueError::TooBusy),
            Err(TrySendError::Closed(_)) => {
                panic!("bqueue: job buffer closed while the queue was still accepting jobs")
            }
        }
    }

    /// Close intake and wait for drain, or until `cancel` fires.
    ///
    /// On cancellation, jobs already running keep running in the
    /// background. Closing happens once; later calls only wait again, and
    /// the first terminal state reached is kept.
    ///
    /// # Errors
    /// - `QueueError::Cancelled` / `DeadlineExceeded` if `cancel` fired first
    /// - `QueueError::JobsFailed` after a full drain under `FailurePolicy::Report`
    pub async fn shutdown(&self, cancel: impl Into<CancelToken>) -> Result<()> {
        let mut cancel = cancel.into();
        self.close_intake();

        // Drain is checked first so a finished drain wins over a fired signal
        let drained = tokio::select! {
            biased;
            _ = self.tracker.wait() => Ok(()),
            reason = cancel.fired() => Err(reason),
        };

        match drained {
            Ok(()) => {
                self.finish(QueueState::Stopped);
                info!("Queue stopped: all jobs drained");

                let failed = self.runner.failures();
                if self.config.failure_policy() == FailurePolicy::Report && failed > 0 {
                    return Err(QueueError::JobsFailed { failed });
                }
                Ok(())
            }
            Err(reason) => {
                self.finish(QueueState::StoppedWithTimeout);
                warn!(
                    reason = ?reason,
                    in_flight = self.tracker.pending(),
                    "Shutdown stopped waiting; running jobs continue in background"
                );
                Err(reason.into())
            }
        }
    }

    fn close_intake(&self) {
        // Dropping the last sender closes the buffer; workers drain what is left
        if self.lock_intake().take().is_none() {
            return;
        }
        self.closed.send_replace(true);
        self.state.store(QueueState::Draining.as_u8(), Ordering::Release);
        info!(in_flight = self.tracker.pending(), "Queue draining");
        self.config.sink().log(format_args!(
            "bqueue: intake closed, waiting on {} obligation(s)",
            self.tracker.pending()
        ));
    }

    fn finish(&self, terminal: QueueState) {
        let _ = self.state.compare_exchange(
            QueueState::Draining.as_u8(),
            terminal.as_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    fn lock_intake(&self) -> std::sync::MutexGuard<'_, Option<mpsc::Sender<BoxedJob>>> {
        self.intake.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Queue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

fn enqueue_after_shutdown() -> ! {
    panic!("bqueue: enqueue called after shutdown was initiated")
}

/// Start the configured provisioning strategy on `handle`
fn provision(
    config: &QueueConfig,
    handle: &Handle,
    rx: mpsc::Receiver<BoxedJob>,
    handoff: &Option<Arc<Handoff>>,
    tracker: &CompletionTracker,
    runner: &Arc<JobRunner>,
) {
    let sink = config.sink();
    match config.provisioning() {
        Provisioning::Static(count) => {
            sink.log(format_args!("bqueue: starting {} static worker(s)", count));
            let jobs: SharedJobs = Arc::new(tokio::sync::Mutex::new(rx));
            for id in 1..=count.get() {
                let worker = Worker::new(
                    id,
                    Arc::clone(&jobs),
                    handoff.clone(),
                    Arc::clone(runner),
                );
                handle.spawn(worker.run(tracker.track()));
            }
        }
        Provisioning::DynamicLimited(limit) => {
            sink.log(format_args!(
                "bqueue: dynamic workers, at most {} concurrent",
                limit
            ));
            let limiter = Arc::new(Semaphore::new(limit.get()));
            let dispatcher = Dispatcher::new(
                rx,
                Some(limiter),
                handoff.clone(),
                tracker.clone(),
                Arc::clone(runner),
            );
            handle.spawn(dispatcher.run(tracker.track()));
        }
        Provisioning::DynamicUnbounded => {
            sink.log(format_args!("bqueue: dynamic workers, unbounded"));
            let dispatcher = Dispatcher::new(
                rx,
                None,
                handoff.clone(),
                tracker.clone(),
                Arc::clone(runner),
            );
            handle.spawn(dispatcher.run(tracker.track()));
        }
    }
}
