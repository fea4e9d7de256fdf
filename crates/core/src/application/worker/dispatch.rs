// Dynamic Dispatch - one short-lived executor per job

use super::{CompletionTracker, Handoff, JobRunner, Obligation};
use crate::port::BoxedJob;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info};

/// Reads jobs from the buffer and spawns an executor for each.
///
/// With a limiter, a permit is taken *before* the next job is read, so
/// pickup pauses while every permit is held and jobs stay in the buffer.
/// Without one there is no cap; the caller owns that resource risk.
pub(crate) struct Dispatcher {
    jobs: mpsc::Receiver<BoxedJob>,
    limiter: Option<Arc<Semaphore>>,
    handoff: Option<Arc<Handoff>>,
    tracker: CompletionTracker,
    runner: Arc<JobRunner>,
}

impl Dispatcher {
    pub(crate) fn new(
        jobs: mpsc::Receiver<BoxedJob>,
        limiter: Option<Arc<Semaphore>>,
        handoff: Option<Arc<Handoff>>,
        tracker: CompletionTracker,
        runner: Arc<JobRunner>,
    ) -> Self {
        Self {
            jobs,
            limiter,
            handoff,
            tracker,
            runner,
        }
    }

    /// Run dispatch loop; the obligation resolves when the buffer is
    /// closed and drained. Executors hold their own obligations.
    pub(crate) async fn run(mut self, obligation: Obligation) {
        debug!(limited = self.limiter.is_some(), "Dispatcher started");
        let mut dispatched = 0usize;

        loop {
            let permit = match &self.limiter {
                Some(limiter) => match Arc::clone(limiter).acquire_owned().await {
                    Ok(permit) => Some(permit),
                    // Limiter is never closed while the dispatcher owns it
                    Err(_) => break,
                },
                None => None,
            };

            // Only ready for a hand-off once an executor slot is held
            if let Some(handoff) = &self.handoff {
                handoff.ready();
            }
            let Some(job) = self.jobs.recv().await else {
                break;
            };

            let executor_obligation = self.tracker.track();
            let runner = Arc::clone(&self.runner);
            tokio::spawn(async move {
                runner.run(job).await;
                drop(permit);
                drop(executor_obligation);
            });
            dispatched += 1;
        }

        info!(dispatched, "Dispatcher stopped: buffer closed and drained");
        drop(obligation);
    }
}
