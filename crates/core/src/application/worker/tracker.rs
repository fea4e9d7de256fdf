// Completion Tracker
// Counts outstanding obligations (workers, dispatcher, in-flight dynamic jobs)

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Shared counter of outstanding obligations.
///
/// Each obligation is an RAII guard, so a worker that unwinds still
/// resolves its entry. `wait` returns once the count reaches zero.
#[derive(Debug, Clone, Default)]
pub struct CompletionTracker {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    pending: AtomicUsize,
    drained: Notify,
}

impl CompletionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one obligation; it resolves when the guard is dropped
    pub fn track(&self) -> Obligation {
        self.inner.pending.fetch_add(1, Ordering::AcqRel);
        Obligation {
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::Acquire)
    }

    /// Wait until no obligations are outstanding
    pub async fn wait(&self) {
        loop {
            let notified = self.inner.drained.notified();
            tokio::pin!(notified);
            // Register before checking so a concurrent drop cannot be missed
            notified.as_mut().enable();

            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Guard for a single outstanding obligation
#[derive(Debug)]
#[must_use = "the obligation resolves as soon as the guard is dropped"]
pub struct Obligation {
    inner: Arc<Inner>,
}

impl Drop for Obligation {
    fn drop(&mut self) {
        if self.inner.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.inner.drained.notify_waiters();
        }
    }
}
