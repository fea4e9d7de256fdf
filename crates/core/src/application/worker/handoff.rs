// Rendezvous for zero-capacity buffers
// A producer may only send once a consumer has announced it is waiting

use tokio::sync::{Semaphore, SemaphorePermit};

/// Readiness counter for a zero-capacity buffer.
///
/// Every consumer calls `ready` once before each receive; a producer must
/// hold a claim on one readiness while it sends. Unclaimed readiness never
/// exceeds the number of parked consumers, so a claimed send is always
/// taken by a consumer that is already waiting for it. The backing channel
/// only needs one slot per consumer.
///
/// A claim is returned on drop. Call `forget` on it once the job is sent.
#[derive(Debug)]
pub(crate) struct Handoff {
    waiting: Semaphore,
}

impl Handoff {
    pub(crate) fn new() -> Self {
        Self {
            waiting: Semaphore::new(0),
        }
    }

    /// Announce a consumer about to receive
    pub(crate) fn ready(&self) {
        self.waiting.add_permits(1);
    }

    /// Claim a waiting consumer, if any
    pub(crate) fn try_claim(&self) -> Option<SemaphorePermit<'_>> {
        self.waiting.try_acquire().ok()
    }

    /// Wait for a consumer to become ready, then claim it
    pub(crate) async fn claim(&self) -> Option<SemaphorePermit<'_>> {
        // Only errs once closed, which never happens
        self.waiting.acquire().await.ok()
    }
}
