// Shutdown Cancellation Signal

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};

/// Why a shutdown stopped waiting for drain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Cancelled,
    DeadlineExceeded,
}

/// Cancellation signal handed to `Queue::shutdown`.
///
/// Fires on an explicit cancel, on a deadline, or never. It only bounds
/// the wait for drain; running jobs are never interrupted.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: Option<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// A signal that never fires
    pub fn never() -> Self {
        Self {
            rx: None,
            deadline: None,
        }
    }

    /// A signal that has already fired
    pub fn cancelled() -> Self {
        let (_, rx) = watch::channel(true);
        Self {
            rx: Some(rx),
            deadline: None,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            rx: None,
            deadline: Some(deadline),
        }
    }

    /// Also fire after `timeout`, keeping any earlier deadline
    pub fn and_timeout(mut self, timeout: Duration) -> Self {
        let at = Instant::now() + timeout;
        self.deadline = Some(self.deadline.map_or(at, |current| current.min(at)));
        self
    }

    /// Check without waiting
    pub fn is_cancelled(&self) -> bool {
        let explicit = self.rx.as_ref().is_some_and(|rx| *rx.borrow());
        let expired = self.deadline.is_some_and(|at| at <= Instant::now());
        explicit || expired
    }

    /// Wait for the signal to fire
    pub async fn fired(&mut self) -> CancelReason {
        let deadline = self.deadline;
        let explicit = wait_explicit(self.rx.as_mut());

        match deadline {
            Some(at) => tokio::select! {
                biased;
                _ = explicit => CancelReason::Cancelled,
                _ = sleep_until(at) => CancelReason::DeadlineExceeded,
            },
            None => {
                explicit.await;
                CancelReason::Cancelled
            }
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::never()
    }
}

impl From<Duration> for CancelToken {
    fn from(timeout: Duration) -> Self {
        Self::with_timeout(timeout)
    }
}

async fn wait_explicit(rx: Option<&mut watch::Receiver<bool>>) {
    let Some(rx) = rx else {
        return std::future::pending().await;
    };
    // A dropped handle without a cancel means the signal can no longer fire
    if rx.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Explicit cancel side of a `CancelToken`
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Create an explicitly cancellable token
pub fn cancel_channel() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (
        CancelHandle { tx },
        CancelToken {
            rx: Some(rx),
            deadline: None,
        },
    )
}
