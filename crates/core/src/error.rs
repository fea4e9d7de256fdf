// Central Error Type for the Queue

use crate::application::CancelReason;
use thiserror::Error;

/// Queue-level error type
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::domain::ConfigError),

    #[error("No Tokio runtime available to spawn workers")]
    NoRuntime,

    /// Non-blocking enqueue found the buffer at capacity
    #[error("Queue too busy: buffer is full")]
    TooBusy,

    #[error("Shutdown cancelled before drain completed")]
    Cancelled,

    #[error("Shutdown deadline exceeded before drain completed")]
    DeadlineExceeded,

    /// Drain completed, but jobs failed under `FailurePolicy::Report`
    #[error("{failed} job(s) failed during the queue's lifetime")]
    JobsFailed { failed: usize },
}

impl QueueError {
    /// True for the two shutdown-cancellation variants
    pub fn is_cancellation(&self) -> bool {
        matches!(self, QueueError::Cancelled | QueueError::DeadlineExceeded)
    }
}

impl From<CancelReason> for QueueError {
    fn from(reason: CancelReason) -> Self {
        match reason {
            CancelReason::Cancelled => QueueError::Cancelled,
            CancelReason::DeadlineExceeded => QueueError::DeadlineExceeded,
        }
    }
}

/// Result type alias using QueueError
pub type Result<T> = std::result::Result<T, QueueError>;
