// Queue Lifecycle State

use serde::{Deserialize, Serialize};

/// Observable lifecycle of a queue.
///
/// `Running -> Draining -> {Stopped | StoppedWithTimeout}`. Draining is
/// entered once; the two stopped states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueState {
    Running,
    Draining,
    Stopped,
    StoppedWithTimeout,
}

impl QueueState {
    pub fn is_terminal(self) -> bool {
        matches!(self, QueueState::Stopped | QueueState::StoppedWithTimeout)
    }

    /// True once shutdown has been initiated
    pub fn is_closed(self) -> bool {
        !matches!(self, QueueState::Running)
    }

    pub(crate) fn as_u8(self) -> u8 {
        match self {
            QueueState::Running => 0,
            QueueState::Draining => 1,
            QueueState::Stopped => 2,
            QueueState::StoppedWithTimeout => 3,
        }
    }

    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            0 => QueueState::Running,
            1 => QueueState::Draining,
            2 => QueueState::Stopped,
            _ => QueueState::StoppedWithTimeout,
        }
    }
}

impl std::fmt::Display for QueueState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueState::Running => write!(f, "RUNNING"),
            QueueState::Draining => write!(f, "DRAINING"),
            QueueState::Stopped => write!(f, "STOPPED"),
            QueueState::StoppedWithTimeout => write!(f, "STOPPED_WITH_TIMEOUT"),
        }
    }
}
