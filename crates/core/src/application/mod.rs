// Application Layer - Queue engine and worker provisioning

pub mod queue;
pub mod worker;

// Re-exports
pub use queue::Queue;
pub use worker::{cancel_channel, CancelHandle, CancelReason, CancelToken, CompletionTracker};
