// bqueue Core - Bounded in-process job queue
// Pure engine: NO subscriber setup, NO CLI, NO persistence

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

pub use application::{
    cancel_channel, CancelHandle, CancelReason, CancelToken, CompletionTracker, Queue,
};
pub use domain::{
    buffer_size, dynamic_workers, failure_policy, mode, settings, sink, static_workers, workers,
    ConfigError, FailurePolicy, Provisioning, ProvisioningMode, QueueConfig, QueueOption,
    QueueSettings, QueueState, WorkerLimit, DEFAULT_BUFFER_SIZE, UNBOUNDED,
};
pub use error::{QueueError, Result};
pub use port::{from_fn, BoxedJob, DiagnosticSink, Job, JobError, JobResult, TracingSink};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
