// Domain Layer - Queue configuration and lifecycle

pub mod config;
pub mod error;
pub mod state;


// Re-exports
pub use config::{
    buffer_size, dynamic_workers, failure_policy, mode, settings, sink, static_workers, workers,
    FailurePolicy, Provisioning, ProvisioningMode, QueueConfig, QueueOption, QueueSettings,
    WorkerLimit, DEFAULT_BUFFER_SIZE, UNBOUNDED,
};
pub use error::ConfigError;
pub use state::QueueState;
