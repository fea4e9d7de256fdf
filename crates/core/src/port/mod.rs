// Port Layer - Capabilities the queue consumes

pub mod job;
pub mod sink;

// Re-exports
pub use job::{from_fn, BoxedJob, FnJob, Job, JobError, JobResult};
pub use sink::{DiagnosticSink, TracingSink};
