// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid worker count {0}: must be positive, or UNBOUNDED (-1) in dynamic mode")]
    InvalidWorkers(i64),

    #[error("Unbounded worker count is only valid in dynamic mode")]
    UnboundedStatic,

    #[error("Invalid buffer size {0}: must be non-negative")]
    InvalidBufferSize(i64),

    #[error("Invalid {field}: {value:?}")]
    Unparsable { field: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
