// Queue Configuration & Construction Options

use super::error::{ConfigError, Result};
use crate::port::{DiagnosticSink, TracingSink};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::sync::Arc;

/// Worker-count sentinel for "no cap" (dynamic mode only)
pub const UNBOUNDED: i64 = -1;

/// Buffer capacity used when no `buffer_size` option is given
pub const DEFAULT_BUFFER_SIZE: usize = 128;

/// How execution contexts are created to run jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProvisioningMode {
    /// N long-lived workers spawned once at construction
    Static,
    /// One short-lived executor per job, optionally capped
    #[default]
    Dynamic,
}

impl std::fmt::Display for ProvisioningMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProvisioningMode::Static => write!(f, "static"),
            ProvisioningMode::Dynamic => write!(f, "dynamic"),
        }
    }
}

impl FromStr for ProvisioningMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static" => Ok(ProvisioningMode::Static),
            "dynamic" => Ok(ProvisioningMode::Dynamic),
            _ => Err(ConfigError::Unparsable {
                field: "mode",
                value: s.to_string(),
            }),
        }
    }
}

/// What the engine does with a job's own failure. Failures are never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Job results are neither counted nor logged
    #[default]
    Ignore,
    /// Failures go to the diagnostic sink
    Log,
    /// Logged, and a successful drain reports `QueueError::JobsFailed`
    Report,
}

impl FailurePolicy {
    pub fn observes_failures(self) -> bool {
        !matches!(self, FailurePolicy::Ignore)
    }
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailurePolicy::Ignore => write!(f, "ignore"),
            FailurePolicy::Log => write!(f, "log"),
            FailurePolicy::Report => write!(f, "report"),
        }
    }
}

impl FromStr for FailurePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ignore" => Ok(FailurePolicy::Ignore),
            "log" => Ok(FailurePolicy::Log),
            "report" => Ok(FailurePolicy::Report),
            _ => Err(ConfigError::Unparsable {
                field: "failure policy",
                value: s.to_string(),
            }),
        }
    }
}

/// Validated worker count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerLimit {
    Limited(NonZeroUsize),
    Unbounded,
}

impl WorkerLimit {
    /// The cap, or `None` when unbounded
    pub fn get(self) -> Option<usize> {
        match self {
            WorkerLimit::Limited(n) => Some(n.get()),
            WorkerLimit::Unbounded => None,
        }
    }
}

impl std::fmt::Display for WorkerLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerLimit::Limited(n) => write!(f, "{}", n),
            WorkerLimit::Unbounded => write!(f, "unbounded"),
        }
    }
}

/// Validated provisioning strategy: mode and worker count together, so
/// an unbounded static pool cannot be represented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioning {
    Static(NonZeroUsize),
    DynamicLimited(NonZeroUsize),
    DynamicUnbounded,
}

/// Raw, serializable queue settings.
///
/// Fields use the same integer encoding as the construction options, so a
/// settings file can express `UNBOUNDED` as `-1`. Missing fields take the
/// defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    pub workers: i64,
    pub buffer_size: i64,
    pub mode: ProvisioningMode,
    pub failure_policy: FailurePolicy,
}

impl Default for QueueSettings {
    fn default() -> Self {
        let parallelism = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        Self {
            workers: i64::try_from(parallelism).unwrap_or(1),
            buffer_size: DEFAULT_BUFFER_SIZE as i64,
            mode: ProvisioningMode::default(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

/// A single construction option. Options are applied in order; the first
/// one that fails aborts construction.
pub enum QueueOption {
    Workers(i64),
    BufferSize(i64),
    Mode(ProvisioningMode),
    Sink(Arc<dyn DiagnosticSink>),
    FailurePolicy(FailurePolicy),
    Settings(QueueSettings),
}

impl std::fmt::Debug for QueueOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueOption::Workers(n) => f.debug_tuple("Workers").field(n).finish(),
            QueueOption::BufferSize(n) => f.debug_tuple("BufferSize").field(n).finish(),
            QueueOption::Mode(m) => f.debug_tuple("Mode").field(m).finish(),
            QueueOption::Sink(_) => f.write_str("Sink(..)"),
            QueueOption::FailurePolicy(p) => f.debug_tuple("FailurePolicy").field(p).finish(),
            QueueOption::Settings(s) => f.debug_tuple("Settings").field(s).finish(),
        }
    }
}

/// Worker count: a positive number or `UNBOUNDED`
pub fn workers(count: i64) -> QueueOption {
    QueueOption::Workers(count)
}

/// Buffer capacity: non-negative
pub fn buffer_size(size: i64) -> QueueOption {
    QueueOption::BufferSize(size)
}

pub fn mode(mode: ProvisioningMode) -> QueueOption {
    QueueOption::Mode(mode)
}

pub fn static_workers() -> QueueOption {
    QueueOption::Mode(ProvisioningMode::Static)
}

pub fn dynamic_workers() -> QueueOption {
    QueueOption::Mode(ProvisioningMode::Dynamic)
}

pub fn sink(sink: Arc<dyn DiagnosticSink>) -> QueueOption {
    QueueOption::Sink(sink)
}

pub fn failure_policy(policy: FailurePolicy) -> QueueOption {
    QueueOption::FailurePolicy(policy)
}

/// Apply a whole settings record at once
pub fn settings(settings: QueueSettings) -> QueueOption {
    QueueOption::Settings(settings)
}

fn check_workers(count: i64) -> Result<()> {
    if count < UNBOUNDED || count == 0 {
        return Err(ConfigError::InvalidWorkers(count));
    }
    Ok(())
}

fn check_buffer_size(size: i64) -> Result<()> {
    if size < 0 {
        return Err(ConfigError::InvalidBufferSize(size));
    }
    Ok(())
}

impl QueueOption {
    fn apply(self, draft: &mut Draft) -> Result<()> {
        match self {
            QueueOption::Workers(count) => {
                check_workers(count)?;
                draft.settings.workers = count;
            }
            QueueOption::BufferSize(size) => {
                check_buffer_size(size)?;
                draft.settings.buffer_size = size;
            }
            QueueOption::Mode(mode) => draft.settings.mode = mode,
            QueueOption::Sink(sink) => draft.sink = sink,
            QueueOption::FailurePolicy(policy) => draft.settings.failure_policy = policy,
            QueueOption::Settings(settings) => {
                check_workers(settings.workers)?;
                check_buffer_size(settings.buffer_size)?;
                draft.settings = settings;
            }
        }
        Ok(())
    }
}

struct Draft {
    settings: QueueSettings,
    sink: Arc<dyn DiagnosticSink>,
}

/// Immutable, validated queue configuration
#[derive(Clone)]
pub struct QueueConfig {
    provisioning: Provisioning,
    buffer_size: usize,
    failure_policy: FailurePolicy,
    sink: Arc<dyn DiagnosticSink>,
}

impl QueueConfig {
    /// Apply options over the defaults, then validate the combination
    pub fn from_options<I>(options: I) -> Result<Self>
    where
        I: IntoIterator<Item = QueueOption>,
    {
        let mut draft = Draft {
            settings: QueueSettings::default(),
            sink: Arc::new(TracingSink),
        };
        for option in options {
            option.apply(&mut draft)?;
        }

        let Draft { settings, sink } = draft;
        let provisioning = match (settings.mode, settings.workers) {
            (ProvisioningMode::Static, UNBOUNDED) => return Err(ConfigError::UnboundedStatic),
            (ProvisioningMode::Dynamic, UNBOUNDED) => Provisioning::DynamicUnbounded,
            (mode, count) => {
                let count = usize::try_from(count)
                    .ok()
                    .and_then(NonZeroUsize::new)
                    .ok_or(ConfigError::InvalidWorkers(count))?;
                match mode {
                    ProvisioningMode::Static => Provisioning::Static(count),
                    ProvisioningMode::Dynamic => Provisioning::DynamicLimited(count),
                }
            }
        };
        let buffer_size = usize::try_from(settings.buffer_size)
            .map_err(|_| ConfigError::InvalidBufferSize(settings.buffer_size))?;

        Ok(Self {
            provisioning,
            buffer_size,
            failure_policy: settings.failure_policy,
            sink,
        })
    }

    pub fn provisioning(&self) -> Provisioning {
        self.provisioning
    }

    pub fn workers(&self) -> WorkerLimit {
        match self.provisioning {
            Provisioning::Static(n) | Provisioning::DynamicLimited(n) => WorkerLimit::Limited(n),
            Provisioning::DynamicUnbounded => WorkerLimit::Unbounded,
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// A zero-size buffer is a rendezvous: jobs only go to a consumer
    /// already waiting for one
    pub fn is_rendezvous(&self) -> bool {
        self.buffer_size == 0
    }

    /// Slots allocated in the underlying channel. A rendezvous buffer needs
    /// one transit slot per consumer (static workers, or the dispatcher).
    pub fn channel_capacity(&self) -> usize {
        if !self.is_rendezvous() {
            return self.buffer_size;
        }
        match self.provisioning {
            Provisioning::Static(n) => n.get(),
            Provisioning::DynamicLimited(_) | Provisioning::DynamicUnbounded => 1,
        }
    }

    pub fn mode(&self) -> ProvisioningMode {
        match self.provisioning {
            Provisioning::Static(_) => ProvisioningMode::Static,
            _ => ProvisioningMode::Dynamic,
        }
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    pub fn sink(&self) -> &Arc<dyn DiagnosticSink> {
        &self.sink
    }
}

impl std::fmt::Debug for QueueConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueConfig")
            .field("provisioning", &self.provisioning)
            .field("buffer_size", &self.buffer_size)
            .field("failure_policy", &self.failure_policy)
            .finish_non_exhaustive()
    }
}
