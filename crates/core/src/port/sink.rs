// Diagnostic Sink Port
// Receives informational messages (worker counts, selected mode)

use std::fmt;

/// Destination for the queue's diagnostic messages.
///
/// A sink cannot fail from the queue's point of view; implementations
/// swallow their own errors.
pub trait DiagnosticSink: Send + Sync {
    fn log(&self, args: fmt::Arguments<'_>);
}

/// Default sink: forwards to `tracing` at INFO under the `bqueue` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn log(&self, args: fmt::Arguments<'_>) {
        tracing::info!(target: "bqueue", "{}", args);
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Sink that records every formatted message
    #[derive(Debug, Default)]
    pub struct MemorySink {
        lines: Mutex<Vec<String>>,
    }

    impl MemorySink {
        pub fn lines(&self) -> Vec<String> {
            self.lines.lock().unwrap().clone()
        }

        pub fn contains(&self, needle: &str) -> bool {
            self.lines.lock().unwrap().iter().any(|l| l.contains(needle))
        }
    }

    impl DiagnosticSink for MemorySink {
        fn log(&self, args: fmt::Arguments<'_>) {
            self.lines.lock().unwrap().push(args.to_string());
        }
    }
}
