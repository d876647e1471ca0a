//! Observable engine events

use std::fmt;

use super::logger::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    ConfigLoaded,
    ConfigRejected,

    // Statements
    /// A statement ran against the store
    StatementExecuted,
    /// The store failed a statement outside a batch
    StatementFailed,

    // Writes
    /// Primary and history statements committed together
    WriteCommitted,
    BatchCommitted,
    BatchRolledBack,

    // Lifecycle
    LifecycleCompleted,
    /// A pre-write check refused the operation
    LifecycleRejected,

    // CLI
    StatementsComposed,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::ConfigRejected => "CONFIG_REJECTED",
            Event::StatementExecuted => "STATEMENT_EXECUTED",
            Event::StatementFailed => "STATEMENT_FAILED",
            Event::WriteCommitted => "WRITE_COMMITTED",
            Event::BatchCommitted => "BATCH_COMMITTED",
            Event::BatchRolledBack => "BATCH_ROLLED_BACK",
            Event::LifecycleCompleted => "LIFECYCLE_COMPLETED",
            Event::LifecycleRejected => "LIFECYCLE_REJECTED",
            Event::StatementsComposed => "STATEMENTS_COMPOSED",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::StatementExecuted | Event::WriteCommitted => Severity::Trace,
            Event::ConfigLoaded
            | Event::BatchCommitted
            | Event::LifecycleCompleted
            | Event::StatementsComposed => Severity::Info,
            Event::BatchRolledBack | Event::LifecycleRejected | Event::ConfigRejected => Severity::Warn,
            Event::StatementFailed => Severity::Error,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
