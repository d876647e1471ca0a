//! Store error types
//!
//! Error codes:
//! - ROWKEEPER_STORE_REJECTED: the store refused the statement
//! - ROWKEEPER_STORE_CONSTRAINT: a uniqueness constraint was violated
//! - ROWKEEPER_STORE_UNSUPPORTED: the store cannot interpret the statement
//! - ROWKEEPER_STORE_MISSING_PARAMETER: a referenced parameter was not bound
//! - ROWKEEPER_STORE_CANCELLED / ROWKEEPER_STORE_DEADLINE: the signal fired
//! - ROWKEEPER_STORE_ZERO_AFFECTED: a batch statement changed no row
//! - ROWKEEPER_STORE_BATCH_ABORTED: a batch statement failed, batch rolled back
//! - ROWKEEPER_STORE_TRANSACTION: begin/commit/rollback failed
//! - ROWKEEPER_STORE_UNAVAILABLE: the store cannot be reached

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("statement rejected: {0}")]
    Rejected(String),

    #[error("constraint violated on {table}: {detail}")]
    ConstraintViolation { table: String, detail: String },

    #[error("unsupported statement: {0}")]
    Unsupported(String),

    #[error("parameter @{0} is not bound")]
    MissingParameter(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("operation deadline exceeded")]
    DeadlineExceeded,

    #[error("statement {index} of the batch affected no rows")]
    ZeroAffected { index: usize },

    #[error("batch aborted at item {index}: {source}")]
    BatchAborted {
        index: usize,
        #[source]
        source: Box<StoreError>,
    },

    #[error("transaction failed: {0}")]
    Transaction(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::Rejected(_) => "ROWKEEPER_STORE_REJECTED",
            StoreError::ConstraintViolation { .. } => "ROWKEEPER_STORE_CONSTRAINT",
            StoreError::Unsupported(_) => "ROWKEEPER_STORE_UNSUPPORTED",
            StoreError::MissingParameter(_) => "ROWKEEPER_STORE_MISSING_PARAMETER",
            StoreError::Cancelled => "ROWKEEPER_STORE_CANCELLED",
            StoreError::DeadlineExceeded => "ROWKEEPER_STORE_DEADLINE",
            StoreError::ZeroAffected { .. } => "ROWKEEPER_STORE_ZERO_AFFECTED",
            StoreError::BatchAborted { .. } => "ROWKEEPER_STORE_BATCH_ABORTED",
            StoreError::Transaction(_) => "ROWKEEPER_STORE_TRANSACTION",
            StoreError::Unavailable(_) => "ROWKEEPER_STORE_UNAVAILABLE",
        }
    }

    /// True when the operation stopped because its signal fired
    pub fn is_cancellation(&self) -> bool {
        match self {
            StoreError::Cancelled | StoreError::DeadlineExceeded => true,
            StoreError::BatchAborted { source, .. } => source.is_cancellation(),
            _ => false,
        }
    }

    /// Index of the batch item that failed, if any
    pub fn batch_index(&self) -> Option<usize> {
        match self {
            StoreError::ZeroAffected { index } | StoreError::BatchAborted { index, .. } => Some(*index),
            _ => None,
        }
    }
}
