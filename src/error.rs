//! Engine errors
//!
//! Every failure of a repository or service call maps to one abstract
//! `ErrorKind`. Callers branch on the kind; the message text is diagnostic
//! only.

use std::fmt;

use thiserror::Error;

use crate::compose::ComposeError;
use crate::record::RecordError;
use crate::storage::StoreError;

/// Result type for repository and service operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Abstract failure kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing, empty or malformed argument
    BadParameter,
    /// Create collided with an existing key, or update target is missing
    Conflict,
    /// Nothing found where absence is acceptable
    NoContent,
    /// Nothing found where the caller requires a result
    NotFound,
    /// Stored row changed since the caller read it
    RowVersionConflict,
    /// The store changed no row despite all checks passing
    NoRowAffected,
    /// Unexpected store failure, including rows that do not decode
    Store,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::BadParameter => "BAD_PARAMETER",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::NoContent => "NO_CONTENT",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::RowVersionConflict => "ROW_VERSION_CONFLICT",
            ErrorKind::NoRowAffected => "NO_ROW_AFFECTED",
            ErrorKind::Store => "STORE",
            ErrorKind::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether an empty read is a failure the caller must see
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Presence {
    /// Absence reports `NoContent`
    #[default]
    Optional,
    /// Absence reports `NotFound`
    Required,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("bad parameter: {0}")]
    BadParameter(String),

    #[error("conflict on {key}")]
    Conflict { key: String },

    #[error("no content")]
    NoContent,

    #[error("{key} not found")]
    NotFound { key: String },

    #[error("row version conflict on {key}")]
    RowVersionConflict { key: String },

    #[error("no row affected")]
    NoRowAffected {
        #[source]
        cause: Option<StoreError>,
    },

    #[error("store failure: {0}")]
    Store(#[source] StoreError),

    #[error("record decode failed: {0}")]
    Decode(#[from] RecordError),

    #[error("operation cancelled: {0}")]
    Cancelled(#[source] StoreError),
}

impl EngineError {
    pub fn bad_parameter(reason: impl Into<String>) -> Self {
        EngineError::BadParameter(reason.into())
    }

    pub fn no_row_affected() -> Self {
        EngineError::NoRowAffected { cause: None }
    }

    /// Absence error for the given presence requirement
    pub fn absent(presence: Presence, key: impl Into<String>) -> Self {
        match presence {
            Presence::Optional => EngineError::NoContent,
            Presence::Required => EngineError::NotFound { key: key.into() },
        }
    }

    /// Batch failure: rolled back, cause preserved
    pub fn batch_failed(cause: StoreError) -> Self {
        EngineError::NoRowAffected { cause: Some(cause) }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::BadParameter(_) => ErrorKind::BadParameter,
            EngineError::Conflict { .. } => ErrorKind::Conflict,
            EngineError::NoContent => ErrorKind::NoContent,
            EngineError::NotFound { .. } => ErrorKind::NotFound,
            EngineError::RowVersionConflict { .. } => ErrorKind::RowVersionConflict,
            EngineError::NoRowAffected { .. } => ErrorKind::NoRowAffected,
            EngineError::Store(_) | EngineError::Decode(_) => ErrorKind::Store,
            EngineError::Cancelled(_) => ErrorKind::Cancelled,
        }
    }

    pub fn code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::BadParameter => "ROWKEEPER_BAD_PARAMETER",
            ErrorKind::Conflict => "ROWKEEPER_CONFLICT",
            ErrorKind::NoContent => "ROWKEEPER_NO_CONTENT",
            ErrorKind::NotFound => "ROWKEEPER_NOT_FOUND",
            ErrorKind::RowVersionConflict => "ROWKEEPER_ROW_VERSION_CONFLICT",
            ErrorKind::NoRowAffected => "ROWKEEPER_NO_ROW_AFFECTED",
            ErrorKind::Store => "ROWKEEPER_STORE",
            ErrorKind::Cancelled => "ROWKEEPER_CANCELLED",
        }
    }
}

impl From<ComposeError> for EngineError {
    fn from(e: ComposeError) -> Self {
        EngineError::BadParameter(e.to_string())
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        if e.is_cancellation() {
            EngineError::Cancelled(e)
        } else {
            EngineError::Store(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_errors_are_bad_parameters() {
        let err: EngineError = ComposeError::NoFields.into();
        assert_eq!(err.kind(), ErrorKind::BadParameter);
        assert_eq!(err.code(), "ROWKEEPER_BAD_PARAMETER");
    }

    #[test]
    fn test_store_errors_split_on_cancellation() {
        let err: EngineError = StoreError::DeadlineExceeded.into();
        assert_eq!(err.kind(), ErrorKind::Cancelled);

        let err: EngineError = StoreError::Rejected("boom".into()).into();
        assert_eq!(err.kind(), ErrorKind::Store);
    }

    #[test]
    fn test_undecodable_rows_are_store_failures() {
        let err: EngineError = RecordError::UnknownField {
            entity: "Person",
            field: "nickname".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Store);
        assert_eq!(err.code(), "ROWKEEPER_STORE");
    }

    #[test]
    fn test_presence_selects_absence_kind() {
        assert_eq!(EngineError::absent(Presence::Optional, "id=1").kind(), ErrorKind::NoContent);
        assert_eq!(EngineError::absent(Presence::Required, "id=1").kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_batch_failure_keeps_cause() {
        let err = EngineError::batch_failed(StoreError::ZeroAffected { index: 1 });
        assert_eq!(err.kind(), ErrorKind::NoRowAffected);
        let cause = std::error::Error::source(&err).unwrap();
        assert!(cause.to_string().contains("statement 1"));
    }
}
