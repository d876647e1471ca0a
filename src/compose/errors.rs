//! Composition errors
//!
//! Raised before anything reaches a store. All of them are caller errors.

use thiserror::Error;

/// Result type for composition
pub type ComposeResult<T> = Result<T, ComposeError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComposeError {
    #[error("no fields given")]
    NoFields,

    #[error("no values given")]
    NoValues,

    /// Value count is not a whole multiple of the field count
    #[error("{values} values cannot be grouped by {fields} fields")]
    ArityMismatch { values: usize, fields: usize },

    #[error("'{0}' is not a valid identifier")]
    InvalidIdentifier(String),

    #[error("{entity} has no field '{field}'")]
    UnknownField { entity: String, field: String },
}

impl ComposeError {
    pub fn code(&self) -> &'static str {
        match self {
            ComposeError::NoFields => "ROWKEEPER_COMPOSE_NO_FIELDS",
            ComposeError::NoValues => "ROWKEEPER_COMPOSE_NO_VALUES",
            ComposeError::ArityMismatch { .. } => "ROWKEEPER_COMPOSE_ARITY",
            ComposeError::InvalidIdentifier(_) => "ROWKEEPER_COMPOSE_IDENTIFIER",
            ComposeError::UnknownField { .. } => "ROWKEEPER_COMPOSE_UNKNOWN_FIELD",
        }
    }
}
