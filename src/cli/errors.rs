//! CLI-specific error types

use std::io;

use thiserror::Error;

use crate::compose::ComposeError;
use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("composition failed: {0}")]
    Compose(#[from] ComposeError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        CliError::InvalidArgument(msg.into())
    }

    /// Error code string
    pub fn code(&self) -> &'static str {
        match self {
            CliError::Config(_) => "ROWKEEPER_CLI_CONFIG_ERROR",
            CliError::Compose(_) => "ROWKEEPER_CLI_COMPOSE_ERROR",
            CliError::InvalidArgument(_) => "ROWKEEPER_CLI_INVALID_ARGUMENT",
            CliError::Io(_) | CliError::Json(_) => "ROWKEEPER_CLI_IO_ERROR",
        }
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
