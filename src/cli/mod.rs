//! CLI module for rowkeeper
//!
//! Provides command-line interface for:
//! - compose: print the statements a configuration produces for a shape
//! - check-config: validate a configuration file

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{check_config, compose, load_config, run, run_command, ComposeRequest};
pub use errors::{CliError, CliResult};
pub use io::{write_error, write_response};
