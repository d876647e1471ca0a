//! rowkeeper CLI entry point
//!
//! Parses arguments and dispatches through `cli::run`. On failure the error
//! is written as a JSON error response and the process exits non-zero.

use rowkeeper::cli;

fn main() {
    if let Err(e) = cli::run() {
        if cli::write_error(e.code(), &e.to_string()).is_err() {
            eprintln!("{}: {}", e.code(), e);
        }
        std::process::exit(1);
    }
}
