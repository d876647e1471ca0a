//! CLI argument definitions using clap
//!
//! Commands:
//! - rowkeeper compose --entity <name> --fields <a,b,..> [--config <path>]
//! - rowkeeper check-config --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// rowkeeper - statement composition and lifecycle engine for single-table CRUD
#[derive(Parser, Debug)]
#[command(name = "rowkeeper")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Minimum log severity: trace, info, warn, error or fatal
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the statements a table configuration composes for a record shape
    Compose {
        /// Path to configuration file; built-in defaults when omitted
        #[arg(long)]
        config: Option<PathBuf>,

        /// Record type name the table name is derived from
        #[arg(long)]
        entity: String,

        /// Field names in declaration order
        #[arg(long, value_delimiter = ',', required = true)]
        fields: Vec<String>,

        /// Key fields for update and delete; the id field when omitted
        #[arg(long, value_delimiter = ',')]
        keys: Vec<String>,

        /// Match composite keys in any rotated order
        #[arg(long)]
        combine: bool,

        /// Embed lookup values as literals instead of parameters
        #[arg(long)]
        inline: bool,
    },

    /// Validate a configuration file
    CheckConfig {
        /// Path to configuration file
        #[arg(long, default_value = "./rowkeeper.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
