//! CLI argument definitions using clap
//!
//! Commands:
//! - redquery ping --config <path>
//! - redquery query --config <path>
//! - redquery explain --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// redquery - relational queries over a Redis key space
#[derive(Parser, Debug)]
#[command(name = "redquery")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect, authenticate and PING the server
    Ping {
        /// Path to configuration file
        #[arg(long, default_value = "./redquery.json")]
        config: PathBuf,
    },

    /// Execute a single query read from stdin and exit
    Query {
        /// Path to configuration file
        #[arg(long, default_value = "./redquery.json")]
        config: PathBuf,
    },

    /// Show how a query read from stdin would run, without connecting
    Explain {
        /// Path to configuration file
        #[arg(long, default_value = "./redquery.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
