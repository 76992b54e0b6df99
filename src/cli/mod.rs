//! CLI module for redquery
//!
//! Provides command-line interface for:
//! - ping: Check connectivity and credentials
//! - query: One-shot query execution
//! - explain: One-shot explain, no network

mod args;
mod commands;
mod errors;
mod io;
mod request;

pub use args::{Cli, Command};
pub use commands::{explain, ping, query, run, run_command, Config};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_request, write_error, write_response};
pub use request::QueryRequest;
