//! CLI command implementations
//!
//! Every command loads the configuration first, installs logging, then
//! does exactly one thing. `explain` never opens a connection.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::observability::{init_logging, Event};
use crate::protocol::{Commands, Connection, ConnectionConfig};
use crate::query::{ExplainPlan, QueryExecutor, RecordType, RecordTypes};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{read_request, write_error, write_response};
use super::request::QueryRequest;

/// Configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Server to connect to (optional, defaults to localhost:6379)
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Log filter when RUST_LOG is unset (optional, default "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit logs as JSON lines (optional, default false)
    #[serde(default)]
    pub log_json: bool,

    /// Queryable record types
    #[serde(default)]
    pub record_types: Vec<RecordType>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;

        let config: Config = serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    fn validate(&self) -> CliResult<()> {
        self.connection
            .validate()
            .map_err(|e| CliError::config_error(format!("Connection config error: {}", e)))?;

        if self.log_level.trim().is_empty() {
            return Err(CliError::config_error("log_level must not be empty"));
        }

        self.registry()?;

        Ok(())
    }

    /// Builds the record type registry
    pub fn registry(&self) -> CliResult<RecordTypes> {
        RecordTypes::from_types(self.record_types.iter().cloned())
            .map_err(|e| CliError::config_error(format!("Record type error: {}", e)))
    }
}

/// Parse arguments and run the selected command.
///
/// Failures are also reported on stdout as a JSON error object.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command).map_err(|e| {
        let _ = write_error(e.code_str(), e.message());
        e
    })
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Ping { config } => ping(&config),
        Command::Query { config } => query(&config),
        Command::Explain { config } => explain(&config),
    }
}

fn load_and_init(config_path: &Path) -> CliResult<Config> {
    let config = Config::load(config_path)?;
    init_logging(&config.log_level, config.log_json);
    info!(
        event = Event::ConfigLoaded.as_str(),
        path = %config_path.display(),
        address = %config.connection.address(),
        record_types = config.record_types.len(),
        "configuration loaded"
    );
    Ok(config)
}

/// Connect, authenticate, select and PING
pub fn ping(config_path: &Path) -> CliResult<()> {
    let config = load_and_init(config_path)?;

    let mut connection = Connection::new(config.connection.clone());
    connection.ping()?;
    connection.close()?;

    write_response(json!({
        "pong": true,
        "address": config.connection.address(),
    }))
}

/// Execute one query read from stdin
pub fn query(config_path: &Path) -> CliResult<()> {
    let config = load_and_init(config_path)?;
    let registry = config.registry()?;

    let request = QueryRequest::from_json(read_request()?)?;
    let operation = request.operation()?;
    let descriptor = request.to_descriptor()?;

    let mut connection = Connection::new(config.connection.clone());
    let output = QueryExecutor::new(&mut connection, &registry).execute(
        &descriptor,
        operation,
        request.column.as_deref(),
    )?;
    connection.close()?;

    write_response(serde_json::to_value(output)?)
}

/// Explain one query read from stdin, without connecting
pub fn explain(config_path: &Path) -> CliResult<()> {
    let config = load_and_init(config_path)?;
    let registry = config.registry()?;

    let request = QueryRequest::from_json(read_request()?)?;
    let operation = request.operation()?;
    let descriptor = request.to_descriptor()?;
    let record_type = registry.get(&descriptor.record_type)?;

    let plan = ExplainPlan::from_descriptor(
        record_type,
        &descriptor,
        operation,
        request.column.as_deref(),
    );
    info!(
        event = Event::ExplainComplete.as_str(),
        record_type = %plan.record_type,
        accepted = plan.accepted,
        strategy = plan.strategy.as_deref().unwrap_or("-"),
        "explain complete"
    );
    write_response(serde_json::to_value(plan)?)
}
