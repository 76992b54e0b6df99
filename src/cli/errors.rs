//! CLI-specific error types
//!
//! All CLI errors end the process. Query failures keep the code of the
//! underlying error so callers can branch on it.

use std::fmt;
use std::io;

use crate::protocol::ClientError;
use crate::query::{QueryError, SchemaError};
use crate::script::CompileError;

/// CLI error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (stdin/stdout)
    IoError,
    /// Request JSON does not describe a query
    InvalidRequest,
    /// The query itself failed
    QueryFailed(&'static str),
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "REDQ_CLI_CONFIG_ERROR",
            Self::IoError => "REDQ_CLI_IO_ERROR",
            Self::InvalidRequest => "REDQ_CLI_INVALID_REQUEST",
            Self::QueryFailed(code) => code,
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Config error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    /// I/O error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    /// Invalid request
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::InvalidRequest, msg)
    }

    /// Get the error code
    pub fn code(&self) -> CliErrorCode {
        self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<QueryError> for CliError {
    fn from(e: QueryError) -> Self {
        let message = match &e {
            // the client error Display already carries its code
            QueryError::Client(client) => match client.failed_command() {
                Some(command) => format!("{} (command was: {})", client.message(), command),
                None => client.message().to_string(),
            },
            other => other.to_string(),
        };
        Self::new(CliErrorCode::QueryFailed(e.code()), message)
    }
}

impl From<ClientError> for CliError {
    fn from(e: ClientError) -> Self {
        QueryError::from(e).into()
    }
}

impl From<CompileError> for CliError {
    fn from(e: CompileError) -> Self {
        QueryError::from(e).into()
    }
}

impl From<SchemaError> for CliError {
    fn from(e: SchemaError) -> Self {
        QueryError::from(e).into()
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
