//! Protocol client error types
//!
//! Error codes:
//! - REDQ_CONNECTION_FAILED (socket could not be opened)
//! - REDQ_PROTOCOL_VIOLATION (FATAL for the socket, stream out of sync)
//! - REDQ_COMMAND_FAILED (server returned an error reply)

use std::fmt;
use std::io;

/// Severity levels for client errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The call failed, the connection is still usable
    Error,
    /// The connection must be discarded
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Client error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientErrorCode {
    /// Socket could not be established
    ConnectionFailed,
    /// Malformed reply frame or I/O failure mid-exchange
    ProtocolViolation,
    /// The server answered with an error reply
    CommandFailed,
}

impl ClientErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            ClientErrorCode::ConnectionFailed => "REDQ_CONNECTION_FAILED",
            ClientErrorCode::ProtocolViolation => "REDQ_PROTOCOL_VIOLATION",
            ClientErrorCode::CommandFailed => "REDQ_COMMAND_FAILED",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            ClientErrorCode::ProtocolViolation => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for ClientErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Protocol client error with full context
#[derive(Debug)]
pub struct ClientError {
    code: ClientErrorCode,
    message: String,
    /// Echo of the command that failed, for command errors
    command: Option<String>,
    source: Option<io::Error>,
}

impl ClientError {
    /// The socket to `host:port` could not be opened.
    pub fn connection(host: &str, port: u16, source: io::Error) -> Self {
        Self {
            code: ClientErrorCode::ConnectionFailed,
            message: format!("Failed to open connection to {}:{}: {}", host, port, source),
            command: None,
            source: Some(source),
        }
    }

    /// The reply stream did not match the wire format.
    pub fn protocol(reason: impl Into<String>) -> Self {
        Self {
            code: ClientErrorCode::ProtocolViolation,
            message: reason.into(),
            command: None,
            source: None,
        }
    }

    /// An I/O error while writing a request or reading a reply.
    pub fn io(context: &str, source: io::Error) -> Self {
        Self {
            code: ClientErrorCode::ProtocolViolation,
            message: format!("{}: {}", context, source),
            command: None,
            source: Some(source),
        }
    }

    /// The server returned an error reply for `command`.
    pub fn command(server_message: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            code: ClientErrorCode::CommandFailed,
            message: server_message.into(),
            command: Some(command.into()),
            source: None,
        }
    }

    /// Returns the error code
    pub fn code(&self) -> ClientErrorCode {
        self.code
    }

    /// Returns the error message (for command errors, the server's text)
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the echoed command, for command errors
    pub fn failed_command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    /// Returns whether the connection must be discarded
    pub fn is_fatal(&self) -> bool {
        self.code.severity() == Severity::Fatal
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        if let Some(ref command) = self.command {
            write!(f, " (command was: {})", command)?;
        }
        Ok(())
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for protocol client operations
pub type ClientResult<T> = Result<T, ClientError>;
