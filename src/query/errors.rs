//! # Query Errors
//!
//! Client and compile errors pass through unchanged; the executor adds only
//! the failures it can detect itself.

use thiserror::Error;

use crate::protocol::ClientError;
use crate::script::CompileError;

/// Result type for record type lookups
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Result type for query execution
pub type QueryResult<T> = Result<T, QueryError>;

/// Record type registry errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("Unknown record type: {0}")]
    UnknownRecordType(String),

    #[error("Unknown relation '{relation}' on record type '{record_type}'")]
    UnknownRelation {
        record_type: String,
        relation: String,
    },

    #[error("Invalid record type: {0}")]
    Invalid(String),
}

impl SchemaError {
    pub fn code(&self) -> &'static str {
        match self {
            SchemaError::UnknownRecordType(_) => "REDQ_UNKNOWN_RECORD_TYPE",
            SchemaError::UnknownRelation { .. } => "REDQ_UNKNOWN_RELATION",
            SchemaError::Invalid(_) => "REDQ_INVALID_RECORD_TYPE",
        }
    }
}

/// Query execution errors
#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The reply did not have the shape the operation produces
    #[error("Unexpected reply for {operation}: {detail}")]
    UnexpectedReply {
        operation: &'static str,
        detail: String,
    },
}

impl QueryError {
    /// Returns the stable error code of the underlying failure
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::Client(e) => e.code().code(),
            QueryError::Compile(e) => e.code(),
            QueryError::Schema(e) => e.code(),
            QueryError::UnexpectedReply { .. } => "REDQ_UNEXPECTED_REPLY",
        }
    }

    pub(crate) fn unexpected(operation: &'static str, detail: impl Into<String>) -> Self {
        QueryError::UnexpectedReply {
            operation,
            detail: detail.into(),
        }
    }
}
