//! # Compile Errors
//!
//! Every compile error is a rejection of the query as written. None of them
//! is raised after a command has been sent.

use thiserror::Error;

/// Result type for compilation
pub type CompileResult<T> = Result<T, CompileError>;

/// Compile errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// The store cannot evaluate this (ordering, pattern matching)
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Unknown operator, wrong operand count or operand of the wrong kind
    #[error("Malformed condition: {0}")]
    MalformedCondition(String),

    /// A raw text condition
    #[error("Unsupported condition: {0}")]
    UnsupportedCondition(String),

    /// A column operation without a column
    #[error("Operation '{0}' requires a column")]
    MissingColumn(String),
}

impl CompileError {
    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            CompileError::UnsupportedOperation(_) => "REDQ_UNSUPPORTED_OPERATION",
            CompileError::MalformedCondition(_) => "REDQ_MALFORMED_CONDITION",
            CompileError::UnsupportedCondition(_) => "REDQ_UNSUPPORTED_CONDITION",
            CompileError::MissingColumn(_) => "REDQ_MISSING_COLUMN",
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        CompileError::MalformedCondition(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(
            CompileError::UnsupportedOperation("LIKE".into()).code(),
            "REDQ_UNSUPPORTED_OPERATION"
        );
        assert_eq!(
            CompileError::MissingColumn("sum".into()).code(),
            "REDQ_MISSING_COLUMN"
        );
    }

    #[test]
    fn test_display() {
        let err = CompileError::MissingColumn("average".into());
        assert_eq!(err.to_string(), "Operation 'average' requires a column");
        let err = CompileError::malformed("between needs 3 operands");
        assert_eq!(err.to_string(), "Malformed condition: between needs 3 operands");
    }
}
