//! Command parse errors.

use thiserror::Error;

/// Result type for command parsing.
pub type ParseResult<T> = Result<T, ParseError>;

/// Errors produced while parsing one script line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// Line had no command name.
    #[error("empty command")]
    Empty,

    /// The command name is not one the driver knows.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// Right command, wrong number of arguments.
    #[error("{command} takes {expected} argument(s), got {got}")]
    WrongArity { command: String, expected: usize, got: usize },

    /// A transaction token that is not `T<n>`.
    #[error("invalid transaction id: {0}")]
    InvalidTransaction(String),

    /// A variable token that is not `x<k>` with k in range.
    #[error("invalid variable: {0}")]
    InvalidVariable(String),

    /// A site token that is not an integer in range.
    #[error("invalid site id: {0}")]
    InvalidSite(String),

    /// A write payload that is not an integer.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// Anything else structurally wrong with the line.
    #[error("malformed command: {0}")]
    Malformed(String),
}
