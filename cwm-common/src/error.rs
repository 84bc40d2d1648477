//! Errors raised below the hub's request layer
//!
//! The hub wraps these in its own error type; every variant here ends up
//! as an internal failure from a client's point of view.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Creating the database directory failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// A stored column holds text that no longer parses as its type
    #[error("Corrupt {column} value '{value}': {reason}")]
    CorruptRow {
        column: &'static str,
        value: String,
        reason: String,
    },

    /// A blocking worker task panicked or was cancelled
    #[error("Worker task failed: {0}")]
    Task(String),
}

impl Error {
    pub fn corrupt_row(column: &'static str, value: &str, reason: impl ToString) -> Self {
        Error::CorruptRow {
            column,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}
