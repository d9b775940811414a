//! Database error types for the safe `SQLite` wrapper.

use std::fmt;

use thiserror::Error;

/// Result code returned by `SQLite` operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DbErrorCode(pub i32);

impl DbErrorCode {
    /// Primary result code, with the extended bits masked off.
    #[must_use]
    pub const fn primary(self) -> i32 {
        self.0 & 0xff
    }
}

impl fmt::Display for DbErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned by database operations.
///
/// Carries the engine's result code and message unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("sqlite error {code}: {message}")]
pub struct DbError {
    /// `SQLite` result code.
    pub code: DbErrorCode,
    /// Human-readable error message (from `sqlite3_errmsg` when available).
    pub message: String,
}

impl DbError {
    /// Creates a new database error.
    pub(crate) fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code: DbErrorCode(code),
            message: message.into(),
        }
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
