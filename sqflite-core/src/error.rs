use sqflite_db::DbError;
use thiserror::Error;

use crate::config::ApiVersion;
use crate::statements::StatementId;

/// Error outputs from the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// The engine rejected the operation. Code and message are unchanged.
    #[error(transparent)]
    Engine(#[from] DbError),
    /// No database is open on this bridge.
    #[error("database is not open")]
    NotOpen,
    /// The statement id was never issued, was freed, or belonged to a
    /// database that has since been closed or replaced.
    #[error("unknown statement {0}")]
    UnknownStatement(StatementId),
    /// Row values were requested before a successful step.
    #[error("statement has no current row")]
    NoCurrentRow,
    /// A scalar query produced no rows.
    #[error("query returned no rows")]
    EmptyResult,
    /// A scalar value could not be coerced to an integer.
    #[error("not an integer: {0}")]
    NotInteger(String),
    /// The method name is not part of the configured API version.
    #[error("unknown method `{method}` for api {version}")]
    UnknownMethod {
        /// Name the host called.
        method: String,
        /// API version the bridge serves.
        version: ApiVersion,
    },
    /// A call is missing an argument its method requires.
    #[error("missing argument `{0}`")]
    MissingArgument(&'static str),
    /// The bridge configuration could not be parsed or is inconsistent.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}
