//! Bridge exposing an embedded `SQLite` engine to a plugin host.
//!
//! The host awaits [`initialize`] once, then drives the returned [`Bridge`]
//! either through its typed methods or by function name through
//! [`Bridge::call`]. Every operation is a synchronous pass-through to the
//! engine; engine errors come back unchanged as [`BridgeError::Engine`].
//!
//! ```rust
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), sqflite_core::BridgeError> {
//! use sqflite_core::{initialize, BridgeConfig};
//!
//! let mut bridge = initialize(BridgeConfig::default()).await?;
//! bridge.create()?;
//! assert_eq!(bridge.execute_scalar_int("SELECT 1")?, 1);
//! # Ok(())
//! # }
//! ```
#![deny(clippy::all, clippy::pedantic, clippy::nursery)]

mod bridge;
pub use bridge::Bridge;

mod config;
pub use config::{ApiVersion, BridgeConfig, DEFAULT_READY_EVENT};

mod dispatch;
pub use dispatch::{Call, Method, Reply};

mod error;
pub use error::BridgeError;

pub mod logger;

mod ready;
pub use ready::initialize;

mod statements;
pub use statements::StatementId;

pub use sqflite_db::{DbError, DbErrorCode, Params, ResultSet, Value};

/// Result type for bridge operations.
pub type BridgeResult<T, E = BridgeError> = std::result::Result<T, E>;
