//! Minimal safe `SQLite` wrapper for the sqflite bridge.
//!
//! This crate provides a small, safe Rust API over the `SQLite` C FFI.
//! The raw symbols are resolved at compile time:
//!
//! * **Native** (`not(wasm32)`): linked against the amalgamation bundled and
//!   compiled by `libsqlite3-sys`.
//! * **WASM** (`wasm32`): delegated to `sqlite-wasm-rs` which ships its own
//!   WASM-compiled `SQLite`.
//!
//! Consumer code (the bridge) uses only the safe types defined here and never
//! touches raw FFI directly. The `ffi` module is the **only** file that
//! contains `unsafe` code or C types.

mod ffi;

mod connection;
pub mod error;
mod result;
mod statement;
pub mod value;

pub use connection::Connection;
pub use error::{DbError, DbErrorCode, DbResult};
pub use result::ResultSet;
pub use statement::{Params, Statement, StepResult};
pub use value::Value;

/// Initializes the `SQLite` library.
///
/// Called once by the host before the first connection is opened. Calling it
/// again is harmless.
pub fn initialize() -> DbResult<()> {
    ffi::initialize()
}
