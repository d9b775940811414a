//! Safe wrapper around a `SQLite` prepared statement.
//!
//! This file contains **no `unsafe` code**. All FFI interaction is delegated to
//! [`ffi::RawStmt`] which encapsulates the raw pointers and C type conversions.

use std::collections::BTreeMap;
use std::ffi::c_int;

use serde::{Deserialize, Serialize};

use super::error::{DbError, DbResult};
use super::ffi::{self, RawStmt};
use super::value::Value;

/// Prefixes `SQLite` accepts for named parameters.
const PARAMETER_PREFIXES: [char; 3] = [':', '$', '@'];

/// Result of a single `sqlite3_step` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// A result row is available.
    Row,
    /// The statement has finished executing.
    Done,
}

/// Parameters bound to a statement.
///
/// A host list binds positionally (1-based), a host object binds by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Params {
    /// `[v1, v2, ...]` bound to `?1, ?2, ...`.
    Positional(Vec<Value>),
    /// `{":name": v}` bound by parameter name. Keys without a prefix are
    /// tried with `:`, `$` and `@`.
    Named(BTreeMap<String, Value>),
}

impl From<Vec<Value>> for Params {
    fn from(values: Vec<Value>) -> Self {
        Self::Positional(values)
    }
}

impl From<&[Value]> for Params {
    fn from(values: &[Value]) -> Self {
        Self::Positional(values.to_vec())
    }
}

/// A prepared `SQLite` statement.
///
/// Created via [`Connection::prepare`](super::Connection::prepare) and
/// finalized when dropped. The statement keeps its connection alive at the
/// engine level (connections close with `sqlite3_close_v2`), but callers
/// should still drop statements before the connection.
pub struct Statement {
    raw: RawStmt,
    /// Whether the last step produced a row that can be read.
    has_row: bool,
}

impl Statement {
    /// Wraps a raw statement handle.
    pub(super) const fn new(raw: RawStmt) -> Self {
        Self {
            raw,
            has_row: false,
        }
    }

    // ── Binding ─────────────────────────────────────────────────────────

    /// Binds a slice of [`Value`]s to the statement parameters (1-indexed).
    ///
    /// Binding past the parameter count fails with `SQLITE_RANGE`.
    pub fn bind_values(&mut self, values: &[Value]) -> DbResult<()> {
        for (i, val) in values.iter().enumerate() {
            let idx = c_int::try_from(i + 1)
                .map_err(|_| DbError::new(ffi::SQLITE_RANGE, "parameter index overflow"))?;
            self.bind_at(idx, val)?;
        }
        Ok(())
    }

    /// Binds values by parameter name.
    pub fn bind_named(&mut self, values: &BTreeMap<String, Value>) -> DbResult<()> {
        for (name, val) in values {
            let idx = self.named_index(name)?.ok_or_else(|| {
                DbError::new(ffi::SQLITE_RANGE, format!("no such parameter: {name}"))
            })?;
            self.bind_at(idx, val)?;
        }
        Ok(())
    }

    /// Resets the statement, clears every binding, then binds `params`.
    pub fn bind(&mut self, params: &Params) -> DbResult<()> {
        self.has_row = false;
        // reset repeats the error of a failed previous step, which the caller
        // has already seen.
        self.raw.reset().ok();
        self.raw.clear_bindings()?;
        match params {
            Params::Positional(values) => self.bind_values(values),
            Params::Named(values) => self.bind_named(values),
        }
    }

    fn named_index(&self, name: &str) -> DbResult<Option<c_int>> {
        if name.starts_with(PARAMETER_PREFIXES) {
            return self.raw.parameter_index(name);
        }
        for prefix in PARAMETER_PREFIXES {
            if let Some(idx) = self.raw.parameter_index(&format!("{prefix}{name}"))? {
                return Ok(Some(idx));
            }
        }
        Ok(None)
    }

    fn bind_at(&self, idx: c_int, val: &Value) -> DbResult<()> {
        match val {
            Value::Null => self.raw.bind_null(idx),
            Value::Integer(v) => self.raw.bind_i64(idx, *v),
            Value::Real(v) => self.raw.bind_f64(idx, *v),
            Value::Text(v) => self.raw.bind_text(idx, v),
            Value::Blob(v) => self.raw.bind_blob(idx, v),
        }
    }

    // ── Stepping ────────────────────────────────────────────────────────

    /// Executes a single step.
    pub fn step(&mut self) -> DbResult<StepResult> {
        self.has_row = false;
        let rc = self.raw.step()?;
        if rc == ffi::SQLITE_ROW {
            self.has_row = true;
            Ok(StepResult::Row)
        } else {
            Ok(StepResult::Done)
        }
    }

    /// Resets the statement so it can be stepped again. Bindings are kept.
    pub fn reset(&mut self) -> DbResult<()> {
        self.has_row = false;
        self.raw.reset()
    }

    /// Returns `true` when the last step produced a readable row.
    #[must_use]
    pub const fn has_row(&self) -> bool {
        self.has_row
    }

    // ── Column reading ──────────────────────────────────────────────────

    /// Returns the number of columns in the result set.
    #[must_use]
    pub fn column_count(&self) -> usize {
        usize::try_from(self.raw.column_count()).unwrap_or(0)
    }

    /// Returns the ordered result column names.
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        (0..self.raw.column_count())
            .map(|idx| self.raw.column_name(idx))
            .collect()
    }

    /// Reads column `idx` of the current row with its storage class.
    #[must_use]
    pub fn column_value(&self, idx: usize) -> Value {
        let idx = column_index(idx);
        match self.raw.column_type(idx) {
            ffi::SQLITE_INTEGER => Value::Integer(self.raw.column_i64(idx)),
            ffi::SQLITE_FLOAT => Value::Real(self.raw.column_f64(idx)),
            ffi::SQLITE_TEXT => Value::Text(self.raw.column_text(idx)),
            ffi::SQLITE_BLOB => Value::Blob(self.raw.column_blob(idx)),
            _ => Value::Null,
        }
    }

    /// Reads every column of the current row.
    ///
    /// Fails with `SQLITE_MISUSE` when no row is available (before the first
    /// step, or after the statement is done or reset).
    pub fn row(&self) -> DbResult<Vec<Value>> {
        if !self.has_row {
            return Err(DbError::new(ffi::SQLITE_MISUSE, "no current row"));
        }
        Ok((0..self.column_count())
            .map(|idx| self.column_value(idx))
            .collect())
    }
}

impl std::fmt::Debug for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement")
            .field("has_row", &self.has_row)
            .finish_non_exhaustive()
    }
}

/// Out-of-range indices map to `-1`, which `SQLite` reads as NULL.
fn column_index(idx: usize) -> c_int {
    c_int::try_from(idx).unwrap_or(-1)
}
