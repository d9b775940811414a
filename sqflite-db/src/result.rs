//! Materialized query results.

use serde::{Deserialize, Serialize};

use super::value::Value;

/// Rows produced by one statement, in the shape hosts expect:
/// `{ "columns": [...], "values": [[...], ...] }`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResultSet {
    /// Ordered column names.
    pub columns: Vec<String>,
    /// Row values, one inner `Vec` per row, in column order.
    pub values: Vec<Vec<Value>>,
}

impl ResultSet {
    /// Creates an empty result set with the given columns.
    #[must_use]
    pub const fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            values: Vec::new(),
        }
    }

    /// First column of the first row, if any.
    #[must_use]
    pub fn scalar(&self) -> Option<&Value> {
        self.values.first().and_then(|row| row.first())
    }
}
