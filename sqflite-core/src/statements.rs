//! Bridge-owned table of live prepared statements.
//!
//! Hosts never hold engine statements. They receive a [`StatementId`] that
//! indexes this table; ids are issued from a counter and never reused, so a
//! freed id stays invalid for the lifetime of the bridge.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sqflite_db::Statement;

use crate::error::BridgeError;
use crate::BridgeResult;

/// Handle to a prepared statement, as seen by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatementId(u64);

impl StatementId {
    /// Raw id value, as marshalled to hosts.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for StatementId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for StatementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Default)]
pub struct StatementTable {
    statements: HashMap<StatementId, Statement>,
    next_id: u64,
}

impl StatementTable {
    pub fn insert(&mut self, stmt: Statement) -> StatementId {
        self.next_id += 1;
        let id = StatementId(self.next_id);
        self.statements.insert(id, stmt);
        id
    }

    pub fn get_mut(&mut self, id: StatementId) -> BridgeResult<&mut Statement> {
        self.statements
            .get_mut(&id)
            .ok_or(BridgeError::UnknownStatement(id))
    }

    pub fn remove(&mut self, id: StatementId) -> BridgeResult<Statement> {
        self.statements
            .remove(&id)
            .ok_or(BridgeError::UnknownStatement(id))
    }

    /// Finalizes every statement, returning how many were live.
    pub fn clear(&mut self) -> usize {
        let live = self.statements.len();
        self.statements.clear();
        live
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }
}
