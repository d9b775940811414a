//! Safe wrapper around a `SQLite` database connection.
//!
//! This file contains **no `unsafe` code**. All FFI interaction is delegated to
//! [`ffi::RawDb`] which encapsulates the raw pointers and C type conversions.

use super::error::{DbError, DbResult};
use super::ffi::{self, RawDb};
use super::result::ResultSet;
use super::statement::{Params, Statement, StepResult};

const MEMORY_PATH: &str = ":memory:";

/// A `SQLite` database connection.
///
/// Closed when dropped. Not `Sync` -- all access must happen from a single
/// thread (matches the WASM single-thread constraint and the `&mut`-guarded
/// usage in the bridge).
pub struct Connection {
    db: RawDb,
}

impl Connection {
    /// Opens a new, empty in-memory database.
    pub fn open_in_memory() -> DbResult<Self> {
        let flags =
            ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE | ffi::SQLITE_OPEN_FULLMUTEX;
        let db = RawDb::open(MEMORY_PATH, flags)?;
        Ok(Self { db })
    }

    /// Opens an in-memory database loaded from a serialized image.
    ///
    /// An empty image yields a fresh empty database. Otherwise the image is
    /// checked right away by reading `sqlite_master`, so a corrupt buffer
    /// fails here (`SQLITE_NOTADB`) rather than on the first query.
    pub fn from_bytes(bytes: &[u8]) -> DbResult<Self> {
        let conn = Self::open_in_memory()?;
        if bytes.is_empty() {
            return Ok(conn);
        }
        conn.db.deserialize(bytes)?;
        conn.execute_batch("SELECT count(*) FROM sqlite_master;")?;
        log::debug!("loaded database image of {} bytes", bytes.len());
        Ok(conn)
    }

    /// Serializes the `main` database into a byte image that
    /// [`from_bytes`](Self::from_bytes) can load. A database with no pages
    /// yields an empty image.
    pub fn serialize(&self) -> DbResult<Vec<u8>> {
        self.db.serialize()
    }

    /// Executes one or more SQL statements separated by semicolons.
    ///
    /// No result rows are returned. Suitable for DDL, PRAGMAs, and
    /// multi-statement scripts.
    pub fn execute_batch(&self, sql: &str) -> DbResult<()> {
        self.db.exec(sql)
    }

    /// Prepares the first SQL statement of `sql`; any remainder is ignored.
    pub fn prepare(&self, sql: &str) -> DbResult<Statement> {
        match self.db.prepare(sql)? {
            (Some(raw), _) => Ok(Statement::new(raw)),
            (None, _) => Err(DbError::new(ffi::SQLITE_MISUSE, "nothing to prepare")),
        }
    }

    /// Prepares the first statement of `sql`, binds `params`, steps it once
    /// and finalizes it. Rows are discarded.
    pub fn run(&self, sql: &str, params: &Params) -> DbResult<()> {
        let mut stmt = self.prepare(sql)?;
        stmt.bind(params)?;
        stmt.step()?;
        Ok(())
    }

    /// Runs every statement in `sql` and collects one [`ResultSet`] per
    /// statement that produced at least one row.
    pub fn exec_results(&self, sql: &str) -> DbResult<Vec<ResultSet>> {
        let mut results = Vec::new();
        let mut rest = sql;
        loop {
            let (raw, tail) = self.db.prepare(rest)?;
            let advanced = tail.len() < rest.len();
            rest = tail;
            let Some(raw) = raw else {
                // An empty statement (`;` or a comment) is skipped.
                if advanced {
                    continue;
                }
                break;
            };
            let mut stmt = Statement::new(raw);
            let mut current: Option<ResultSet> = None;
            while stmt.step()? == StepResult::Row {
                let set = current.get_or_insert_with(|| ResultSet::new(stmt.column_names()));
                set.values.push(stmt.row()?);
            }
            results.extend(current);
        }
        Ok(results)
    }

    /// Returns the number of rows changed by the most recent statement.
    #[must_use]
    pub fn changes(&self) -> usize {
        usize::try_from(self.db.changes()).unwrap_or(0)
    }

    /// Closes the connection, reporting a failed close.
    pub fn close(self) -> DbResult<()> {
        self.db.close()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}
