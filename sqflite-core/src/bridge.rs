//! The bridge context object.
//!
//! A [`Bridge`] owns at most one database and every statement prepared on
//! it. Each operation is a direct pass-through to the engine; results and
//! engine errors are returned unchanged.

use sqflite_db::{Connection, Params, ResultSet, StepResult, Value};

use crate::config::{ApiVersion, BridgeConfig};
use crate::error::BridgeError;
use crate::statements::{StatementId, StatementTable};
use crate::BridgeResult;

/// Context object through which a host drives one database.
///
/// Obtained from [`initialize`](crate::initialize). All methods take the
/// bridge explicitly, so there is no ambient database handle to race on.
#[derive(Debug)]
pub struct Bridge {
    config: BridgeConfig,
    db: Option<Connection>,
    statements: StatementTable,
}

impl Bridge {
    pub(crate) fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            db: None,
            statements: StatementTable::default(),
        }
    }

    /// The configuration this bridge was initialized with.
    #[must_use]
    pub const fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// The function set served by name-based dispatch.
    #[must_use]
    pub const fn api_version(&self) -> ApiVersion {
        self.config.api_version
    }

    /// Returns `true` while a database is open.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.db.is_some()
    }

    /// Number of statements prepared and not yet freed.
    #[must_use]
    pub fn open_statements(&self) -> usize {
        self.statements.len()
    }

    // ── Database lifecycle ──────────────────────────────────────────────

    /// Replaces the current database with a new empty one.
    ///
    /// # Errors
    ///
    /// Engine errors while opening or applying the configured pragmas.
    pub fn create(&mut self) -> BridgeResult<()> {
        let conn = Connection::open_in_memory()?;
        self.install(conn)?;
        log::debug!("created empty database");
        Ok(())
    }

    /// Replaces the current database with one loaded from a serialized image.
    ///
    /// An empty image opens a fresh empty database.
    ///
    /// # Errors
    ///
    /// Engine errors for a corrupt image (`SQLITE_NOTADB`) or while applying
    /// the configured pragmas. The previous database stays open on failure.
    pub fn open(&mut self, data: &[u8]) -> BridgeResult<()> {
        let conn = Connection::from_bytes(data)?;
        self.install(conn)?;
        log::debug!("opened database from {} bytes", data.len());
        Ok(())
    }

    /// Releases the database and every statement prepared on it.
    ///
    /// # Errors
    ///
    /// [`BridgeError::NotOpen`] without an open database; engine errors from
    /// closing.
    pub fn close(&mut self) -> BridgeResult<()> {
        let conn = self.db.take().ok_or(BridgeError::NotOpen)?;
        let freed = self.statements.clear();
        log::debug!("closing database, finalized {freed} statement(s)");
        conn.close()?;
        Ok(())
    }

    /// Configures `conn`, then disposes of the previous database (and its
    /// statements) before installing it.
    fn install(&mut self, conn: Connection) -> BridgeResult<()> {
        for pragma in &self.config.pragmas {
            conn.execute_batch(pragma)?;
        }
        if let Some(old) = self.db.take() {
            let freed = self.statements.clear();
            if freed > 0 {
                log::warn!("reopening database, finalized {freed} live statement(s)");
            }
            if let Err(e) = old.close() {
                log::warn!("failed to close previous database: {e}");
            }
        }
        self.db = Some(conn);
        Ok(())
    }

    fn conn(&self) -> BridgeResult<&Connection> {
        self.db.as_ref().ok_or(BridgeError::NotOpen)
    }

    // ── Direct SQL ──────────────────────────────────────────────────────

    /// Executes SQL for its side effects only.
    ///
    /// Without `params` every statement in `sql` runs. With `params` only the
    /// first statement is prepared, bound, stepped once and freed.
    ///
    /// # Errors
    ///
    /// [`BridgeError::NotOpen`]; engine errors.
    pub fn run(&mut self, sql: &str, params: Option<&Params>) -> BridgeResult<()> {
        let conn = self.conn()?;
        match params {
            None => conn.execute_batch(sql)?,
            Some(params) => conn.run(sql, params)?,
        }
        Ok(())
    }

    /// Executes `sql` and returns the first result set, if any statement
    /// produced rows.
    ///
    /// Every statement in `sql` runs, but only the first result set is
    /// returned; callers pass one statement per call.
    ///
    /// # Errors
    ///
    /// [`BridgeError::NotOpen`]; engine errors.
    pub fn execute(&mut self, sql: &str) -> BridgeResult<Option<ResultSet>> {
        let results = self.conn()?.exec_results(sql)?;
        Ok(results.into_iter().next())
    }

    /// Executes `sql` and returns the first column of its first row.
    ///
    /// # Errors
    ///
    /// [`BridgeError::EmptyResult`] when no row is produced;
    /// [`BridgeError::NotOpen`]; engine errors.
    pub fn execute_scalar(&mut self, sql: &str) -> BridgeResult<Value> {
        self.execute(sql)?
            .and_then(|set| set.scalar().cloned())
            .ok_or(BridgeError::EmptyResult)
    }

    /// Like [`execute_scalar`](Self::execute_scalar), with the value coerced
    /// to an integer.
    ///
    /// # Errors
    ///
    /// [`BridgeError::NotInteger`] when the value cannot be coerced, plus
    /// the errors of [`execute_scalar`](Self::execute_scalar).
    pub fn execute_scalar_int(&mut self, sql: &str) -> BridgeResult<i64> {
        coerce_integer(&self.execute_scalar(sql)?)
    }

    /// Rows changed by the most recent mutating statement on this database.
    ///
    /// # Errors
    ///
    /// [`BridgeError::NotOpen`].
    pub fn rows_modified(&self) -> BridgeResult<usize> {
        Ok(self.conn()?.changes())
    }

    /// Serializes the open database into an image [`open`](Self::open)
    /// accepts.
    ///
    /// # Errors
    ///
    /// [`BridgeError::NotOpen`]; engine errors.
    pub fn export(&self) -> BridgeResult<Vec<u8>> {
        Ok(self.conn()?.serialize()?)
    }

    // ── Prepared statements ─────────────────────────────────────────────

    /// Prepares the first statement of `sql`, binding `params` when given.
    ///
    /// # Errors
    ///
    /// [`BridgeError::NotOpen`]; engine parse and bind errors.
    pub fn prepare(&mut self, sql: &str, params: Option<&Params>) -> BridgeResult<StatementId> {
        let mut stmt = self.conn()?.prepare(sql)?;
        if let Some(params) = params {
            stmt.bind(params)?;
        }
        let id = self.statements.insert(stmt);
        log::debug!("prepared statement {id}");
        Ok(id)
    }

    fn statement(&mut self, id: StatementId) -> BridgeResult<&mut sqflite_db::Statement> {
        if self.db.is_none() {
            return Err(BridgeError::NotOpen);
        }
        self.statements.get_mut(id)
    }

    /// Resets the statement, clears its bindings and binds `params`.
    ///
    /// # Errors
    ///
    /// [`BridgeError::UnknownStatement`]; engine errors for a parameter
    /// count or name mismatch.
    pub fn bind(&mut self, id: StatementId, params: Option<&Params>) -> BridgeResult<bool> {
        let empty = Params::Positional(Vec::new());
        self.statement(id)?.bind(params.unwrap_or(&empty))?;
        Ok(true)
    }

    /// Binds `params` when given, steps once and resets the statement.
    ///
    /// # Errors
    ///
    /// [`BridgeError::UnknownStatement`]; engine errors.
    pub fn stmt_run(&mut self, id: StatementId, params: Option<&Params>) -> BridgeResult<()> {
        let stmt = self.statement(id)?;
        if let Some(params) = params {
            stmt.bind(params)?;
        }
        stmt.step()?;
        stmt.reset()?;
        Ok(())
    }

    /// Advances the statement one row. Returns `true` when a row is
    /// available, `false` once the statement is done.
    ///
    /// # Errors
    ///
    /// [`BridgeError::UnknownStatement`]; engine errors.
    pub fn step(&mut self, id: StatementId) -> BridgeResult<bool> {
        Ok(self.statement(id)?.step()? == StepResult::Row)
    }

    /// Returns the values of the current row.
    ///
    /// With `params` the statement is rebound and stepped first.
    ///
    /// # Errors
    ///
    /// [`BridgeError::NoCurrentRow`] when no row is available;
    /// [`BridgeError::UnknownStatement`]; engine errors.
    pub fn get(&mut self, id: StatementId, params: Option<&Params>) -> BridgeResult<Vec<Value>> {
        let stmt = self.statement(id)?;
        if let Some(params) = params {
            stmt.bind(params)?;
            stmt.step()?;
        }
        if !stmt.has_row() {
            return Err(BridgeError::NoCurrentRow);
        }
        Ok(stmt.row()?)
    }

    /// Returns the ordered result column names of the statement.
    ///
    /// # Errors
    ///
    /// [`BridgeError::UnknownStatement`].
    pub fn column_names(&mut self, id: StatementId) -> BridgeResult<Vec<String>> {
        Ok(self.statement(id)?.column_names())
    }

    /// Finalizes the statement. The id is invalid afterwards.
    ///
    /// # Errors
    ///
    /// [`BridgeError::UnknownStatement`] for an unknown or already freed id.
    pub fn free(&mut self, id: StatementId) -> BridgeResult<bool> {
        if self.db.is_none() {
            return Err(BridgeError::NotOpen);
        }
        drop(self.statements.remove(id)?);
        log::debug!("freed statement {id}");
        Ok(true)
    }
}

/// Integer coercion applied by the v2 `executeScalar`.
///
/// Reals truncate toward zero; text must hold a decimal number.
#[allow(clippy::cast_possible_truncation)]
fn coerce_integer(value: &Value) -> BridgeResult<i64> {
    const LIMIT: f64 = 9_223_372_036_854_775_807.0;
    let from_real = |v: f64| {
        if v.is_finite() && v.abs() < LIMIT {
            Ok(v.trunc() as i64)
        } else {
            Err(BridgeError::NotInteger(v.to_string()))
        }
    };
    match value {
        Value::Integer(v) => Ok(*v),
        Value::Real(v) => from_real(*v),
        Value::Text(s) => {
            let trimmed = s.trim();
            trimmed.parse::<i64>().or_else(|_| {
                trimmed
                    .parse::<f64>()
                    .map_err(|_| BridgeError::NotInteger(format!("{s:?}")))
                    .and_then(from_real)
            })
        }
        Value::Null => Err(BridgeError::NotInteger("NULL".to_string())),
        Value::Blob(b) => Err(BridgeError::NotInteger(format!("blob of {} bytes", b.len()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_bridge() -> Bridge {
        let mut bridge = Bridge::new(BridgeConfig::default());
        bridge.create().unwrap();
        bridge
    }

    #[test]
    fn test_coerce_integer() {
        assert_eq!(coerce_integer(&Value::Integer(4)).unwrap(), 4);
        assert_eq!(coerce_integer(&Value::Real(2.9)).unwrap(), 2);
        assert_eq!(coerce_integer(&Value::Real(-2.9)).unwrap(), -2);
        assert_eq!(coerce_integer(&Value::from(" 12 ")).unwrap(), 12);
        assert_eq!(coerce_integer(&Value::from("3.5")).unwrap(), 3);
        assert!(matches!(
            coerce_integer(&Value::from("abc")),
            Err(BridgeError::NotInteger(_))
        ));
        assert!(matches!(
            coerce_integer(&Value::Null),
            Err(BridgeError::NotInteger(_))
        ));
        assert!(matches!(
            coerce_integer(&Value::Real(f64::NAN)),
            Err(BridgeError::NotInteger(_))
        ));
        assert!(matches!(
            coerce_integer(&Value::Blob(vec![1])),
            Err(BridgeError::NotInteger(_))
        ));
    }

    #[test]
    fn test_operations_require_open_database() {
        let mut bridge = Bridge::new(BridgeConfig::default());
        assert_eq!(bridge.close(), Err(BridgeError::NotOpen));
        assert_eq!(bridge.run("SELECT 1", None), Err(BridgeError::NotOpen));
        assert_eq!(bridge.rows_modified(), Err(BridgeError::NotOpen));
        assert_eq!(
            bridge.step(StatementId::from(1)),
            Err(BridgeError::NotOpen)
        );
        assert_eq!(
            bridge.free(StatementId::from(1)),
            Err(BridgeError::NotOpen)
        );
    }

    #[test]
    fn test_pragmas_applied_on_create() {
        let config = BridgeConfig {
            pragmas: vec!["PRAGMA user_version = 7".to_string()],
            ..BridgeConfig::default()
        };
        let mut bridge = Bridge::new(config);
        bridge.create().unwrap();
        assert_eq!(bridge.execute_scalar_int("PRAGMA user_version").unwrap(), 7);
    }

    #[test]
    fn test_failed_open_keeps_previous_database() {
        let mut bridge = open_bridge();
        bridge.run("CREATE TABLE t (x)", None).unwrap();
        assert!(bridge.open(&[0xAB; 4096]).is_err());
        assert!(bridge.is_open());
        assert_eq!(bridge.execute_scalar_int("SELECT count(*) FROM t").unwrap(), 0);
    }

    #[test]
    fn test_get_before_step_has_no_row() {
        let mut bridge = open_bridge();
        let id = bridge.prepare("SELECT 1", None).unwrap();
        assert_eq!(bridge.get(id, None), Err(BridgeError::NoCurrentRow));
        assert!(bridge.step(id).unwrap());
        assert_eq!(bridge.get(id, None).unwrap(), vec![Value::Integer(1)]);
        assert!(!bridge.step(id).unwrap());
        assert_eq!(bridge.get(id, None), Err(BridgeError::NoCurrentRow));
    }
}
