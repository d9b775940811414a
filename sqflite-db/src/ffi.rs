//! Raw FFI layer over `SQLite`, resolved at compile time via `cfg`.
//!
//! On native targets the symbols come from `libsqlite3-sys`, which compiles
//! the bundled amalgamation. On `wasm32` targets they come from
//! `sqlite-wasm-rs`, which ships its own WASM-compiled `SQLite` exposing the
//! same C API surface.
//!
//! This is the **only** module that contains `unsafe` code. It exposes two
//! owning handles, [`RawDb`] and [`RawStmt`], whose methods are safe.

use std::ffi::{c_char, c_int, c_uint, CStr, CString};
use std::ptr;

#[cfg(not(target_arch = "wasm32"))]
use libsqlite3_sys as sys;
#[cfg(target_arch = "wasm32")]
use sqlite_wasm_rs as sys;

use super::error::{DbError, DbResult};

// ── SQLite constants ────────────────────────────────────────────────────

pub const SQLITE_OK: c_int = 0;
pub const SQLITE_ERROR: c_int = 1;
pub const SQLITE_NOMEM: c_int = 7;
pub const SQLITE_TOOBIG: c_int = 18;
pub const SQLITE_MISUSE: c_int = 21;
pub const SQLITE_RANGE: c_int = 25;
pub const SQLITE_ROW: c_int = 100;
pub const SQLITE_DONE: c_int = 101;

// Column type constants
pub const SQLITE_INTEGER: c_int = 1;
pub const SQLITE_FLOAT: c_int = 2;
pub const SQLITE_TEXT: c_int = 3;
pub const SQLITE_BLOB: c_int = 4;

// Open flags
pub const SQLITE_OPEN_READWRITE: c_int = 0x0000_0002;
pub const SQLITE_OPEN_CREATE: c_int = 0x0000_0004;
pub const SQLITE_OPEN_FULLMUTEX: c_int = 0x0001_0000;

// Deserialize flags
const SQLITE_DESERIALIZE_FREEONCLOSE: c_uint = 1;
const SQLITE_DESERIALIZE_RESIZEABLE: c_uint = 2;

const MAIN_SCHEMA: &CStr = c"main";

/// Header offsets of the file format write and read versions. `2` marks a
/// WAL database, `1` the rollback journal.
const FORMAT_VERSION_OFFSETS: [usize; 2] = [18, 19];
const FORMAT_VERSION_WAL: u8 = 2;
const FORMAT_VERSION_LEGACY: u8 = 1;

/// Rewrites a WAL header to rollback journal mode. An in-memory image has
/// no `-wal` file, so `SQLite` refuses to read a WAL-marked one.
fn clear_wal_marker(image: &mut [u8]) {
    let is_wal = FORMAT_VERSION_OFFSETS
        .iter()
        .all(|&offset| image.get(offset) == Some(&FORMAT_VERSION_WAL));
    if is_wal {
        for offset in FORMAT_VERSION_OFFSETS {
            image[offset] = FORMAT_VERSION_LEGACY;
        }
    }
}

fn to_c_string(s: &str, what: &str) -> DbResult<CString> {
    CString::new(s).map_err(|e| DbError::new(SQLITE_ERROR, format!("nul in {what}: {e}")))
}

fn to_c_len(len: usize) -> DbResult<c_int> {
    c_int::try_from(len).map_err(|_| DbError::new(SQLITE_TOOBIG, "string or blob too big"))
}

/// Reads the current error message of a connection.
fn errmsg(db: *mut sys::sqlite3) -> String {
    if db.is_null() {
        return "unknown error".to_string();
    }
    unsafe {
        let ptr = sys::sqlite3_errmsg(db);
        if ptr.is_null() {
            "unknown error".to_string()
        } else {
            CStr::from_ptr(ptr).to_string_lossy().into_owned()
        }
    }
}

/// Describes a result code without a connection (`sqlite3_errstr`).
fn errstr(rc: c_int) -> String {
    unsafe {
        let ptr = sys::sqlite3_errstr(rc);
        if ptr.is_null() {
            format!("sqlite result code {rc}")
        } else {
            CStr::from_ptr(ptr).to_string_lossy().into_owned()
        }
    }
}

/// Initializes the `SQLite` library. Safe to call more than once.
pub fn initialize() -> DbResult<()> {
    let rc = unsafe { sys::sqlite3_initialize() };
    if rc != SQLITE_OK {
        return Err(DbError::new(rc, errstr(rc)));
    }
    Ok(())
}

// ── Connection handle ───────────────────────────────────────────────────

/// Owning wrapper around a raw `sqlite3*`.
///
/// Closed with `sqlite3_close_v2`, so a handle whose statements are still
/// alive becomes a zombie until the last one is finalized. That keeps the
/// `db` pointer held by every [`RawStmt`] valid for the statement's lifetime.
pub struct RawDb {
    db: *mut sys::sqlite3,
}

// Safety: the handle has a single owner and is never shared between threads
// without external synchronisation. The native build is compiled with
// `SQLITE_THREADSAFE=1`; on WASM there is only one thread.
unsafe impl Send for RawDb {}

impl RawDb {
    /// Opens (or creates) a database at `path` with the given open flags.
    pub fn open(path: &str, flags: c_int) -> DbResult<Self> {
        let c_path = to_c_string(path, "path")?;
        let mut db: *mut sys::sqlite3 = ptr::null_mut();
        let rc = unsafe { sys::sqlite3_open_v2(c_path.as_ptr(), &mut db, flags, ptr::null()) };
        if rc != SQLITE_OK {
            // If open failed but we got a handle, extract the error and close.
            let msg = if db.is_null() {
                errstr(rc)
            } else {
                let m = errmsg(db);
                unsafe {
                    sys::sqlite3_close_v2(db);
                }
                m
            };
            return Err(DbError::new(rc, msg));
        }
        Ok(Self { db })
    }

    /// Replaces the `main` schema with a copy of `bytes` (`sqlite3_deserialize`).
    ///
    /// The copy lives in `SQLite`-owned memory, is resizeable and is freed
    /// when the connection closes. A WAL-mode image is loaded in rollback
    /// journal mode. `bytes` must not be empty.
    pub fn deserialize(&self, bytes: &[u8]) -> DbResult<()> {
        if bytes.is_empty() {
            return Err(DbError::new(SQLITE_MISUSE, "cannot deserialize an empty buffer"));
        }
        let size = sys::sqlite3_int64::try_from(bytes.len())
            .map_err(|_| DbError::new(SQLITE_TOOBIG, "database image too big"))?;
        let alloc_len = sys::sqlite3_uint64::try_from(bytes.len())
            .map_err(|_| DbError::new(SQLITE_TOOBIG, "database image too big"))?;
        let buf = unsafe { sys::sqlite3_malloc64(alloc_len) }.cast::<u8>();
        if buf.is_null() {
            return Err(DbError::new(SQLITE_NOMEM, errstr(SQLITE_NOMEM)));
        }
        let image = unsafe {
            ptr::copy_nonoverlapping(bytes.as_ptr(), buf, bytes.len());
            std::slice::from_raw_parts_mut(buf, bytes.len())
        };
        clear_wal_marker(image);
        let flags = SQLITE_DESERIALIZE_FREEONCLOSE | SQLITE_DESERIALIZE_RESIZEABLE;
        // On failure SQLite frees `buf` itself because of FREEONCLOSE.
        let rc = unsafe {
            sys::sqlite3_deserialize(self.db, MAIN_SCHEMA.as_ptr(), buf, size, size, flags)
        };
        if rc != SQLITE_OK {
            return Err(DbError::new(rc, errmsg(self.db)));
        }
        Ok(())
    }

    /// Returns a copy of the `main` schema as a byte image (`sqlite3_serialize`).
    ///
    /// A database that has never been written has no pages and serializes to
    /// an empty image.
    pub fn serialize(&self) -> DbResult<Vec<u8>> {
        let mut size: sys::sqlite3_int64 = -1;
        let ptr = unsafe { sys::sqlite3_serialize(self.db, MAIN_SCHEMA.as_ptr(), &mut size, 0) };
        if ptr.is_null() {
            if size == 0 {
                return Ok(Vec::new());
            }
            return Err(DbError::new(
                SQLITE_NOMEM,
                format!("sqlite3_serialize failed: {}", errmsg(self.db)),
            ));
        }
        let len = usize::try_from(size).unwrap_or(0);
        let bytes = unsafe { std::slice::from_raw_parts(ptr.cast::<u8>(), len) }.to_vec();
        unsafe {
            sys::sqlite3_free(ptr.cast());
        }
        Ok(bytes)
    }

    /// Runs one or more `;`-separated statements with `sqlite3_exec`.
    pub fn exec(&self, sql: &str) -> DbResult<()> {
        let c_sql = to_c_string(sql, "SQL")?;
        let mut err: *mut c_char = ptr::null_mut();
        let rc = unsafe {
            sys::sqlite3_exec(self.db, c_sql.as_ptr(), None, ptr::null_mut(), &mut err)
        };
        if rc != SQLITE_OK {
            let msg = if err.is_null() {
                errmsg(self.db)
            } else {
                let s = unsafe { CStr::from_ptr(err) }.to_string_lossy().into_owned();
                unsafe {
                    sys::sqlite3_free(err.cast());
                }
                s
            };
            return Err(DbError::new(rc, msg));
        }
        Ok(())
    }

    /// Compiles the first statement of `sql`.
    ///
    /// Returns the statement (`None` when the text holds only whitespace or
    /// comments) and the unparsed remainder of `sql`.
    pub fn prepare<'sql>(&self, sql: &'sql str) -> DbResult<(Option<RawStmt>, &'sql str)> {
        let len = to_c_len(sql.len())?;
        let base = sql.as_ptr().cast::<c_char>();
        let mut stmt: *mut sys::sqlite3_stmt = ptr::null_mut();
        let mut tail: *const c_char = ptr::null();
        let rc = unsafe { sys::sqlite3_prepare_v2(self.db, base, len, &mut stmt, &mut tail) };
        if rc != SQLITE_OK {
            return Err(DbError::new(rc, errmsg(self.db)));
        }
        // SQLite stops right after a statement terminator, which is ASCII and
        // therefore a char boundary.
        let consumed = if tail.is_null() {
            sql.len()
        } else {
            (tail as usize).saturating_sub(base as usize)
        };
        let rest = sql.get(consumed..).unwrap_or("");
        let stmt = (!stmt.is_null()).then(|| RawStmt { stmt, db: self.db });
        Ok((stmt, rest))
    }

    /// Rows changed by the most recently completed statement.
    pub fn changes(&self) -> c_int {
        unsafe { sys::sqlite3_changes(self.db) }
    }

    /// Closes the connection, reporting the result code.
    pub fn close(mut self) -> DbResult<()> {
        let db = std::mem::replace(&mut self.db, ptr::null_mut());
        let rc = unsafe { sys::sqlite3_close_v2(db) };
        if rc != SQLITE_OK {
            return Err(DbError::new(rc, errstr(rc)));
        }
        Ok(())
    }
}

impl Drop for RawDb {
    fn drop(&mut self) {
        if !self.db.is_null() {
            unsafe {
                sys::sqlite3_close_v2(self.db);
            }
            self.db = ptr::null_mut();
        }
    }
}

// ── Statement handle ────────────────────────────────────────────────────

/// Owning wrapper around a raw `sqlite3_stmt*`. Finalized when dropped.
pub struct RawStmt {
    stmt: *mut sys::sqlite3_stmt,
    /// Owning connection, kept for error messages.
    db: *mut sys::sqlite3,
}

// Safety: see `RawDb`. A statement is owned by exactly one `Statement`.
unsafe impl Send for RawStmt {}

impl RawStmt {
    fn check(&self, rc: c_int) -> DbResult<()> {
        if rc == SQLITE_OK {
            Ok(())
        } else {
            Err(DbError::new(rc, errmsg(self.db)))
        }
    }

    // ── Binding ─────────────────────────────────────────────────────────

    pub fn bind_i64(&self, idx: c_int, value: i64) -> DbResult<()> {
        self.check(unsafe { sys::sqlite3_bind_int64(self.stmt, idx, value) })
    }

    pub fn bind_f64(&self, idx: c_int, value: f64) -> DbResult<()> {
        self.check(unsafe { sys::sqlite3_bind_double(self.stmt, idx, value) })
    }

    pub fn bind_text(&self, idx: c_int, value: &str) -> DbResult<()> {
        let len = to_c_len(value.len())?;
        self.check(unsafe {
            sys::sqlite3_bind_text(
                self.stmt,
                idx,
                value.as_ptr().cast(),
                len,
                sys::SQLITE_TRANSIENT(),
            )
        })
    }

    pub fn bind_blob(&self, idx: c_int, value: &[u8]) -> DbResult<()> {
        let len = to_c_len(value.len())?;
        self.check(unsafe {
            sys::sqlite3_bind_blob(
                self.stmt,
                idx,
                value.as_ptr().cast(),
                len,
                sys::SQLITE_TRANSIENT(),
            )
        })
    }

    pub fn bind_null(&self, idx: c_int) -> DbResult<()> {
        self.check(unsafe { sys::sqlite3_bind_null(self.stmt, idx) })
    }

    /// Index of the named parameter (including its `:`/`$`/`@` prefix).
    pub fn parameter_index(&self, name: &str) -> DbResult<Option<c_int>> {
        let c_name = to_c_string(name, "parameter name")?;
        let idx = unsafe { sys::sqlite3_bind_parameter_index(self.stmt, c_name.as_ptr()) };
        Ok((idx > 0).then_some(idx))
    }

    pub fn clear_bindings(&self) -> DbResult<()> {
        self.check(unsafe { sys::sqlite3_clear_bindings(self.stmt) })
    }

    // ── Stepping ────────────────────────────────────────────────────────

    /// Steps once, returning `SQLITE_ROW` or `SQLITE_DONE`.
    pub fn step(&self) -> DbResult<c_int> {
        let rc = unsafe { sys::sqlite3_step(self.stmt) };
        match rc {
            SQLITE_ROW | SQLITE_DONE => Ok(rc),
            _ => Err(DbError::new(rc, errmsg(self.db))),
        }
    }

    pub fn reset(&self) -> DbResult<()> {
        self.check(unsafe { sys::sqlite3_reset(self.stmt) })
    }

    // ── Column reading ──────────────────────────────────────────────────

    pub fn column_count(&self) -> c_int {
        unsafe { sys::sqlite3_column_count(self.stmt) }
    }

    pub fn column_name(&self, idx: c_int) -> String {
        unsafe {
            let ptr = sys::sqlite3_column_name(self.stmt, idx);
            if ptr.is_null() {
                String::new()
            } else {
                CStr::from_ptr(ptr).to_string_lossy().into_owned()
            }
        }
    }

    pub fn column_type(&self, idx: c_int) -> c_int {
        unsafe { sys::sqlite3_column_type(self.stmt, idx) }
    }

    pub fn column_i64(&self, idx: c_int) -> i64 {
        unsafe { sys::sqlite3_column_int64(self.stmt, idx) }
    }

    pub fn column_f64(&self, idx: c_int) -> f64 {
        unsafe { sys::sqlite3_column_double(self.stmt, idx) }
    }

    /// Reads a column as a blob. Returns an empty `Vec` for NULL.
    pub fn column_blob(&self, idx: c_int) -> Vec<u8> {
        unsafe {
            let ptr = sys::sqlite3_column_blob(self.stmt, idx);
            let len = sys::sqlite3_column_bytes(self.stmt, idx);
            if ptr.is_null() || len <= 0 {
                return Vec::new();
            }
            std::slice::from_raw_parts(ptr.cast::<u8>(), usize::try_from(len).unwrap_or(0))
                .to_vec()
        }
    }

    /// Reads a column as text. Returns an empty string for NULL.
    pub fn column_text(&self, idx: c_int) -> String {
        unsafe {
            let ptr = sys::sqlite3_column_text(self.stmt, idx);
            let len = sys::sqlite3_column_bytes(self.stmt, idx);
            if ptr.is_null() || len <= 0 {
                return String::new();
            }
            let bytes =
                std::slice::from_raw_parts(ptr.cast::<u8>(), usize::try_from(len).unwrap_or(0));
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

impl Drop for RawStmt {
    fn drop(&mut self) {
        if !self.stmt.is_null() {
            unsafe {
                sys::sqlite3_finalize(self.stmt);
            }
            self.stmt = ptr::null_mut();
        }
    }
}
