//! SQLite-backed store.

use crate::error::{StoreError, StoreResult};
use crate::store::{Store, StoreOpener};
use crate::value::{Row, Value};
use parking_lot::Mutex;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection, ToSql};
use std::path::Path;

/// A SQLite-backed index store.
///
/// One connection per store, guarded by a mutex; statements are prepared
/// through the connection's statement cache. Opening configures WAL
/// journaling and turns foreign-key enforcement on.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) a SQLite store at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Open`] if the file cannot be created or
    /// opened, or if the connection pragmas fail.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn =
            Connection::open(path).map_err(|e| StoreError::open(path, e.to_string()))?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON; PRAGMA synchronous=NORMAL;",
        )
        .map_err(|e| StoreError::open(path, e.to_string()))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens an in-memory store (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Open`] if the connection cannot be created.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::open(":memory:", e.to_string()))?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| StoreError::open(":memory:", e.to_string()))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl Store for SqliteStore {
    fn get(&self, sql: &str, params: &[Value]) -> StoreResult<Option<Row>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(sql).map_err(map_err)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| (*c).to_owned()).collect();
        let mut rows = stmt.query(params_from_iter(params.iter())).map_err(map_err)?;

        match rows.next().map_err(map_err)? {
            Some(row) => Ok(Some(read_row(&columns, row)?)),
            None => Ok(None),
        }
    }

    fn all(&self, sql: &str, params: &[Value]) -> StoreResult<Vec<Row>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(sql).map_err(map_err)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| (*c).to_owned()).collect();
        let mut rows = stmt.query(params_from_iter(params.iter())).map_err(map_err)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(map_err)? {
            out.push(read_row(&columns, row)?);
        }
        Ok(out)
    }

    fn run(&self, sql: &str, params: &[Value]) -> StoreResult<usize> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(sql).map_err(map_err)?;
        stmt.execute(params_from_iter(params.iter())).map_err(map_err)
    }
}

/// Opens [`SqliteStore`]s; the engine's default [`StoreOpener`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteOpener;

impl SqliteOpener {
    /// Creates a new opener.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl StoreOpener for SqliteOpener {
    fn open(&self, path: &Path) -> StoreResult<Box<dyn Store>> {
        Ok(Box::new(SqliteStore::open(path)?))
    }

    fn extension(&self) -> &'static str {
        "db"
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(rusqlite::types::Value::Null),
            Value::Integer(v) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(*v)),
            Value::Real(v) => ToSqlOutput::Owned(rusqlite::types::Value::Real(*v)),
            Value::Text(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
            Value::Blob(v) => ToSqlOutput::Borrowed(ValueRef::Blob(v)),
        })
    }
}

fn read_row(columns: &[String], row: &rusqlite::Row<'_>) -> StoreResult<Row> {
    let mut values = Vec::with_capacity(columns.len());
    for i in 0..columns.len() {
        values.push(read_value(row.get_ref(i).map_err(map_err)?));
    }
    Ok(Row::new(columns.to_vec(), values))
}

fn read_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Integer(v),
        ValueRef::Real(v) => Value::Real(v),
        ValueRef::Text(v) => Value::Text(String::from_utf8_lossy(v).into_owned()),
        ValueRef::Blob(v) => Value::Blob(v.to_vec()),
    }
}

fn map_err(err: rusqlite::Error) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::constraint(err.to_string())
        }
        _ => StoreError::query(err.to_string()),
    }
}
