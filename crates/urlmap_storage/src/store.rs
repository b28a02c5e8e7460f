//! Store trait definitions.

use crate::error::StoreResult;
use crate::value::{Row, Value};
use std::path::Path;

/// A relational index store.
///
/// Stores are **dumb statement executors**. They bind parameters, run one
/// statement, and hand rows back; all schema knowledge and sequencing
/// lives in the engine.
///
/// # Invariants
///
/// - Each call executes exactly one statement, atomically.
/// - `get` returns the first result row or `None`.
/// - `all` returns result rows in statement order.
/// - `run` returns the number of affected rows.
/// - Implementations must be `Send + Sync`; concurrent calls against
///   *different* rows must be safe without external locking.
pub trait Store: Send + Sync {
    /// Executes a query and returns the first row, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails to prepare or execute.
    fn get(&self, sql: &str, params: &[Value]) -> StoreResult<Option<Row>>;

    /// Executes a query and returns every row.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails to prepare or execute.
    fn all(&self, sql: &str, params: &[Value]) -> StoreResult<Vec<Row>>;

    /// Executes a statement and returns the affected-row count.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails, including
    /// [`StoreError::Constraint`](crate::StoreError::Constraint) when a
    /// schema constraint rejects the write.
    fn run(&self, sql: &str, params: &[Value]) -> StoreResult<usize>;
}

/// Opens or creates stores at filesystem paths.
///
/// The engine holds one opener and uses it for the global index store and
/// for every per-space store, so the whole tree stays on one store
/// implementation.
pub trait StoreOpener: Send + Sync {
    /// Opens the store at `path`, creating it if missing.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Open`](crate::StoreError::Open) if the store
    /// cannot be created or opened.
    fn open(&self, path: &Path) -> StoreResult<Box<dyn Store>>;

    /// File extension used by this store's files, without the dot.
    fn extension(&self) -> &'static str;
}
