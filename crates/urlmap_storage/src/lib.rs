//! # urlmap storage
//!
//! Relational index-store interface for urlmap.
//!
//! This crate defines the seam between the partition engine and the
//! relational store that backs its bookkeeping. The engine never names a
//! concrete database - it talks to [`Store`] (parameterized `get` / `all` /
//! `run` calls) and obtains per-space stores through a [`StoreOpener`].
//!
//! ## Design Principles
//!
//! - Stores execute **one statement per call**, atomically. There are no
//!   cross-statement transactions at this layer.
//! - SQL text passes through verbatim; parameters are bound from [`Value`],
//!   result rows come back as column-addressed [`Row`]s.
//! - Implementations must be `Send + Sync` so a store handle can be shared
//!   across async tasks.
//!
//! ## Available Stores
//!
//! - [`SqliteStore`] - SQLite-backed persistent store (WAL journal,
//!   foreign keys enforced), plus an in-memory constructor for tests.
//!
//! ## Example
//!
//! ```rust
//! use urlmap_storage::{SqliteStore, Store, Value};
//!
//! let store = SqliteStore::open_in_memory().unwrap();
//! store.run("create table kv (k text primary key, v integer)", &[]).unwrap();
//! store
//!     .run(
//!         "insert into kv (k, v) values (?1, ?2)",
//!         &[Value::from("answer"), Value::from(42_i64)],
//!     )
//!     .unwrap();
//!
//! let row = store
//!     .get("select v from kv where k = ?1", &[Value::from("answer")])
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(row.integer("v").unwrap(), 42);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod sqlite;
mod store;
mod value;

pub use error::{StoreError, StoreResult};
pub use sqlite::{SqliteOpener, SqliteStore};
pub use store::{Store, StoreOpener};
pub use value::{Row, Value};
