//! # urlmap core
//!
//! Partitioned sitemap engine.
//!
//! urlmap maintains size- and count-bounded listings of URLs for a
//! collection of websites ("spaces"), backed by a relational index and
//! flat partition files, and regenerates a summary index whenever a
//! space spans more than one partition.
//!
//! This crate is the partition-and-consistency engine:
//!
//! - **placement** - a new entry goes to the lowest-numbered partition
//!   with spare capacity, or to a freshly allocated one;
//! - **consistency** - the global index, the per-space index, and the
//!   on-disk file content are kept in step across insert, rename, and
//!   delete;
//! - **serialization** - all mutations to one space run on its own FIFO
//!   [`TaskQueue`], so appends and rewrite-in-place operations never
//!   interleave;
//! - **summary index** - regenerated on every partition-count change
//!   past one.
//!
//! The relational store behind the indexes is injected through the
//! traits in [`urlmap_storage`]; the engine never names a concrete
//! database.
//!
//! ## Example
//!
//! ```rust,ignore
//! use urlmap_core::{Config, Manager, MapFormat, UrlAttrs};
//! use urlmap_storage::SqliteOpener;
//!
//! let manager = Manager::open(Config::new("/data/maps"), Box::new(SqliteOpener::new()))?;
//! let space = manager
//!     .register_space("example-com", "example.com", "https://example.com", MapFormat::Text)
//!     .await?;
//!
//! space.register_url("https://example.com/a", UrlAttrs::default()).await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod clock;
mod config;
mod dir;
mod error;
mod format;
mod manager;
pub mod partfile;
mod queue;
mod space;

pub use config::{Config, Limits};
pub use dir::SpaceDir;
pub use error::{Error, Result};
pub use format::{MapFormat, PartRef};
pub use manager::Manager;
pub use queue::TaskQueue;
pub use space::{Space, SpaceStats, UrlAttrs, UrlEntry, UrlUpdate};
