//! Error types for the urlmap engine.

use crate::format::MapFormat;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use urlmap_storage::StoreError;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in urlmap engine operations.
#[derive(Debug, Error)]
pub enum Error {
    /// An index store could not be created or opened.
    #[error("cannot open index store at {path}: {source}")]
    StoreOpen {
        /// Path of the store that failed to open.
        path: PathBuf,
        /// The underlying store failure.
        source: StoreError,
    },

    /// An index store read or write did not complete.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A file read or write did not complete.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Another process holds the storage-root lock.
    #[error("storage root locked: another process has exclusive access to {path}")]
    Locked {
        /// The contested storage root.
        path: PathBuf,
    },

    /// A space was loaded with a different format than it was registered
    /// with.
    #[error("space {key} is stored as '{actual}', not '{expected}'")]
    TypeMismatch {
        /// The space being loaded.
        key: String,
        /// The format the caller asked for.
        expected: MapFormat,
        /// The format recorded in the global index.
        actual: String,
    },

    /// No space with the given key is registered.
    #[error("space not found: {key}")]
    SpaceNotFound {
        /// The key that was looked up.
        key: String,
    },

    /// No entry with the given URL exists in the space.
    #[error("url not found: {url}")]
    UrlNotFound {
        /// The URL that was looked up.
        url: String,
    },

    /// A serialized entry is larger than a whole partition may be.
    #[error("entry for {url} is {size} bytes, over the {limit}-byte partition limit")]
    EntryTooLarge {
        /// The offending URL.
        url: String,
        /// Its serialized byte length.
        size: u64,
        /// The configured partition byte limit.
        limit: u64,
    },

    /// A format label was not one of the known variants.
    #[error("unknown map format: {value}")]
    UnknownFormat {
        /// The unrecognized label.
        value: String,
    },

    /// The space's task queue is gone; no further mutations can run.
    #[error("task queue unavailable")]
    QueueClosed,

    /// Stored data violates an engine invariant.
    #[error("corrupt index: {message}")]
    Corrupt {
        /// Description of the violation.
        message: String,
    },
}

impl Error {
    /// Creates a corrupt-index error.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt {
            message: message.into(),
        }
    }
}
