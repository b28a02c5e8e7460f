//! Engine configuration.

use std::path::PathBuf;

/// Capacity bounds for a single partition.
///
/// A partition never holds more than `max_urls_per_part` entries and never
/// grows past `max_part_bytes`; an insert that would cross either bound
/// goes to another (possibly new) partition instead.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    /// Maximum number of entries per partition.
    pub max_urls_per_part: u64,
    /// Maximum serialized size of a partition file, in bytes.
    pub max_part_bytes: u64,
}

impl Default for Limits {
    fn default() -> Self {
        // The sitemap-protocol bounds: 50 000 URLs, 50 MB per file.
        Self {
            max_urls_per_part: 50_000,
            max_part_bytes: 50 * 1024 * 1024,
        }
    }
}

/// Configuration for opening a [`Manager`](crate::Manager).
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory all spaces live under.
    pub storage_root: PathBuf,
    /// Partition capacity bounds.
    pub limits: Limits,
}

impl Config {
    /// Creates a configuration with default limits.
    #[must_use]
    pub fn new(storage_root: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: storage_root.into(),
            limits: Limits::default(),
        }
    }

    /// Sets the per-partition entry limit.
    #[must_use]
    pub const fn max_urls_per_part(mut self, value: u64) -> Self {
        self.limits.max_urls_per_part = value;
        self
    }

    /// Sets the per-partition byte limit.
    #[must_use]
    pub const fn max_part_bytes(mut self, value: u64) -> Self {
        self.limits.max_part_bytes = value;
        self
    }
}
