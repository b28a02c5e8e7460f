//! Space directory layout.
//!
//! Each space owns one directory under the storage root:
//!
//! ```text
//! <storage_root>/
//! ├─ LOCK                  # Advisory lock held by the open manager
//! ├─ urlmap.<ext>          # Global index store
//! └─ <key>/
//!    ├─ <key>.<ext>        # Per-space index store
//!    ├─ sitemap-1.txt      # Partition files, 1-based
//!    ├─ sitemap-2.txt
//!    └─ sitemap.txt        # Summary index, once parts_count > 1
//! ```

use crate::format::MapFormat;
use std::path::{Path, PathBuf};

/// Path arithmetic for one space's directory.
#[derive(Debug, Clone)]
pub struct SpaceDir {
    key: String,
    path: PathBuf,
}

impl SpaceDir {
    /// Creates the layout for `key` under `storage_root`. Touches no
    /// files.
    #[must_use]
    pub fn new(storage_root: &Path, key: &str) -> Self {
        Self {
            key: key.to_owned(),
            path: storage_root.join(key),
        }
    }

    /// The space's directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the per-space index store, `<key>.<extension>`.
    #[must_use]
    pub fn index_store_path(&self, extension: &str) -> PathBuf {
        self.path.join(format!("{}.{extension}", self.key))
    }

    /// Path of partition `number`'s file.
    #[must_use]
    pub fn part_path(&self, format: MapFormat, number: u32) -> PathBuf {
        self.path.join(format.part_file_name(number))
    }

    /// Sibling temporary used while rewriting partition `number`.
    #[must_use]
    pub fn part_temp_path(&self, format: MapFormat, number: u32) -> PathBuf {
        self.path
            .join(format!("{}.tmp", format.part_file_name(number)))
    }

    /// Path of the summary index file.
    #[must_use]
    pub fn index_path(&self, format: MapFormat) -> PathBuf {
        self.path.join(format.index_file_name())
    }
}
