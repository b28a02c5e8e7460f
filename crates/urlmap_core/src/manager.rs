//! Global index management.
//!
//! The [`Manager`] is the explicit handle the whole engine hangs off:
//! it owns the storage root (and its advisory `LOCK`), the global index
//! store with the `spaces` table, and the [`StoreOpener`] used for every
//! per-space store. There is no process-wide singleton; anything that
//! needs the global index is given a manager (or a space obtained from
//! one), and dropping the manager releases the lock.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::format::MapFormat;
use crate::space::{Space, SpaceStats};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use urlmap_storage::{Store, StoreOpener};

const LOCK_FILE: &str = "LOCK";
const INDEX_STORE: &str = "urlmap";

const SPACES_SCHEMA: &str = "\
create table if not exists spaces (
    key varchar(255) not null primary key,
    domain_name varchar(255) not null,
    root_url text not null default '' unique,
    urls_count bigint not null default 0,
    parts_count bigint not null default 0,
    size bigint not null default 0,
    format_type varchar(3) check(format_type in ('txt', 'xml')) not null,
    inserted_at datetime not null default (datetime('now')),
    updated_at datetime not null default (datetime('now'))
)";

pub(crate) struct ManagerInner {
    pub(crate) config: Config,
    pub(crate) opener: Box<dyn StoreOpener>,
    pub(crate) index: Box<dyn Store>,
    /// Held for the manager's lifetime; released on drop.
    _lock: File,
}

/// Handle to an open storage root.
///
/// # Example
///
/// ```rust,ignore
/// use urlmap_core::{Config, Manager, MapFormat};
/// use urlmap_storage::SqliteOpener;
///
/// let manager = Manager::open(Config::new("/data/maps"), Box::new(SqliteOpener::new()))?;
/// let space = manager
///     .register_space("example-com", "example.com", "https://example.com", MapFormat::Text)
///     .await?;
/// ```
#[derive(Clone)]
pub struct Manager {
    inner: Arc<ManagerInner>,
}

impl Manager {
    /// Opens a storage root: creates the directory if missing, takes the
    /// advisory lock, opens the global index store, and creates the
    /// `spaces` table if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Locked`] if another manager holds the root, or
    /// [`Error::StoreOpen`] if the global index store cannot be opened.
    pub fn open(config: Config, opener: Box<dyn StoreOpener>) -> Result<Self> {
        std::fs::create_dir_all(&config.storage_root)?;

        let lock_path = config.storage_root.join(LOCK_FILE);
        let lock = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;
        if lock.try_lock_exclusive().is_err() {
            return Err(Error::Locked {
                path: config.storage_root.clone(),
            });
        }

        let index_path = self::index_store_path(&config, opener.as_ref());
        let index = opener.open(&index_path).map_err(|source| Error::StoreOpen {
            path: index_path,
            source,
        })?;
        index.run(SPACES_SCHEMA, &[])?;

        info!(root = %config.storage_root.display(), "opened storage root");

        Ok(Self {
            inner: Arc::new(ManagerInner {
                config,
                opener,
                index,
                _lock: lock,
            }),
        })
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Registers a new space and returns it ready for mutations.
    ///
    /// # Errors
    ///
    /// Fails if the key or root URL is already registered, or if the
    /// space's directory or private index store cannot be created.
    pub async fn register_space(
        &self,
        key: &str,
        domain_name: &str,
        root_url: &str,
        format: MapFormat,
    ) -> Result<Space> {
        Space::register(Arc::clone(&self.inner), key, domain_name, root_url, format).await
    }

    /// Loads a registered space.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::SpaceNotFound`] for an unknown key, or
    /// [`Error::TypeMismatch`] if the stored format variant is not
    /// `format`.
    pub async fn load_space(&self, key: &str, format: MapFormat) -> Result<Space> {
        Space::load(Arc::clone(&self.inner), key, format).await
    }

    /// Reads one space's aggregate row.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::SpaceNotFound`] for an unknown key.
    pub fn space_stats(&self, key: &str) -> Result<SpaceStats> {
        let row = self
            .inner
            .index
            .get(
                "select * from spaces where key = ?1",
                &[urlmap_storage::Value::from(key)],
            )?
            .ok_or_else(|| Error::SpaceNotFound {
                key: key.to_owned(),
            })?;
        SpaceStats::from_row(&row)
    }

    /// Lists every registered space's aggregate row, ordered by key.
    pub fn list_spaces(&self) -> Result<Vec<SpaceStats>> {
        self.inner
            .index
            .all("select * from spaces order by key", &[])?
            .iter()
            .map(SpaceStats::from_row)
            .collect()
    }
}

fn index_store_path(config: &Config, opener: &dyn StoreOpener) -> PathBuf {
    config
        .storage_root
        .join(format!("{INDEX_STORE}.{}", opener.extension()))
}
