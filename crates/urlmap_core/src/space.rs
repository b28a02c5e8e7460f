//! Space engine.
//!
//! A [`Space`] is one managed URL collection: its row in the global
//! index, a private per-space index store (`partitions` + `entries`
//! tables), a directory of capacity-bounded partition files, and a
//! summary index once more than one partition exists.
//!
//! All mutations go through the space's [`TaskQueue`], so appends and
//! rewrite-through-temporary operations on its files never interleave.
//! Every mutation touches up to three places - the partition file, the
//! per-space index, the global index - as separate steps with no
//! cross-store transaction. A failure between steps leaves them
//! divergent; that boundary is deliberate (the stores commit
//! independently) and is surfaced to the caller as the step's error, not
//! repaired.

use crate::clock;
use crate::dir::SpaceDir;
use crate::error::{Error, Result};
use crate::format::{MapFormat, PartRef};
use crate::manager::ManagerInner;
use crate::partfile;
use crate::queue::TaskQueue;
use std::sync::Arc;
use tracing::{debug, info};
use urlmap_storage::{Row, Store, Value};

const PARTITIONS_SCHEMA: &str = "\
create table partitions (
    number smallint primary key,
    urls_count smallint not null default 0,
    size bigint not null default 0,
    inserted_at datetime not null default (datetime('now')),
    updated_at datetime not null default (datetime('now'))
)";

const ENTRIES_SCHEMA: &str = "\
create table entries (
    url text not null primary key,
    lastmod datetime,
    change_freq varchar(30),
    priority double not null default 0.0,
    partition smallint,
    inserted_at datetime not null default (datetime('now')),
    updated_at datetime not null default (datetime('now')),
    constraint fk_entries_partitions foreign key (partition) references partitions(number)
)";

/// Optional metadata attached to a URL at registration.
#[derive(Debug, Clone, Default)]
pub struct UrlAttrs {
    /// Last-modification timestamp, caller-formatted.
    pub lastmod: Option<String>,
    /// Change-frequency label (`daily`, `weekly`, ...).
    pub change_freq: Option<String>,
    /// Priority, 0.0 when unset.
    pub priority: f64,
}

/// Requested changes to an existing entry.
///
/// Unset fields are left alone. A request whose every field matches the
/// stored entry performs no write at all.
#[derive(Debug, Clone, Default)]
pub struct UrlUpdate {
    /// Replacement URL. Renaming rewrites the owning partition's file;
    /// the entry stays in its partition.
    pub new_url: Option<String>,
    /// Replacement last-modification timestamp.
    pub lastmod: Option<String>,
    /// Replacement change-frequency label.
    pub change_freq: Option<String>,
    /// Replacement priority.
    pub priority: Option<f64>,
}

/// One stored entry, as returned by mutations.
#[derive(Debug, Clone, PartialEq)]
pub struct UrlEntry {
    /// The URL, unique within its space.
    pub url: String,
    /// Last-modification timestamp, if any.
    pub lastmod: Option<String>,
    /// Change-frequency label, if any.
    pub change_freq: Option<String>,
    /// Priority.
    pub priority: f64,
    /// Owning partition number.
    pub partition: u32,
    /// Serialized byte length of the entry in its partition file.
    pub size: u64,
}

/// Snapshot of a space's global-index row.
#[derive(Debug, Clone)]
pub struct SpaceStats {
    /// Space key.
    pub key: String,
    /// Display/domain name.
    pub domain_name: String,
    /// Canonical root URL.
    pub root_url: String,
    /// Stored format variant.
    pub format: MapFormat,
    /// Total live entries across all partitions.
    pub urls_count: u64,
    /// Number of partitions (equals the highest number in use).
    pub parts_count: u64,
    /// Total serialized size across all partitions, in bytes.
    pub size: u64,
    /// Registration timestamp.
    pub inserted_at: String,
    /// Last mutation timestamp.
    pub updated_at: String,
}

impl SpaceStats {
    pub(crate) fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            key: row.text("key")?.to_owned(),
            domain_name: row.text("domain_name")?.to_owned(),
            root_url: row.text("root_url")?.to_owned(),
            format: row.text("format_type")?.parse()?,
            urls_count: row.integer("urls_count")? as u64,
            parts_count: row.integer("parts_count")? as u64,
            size: row.integer("size")? as u64,
            inserted_at: row.text("inserted_at")?.to_owned(),
            updated_at: row.text("updated_at")?.to_owned(),
        })
    }
}

/// One managed URL collection.
///
/// Obtained from [`Manager::register_space`](crate::Manager::register_space)
/// or [`Manager::load_space`](crate::Manager::load_space). Cloning shares
/// the same task queue; keep one loaded handle per space, since the queue
/// is what serializes writers.
#[derive(Clone)]
pub struct Space {
    inner: Arc<SpaceInner>,
    queue: TaskQueue,
}

impl std::fmt::Debug for Space {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Space")
            .field("key", &self.inner.key)
            .field("domain_name", &self.inner.domain_name)
            .field("root_url", &self.inner.root_url)
            .field("format", &self.inner.format)
            .finish_non_exhaustive()
    }
}

struct SpaceInner {
    key: String,
    domain_name: String,
    root_url: String,
    format: MapFormat,
    dir: SpaceDir,
    index: Box<dyn Store>,
    manager: Arc<ManagerInner>,
}

impl Space {
    /// Registers a new space: global row, storage directory, private
    /// index store with its two tables.
    pub(crate) async fn register(
        manager: Arc<ManagerInner>,
        key: &str,
        domain_name: &str,
        root_url: &str,
        format: MapFormat,
    ) -> Result<Self> {
        let now = clock::now();
        manager.index.run(
            "insert into spaces (key, domain_name, root_url, format_type, inserted_at, updated_at) \
             values (?1, ?2, ?3, ?4, ?5, ?5)",
            &[
                Value::from(key),
                Value::from(domain_name),
                Value::from(root_url),
                Value::from(format.as_str()),
                Value::from(now),
            ],
        )?;

        let dir = SpaceDir::new(&manager.config.storage_root, key);
        tokio::fs::create_dir_all(dir.path()).await?;

        let store_path = dir.index_store_path(manager.opener.extension());
        let index = manager
            .opener
            .open(&store_path)
            .map_err(|source| Error::StoreOpen {
                path: store_path.clone(),
                source,
            })?;
        index.run(PARTITIONS_SCHEMA, &[])?;
        index.run(ENTRIES_SCHEMA, &[])?;

        info!(space = key, format = %format, "registered space");

        Ok(Self::assemble(
            manager,
            key.to_owned(),
            domain_name.to_owned(),
            root_url.to_owned(),
            format,
            dir,
            index,
        ))
    }

    /// Loads a registered space from its global row.
    pub(crate) async fn load(
        manager: Arc<ManagerInner>,
        key: &str,
        format: MapFormat,
    ) -> Result<Self> {
        let row = manager
            .index
            .get(
                "select key, domain_name, root_url, format_type from spaces where key = ?1",
                &[Value::from(key)],
            )?
            .ok_or_else(|| Error::SpaceNotFound {
                key: key.to_owned(),
            })?;

        let stored = row.text("format_type")?;
        if stored != format.as_str() {
            return Err(Error::TypeMismatch {
                key: key.to_owned(),
                expected: format,
                actual: stored.to_owned(),
            });
        }

        let dir = SpaceDir::new(&manager.config.storage_root, key);
        let store_path = dir.index_store_path(manager.opener.extension());
        let index = manager
            .opener
            .open(&store_path)
            .map_err(|source| Error::StoreOpen {
                path: store_path.clone(),
                source,
            })?;

        let domain_name = row.text("domain_name")?.to_owned();
        let root_url = row.text("root_url")?.to_owned();
        Ok(Self::assemble(
            manager,
            key.to_owned(),
            domain_name,
            root_url,
            format,
            dir,
            index,
        ))
    }

    fn assemble(
        manager: Arc<ManagerInner>,
        key: String,
        domain_name: String,
        root_url: String,
        format: MapFormat,
        dir: SpaceDir,
        index: Box<dyn Store>,
    ) -> Self {
        Self {
            inner: Arc::new(SpaceInner {
                key,
                domain_name,
                root_url,
                format,
                dir,
                index,
                manager,
            }),
            queue: TaskQueue::new(),
        }
    }

    /// The space key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// The display/domain name.
    #[must_use]
    pub fn domain_name(&self) -> &str {
        &self.inner.domain_name
    }

    /// The canonical root URL.
    #[must_use]
    pub fn root_url(&self) -> &str {
        &self.inner.root_url
    }

    /// The entry-format variant.
    #[must_use]
    pub fn format(&self) -> MapFormat {
        self.inner.format
    }

    /// Registers a URL: picks (or allocates) a partition with spare
    /// capacity, persists the entry row, bumps space and partition
    /// aggregates, and appends the serialized entry to the partition
    /// file.
    ///
    /// # Errors
    ///
    /// Fails if the index store rejects the insert (duplicate URL) or if
    /// the entry alone is larger than a whole partition may be. A
    /// failure leaves the partition file untouched.
    pub async fn register_url(&self, url: impl Into<String>, attrs: UrlAttrs) -> Result<UrlEntry> {
        let url = url.into();
        let inner = Arc::clone(&self.inner);
        self.queue
            .run(move || async move { inner.register_url(url, attrs).await })
            .await
    }

    /// Applies changes to an existing entry.
    ///
    /// A request that changes nothing performs no write. A URL change
    /// rewrites the owning partition's file (through a temporary) before
    /// the index row is updated; metadata-only changes never touch the
    /// file.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::UrlNotFound`] if no entry has `url`.
    pub async fn update_url(&self, url: impl Into<String>, update: UrlUpdate) -> Result<UrlEntry> {
        let url = url.into();
        let inner = Arc::clone(&self.inner);
        self.queue
            .run(move || async move { inner.update_url(url, update).await })
            .await
    }

    /// Deletes an entry: rewrites the owning partition's file with the
    /// entry omitted, removes the index row, and decrements the
    /// aggregates by the entry's serialized size.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::UrlNotFound`] if no entry has `url`.
    pub async fn delete_url(&self, url: impl Into<String>) -> Result<()> {
        let url = url.into();
        let inner = Arc::clone(&self.inner);
        self.queue
            .run(move || async move { inner.delete_url(url).await })
            .await
    }

    /// Allocates the next partition: number `max + 1`, an empty file, an
    /// index record, and a bumped `parts_count`. Regenerates the summary
    /// index once the space spans more than one partition.
    pub async fn init_part(&self) -> Result<u32> {
        let inner = Arc::clone(&self.inner);
        self.queue
            .run(move || async move { inner.allocate_part().await })
            .await
    }

    /// Reads the space's aggregate counters fresh from the global index.
    ///
    /// Unqueued: this is a point-in-time snapshot, not a mutation.
    pub fn stats(&self) -> Result<SpaceStats> {
        let row = self
            .inner
            .manager
            .index
            .get(
                "select * from spaces where key = ?1",
                &[Value::from(self.inner.key.as_str())],
            )?
            .ok_or_else(|| Error::SpaceNotFound {
                key: self.inner.key.clone(),
            })?;
        SpaceStats::from_row(&row)
    }
}

impl SpaceInner {
    async fn register_url(&self, url: String, attrs: UrlAttrs) -> Result<UrlEntry> {
        let line = self.format.entry_line(&url);
        let size = line.len() as u64;
        let limits = self.manager.config.limits;

        if size > limits.max_part_bytes {
            return Err(Error::EntryTooLarge {
                url,
                size,
                limit: limits.max_part_bytes,
            });
        }

        // First fit by number: fill earlier partitions before opening
        // new ones, keeping the partition count minimal.
        let part = match self.index.get(
            "select number from partitions \
             where urls_count < ?1 and size + ?2 <= ?3 \
             order by number limit 1",
            &[
                Value::from(limits.max_urls_per_part),
                Value::from(size),
                Value::from(limits.max_part_bytes),
            ],
        )? {
            Some(row) => row.integer("number")? as u32,
            None => self.allocate_part().await?,
        };

        let now = clock::now();
        self.index.run(
            "insert into entries (url, lastmod, change_freq, priority, partition, inserted_at, updated_at) \
             values (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            &[
                Value::from(url.as_str()),
                Value::from(attrs.lastmod.clone()),
                Value::from(attrs.change_freq.clone()),
                Value::from(attrs.priority),
                Value::from(part),
                Value::from(now.as_str()),
            ],
        )?;
        self.manager.index.run(
            "update spaces set size = size + ?1, urls_count = urls_count + 1, updated_at = ?2 \
             where key = ?3",
            &[
                Value::from(size),
                Value::from(now.as_str()),
                Value::from(self.key.as_str()),
            ],
        )?;
        self.index.run(
            "update partitions set size = size + ?1, urls_count = urls_count + 1, updated_at = ?2 \
             where number = ?3",
            &[Value::from(size), Value::from(now.as_str()), Value::from(part)],
        )?;

        partfile::append(&self.dir.part_path(self.format, part), &line).await?;

        debug!(space = %self.key, %url, partition = part, size, "registered url");

        Ok(UrlEntry {
            url,
            lastmod: attrs.lastmod,
            change_freq: attrs.change_freq,
            priority: attrs.priority,
            partition: part,
            size,
        })
    }

    async fn update_url(&self, url: String, update: UrlUpdate) -> Result<UrlEntry> {
        let current = self.fetch_entry(&url)?;

        // Keep only the fields that actually change.
        let new_url = update.new_url.filter(|u| *u != url);
        let lastmod = update
            .lastmod
            .filter(|v| current.lastmod.as_deref() != Some(v.as_str()));
        let change_freq = update
            .change_freq
            .filter(|v| current.change_freq.as_deref() != Some(v.as_str()));
        let priority = update.priority.filter(|p| *p != current.priority);

        if new_url.is_none() && lastmod.is_none() && change_freq.is_none() && priority.is_none() {
            return Ok(current);
        }

        let mut dsize: i64 = 0;
        if let Some(replacement) = &new_url {
            let old_line = self.format.entry_line(&url);
            let new_line = self.format.entry_line(replacement);
            dsize = new_line.len() as i64 - old_line.len() as i64;

            // The file rewrite happens before any index row changes.
            let old_body = old_line.trim_end_matches('\n').to_owned();
            partfile::rewrite(
                &self.dir.part_path(self.format, current.partition),
                &self.dir.part_temp_path(self.format, current.partition),
                |line| {
                    if line == old_body {
                        Some(new_line.clone())
                    } else {
                        Some(format!("{line}\n"))
                    }
                },
            )
            .await?;
        }

        fn set(sets: &mut Vec<String>, params: &mut Vec<Value>, column: &str, v: Value) {
            params.push(v);
            sets.push(format!("{column} = ?{}", params.len()));
        }

        let now = clock::now();
        let mut sets = Vec::new();
        let mut params: Vec<Value> = Vec::new();
        if let Some(v) = &new_url {
            set(&mut sets, &mut params, "url", Value::from(v.as_str()));
        }
        if let Some(v) = &lastmod {
            set(&mut sets, &mut params, "lastmod", Value::from(v.as_str()));
        }
        if let Some(v) = &change_freq {
            set(&mut sets, &mut params, "change_freq", Value::from(v.as_str()));
        }
        if let Some(v) = priority {
            set(&mut sets, &mut params, "priority", Value::from(v));
        }
        set(&mut sets, &mut params, "updated_at", Value::from(now.as_str()));
        params.push(Value::from(url.as_str()));
        let sql = format!(
            "update entries set {} where url = ?{}",
            sets.join(", "),
            params.len()
        );
        self.index.run(&sql, &params)?;

        if dsize != 0 {
            self.manager.index.run(
                "update spaces set size = size + ?1, updated_at = ?2 where key = ?3",
                &[
                    Value::from(dsize),
                    Value::from(now.as_str()),
                    Value::from(self.key.as_str()),
                ],
            )?;
            self.index.run(
                "update partitions set size = size + ?1, updated_at = ?2 where number = ?3",
                &[
                    Value::from(dsize),
                    Value::from(now.as_str()),
                    Value::from(current.partition),
                ],
            )?;
        }

        debug!(space = %self.key, %url, renamed = new_url.is_some(), "updated url");

        let url = new_url.unwrap_or(url);
        let size = self.format.entry_len(&url);
        Ok(UrlEntry {
            url,
            lastmod: lastmod.or(current.lastmod),
            change_freq: change_freq.or(current.change_freq),
            priority: priority.unwrap_or(current.priority),
            partition: current.partition,
            size,
        })
    }

    async fn delete_url(&self, url: String) -> Result<()> {
        let current = self.fetch_entry(&url)?;
        let line = self.format.entry_line(&url);
        let body = line.trim_end_matches('\n').to_owned();

        partfile::rewrite(
            &self.dir.part_path(self.format, current.partition),
            &self.dir.part_temp_path(self.format, current.partition),
            |candidate| {
                if candidate == body {
                    None
                } else {
                    Some(format!("{candidate}\n"))
                }
            },
        )
        .await?;

        let now = clock::now();
        self.index
            .run("delete from entries where url = ?1", &[Value::from(url.as_str())])?;
        self.manager.index.run(
            "update spaces set size = size - ?1, urls_count = urls_count - 1, updated_at = ?2 \
             where key = ?3",
            &[
                Value::from(current.size),
                Value::from(now.as_str()),
                Value::from(self.key.as_str()),
            ],
        )?;
        self.index.run(
            "update partitions set size = size - ?1, urls_count = urls_count - 1, updated_at = ?2 \
             where number = ?3",
            &[
                Value::from(current.size),
                Value::from(now.as_str()),
                Value::from(current.partition),
            ],
        )?;

        debug!(space = %self.key, %url, partition = current.partition, "deleted url");
        Ok(())
    }

    /// Allocates the next partition. Runs inline inside an already-queued
    /// task; re-enqueueing from here would deadlock the lane.
    async fn allocate_part(&self) -> Result<u32> {
        let row = self
            .index
            .get("select coalesce(max(number), 0) + 1 as next from partitions", &[])?
            .ok_or_else(|| Error::corrupt("partition scan returned no row"))?;
        let number = row.integer("next")? as u32;

        let now = clock::now();
        self.index.run(
            "insert into partitions (number, inserted_at, updated_at) values (?1, ?2, ?2)",
            &[Value::from(number), Value::from(now.as_str())],
        )?;
        partfile::create(&self.dir.part_path(self.format, number)).await?;
        self.manager.index.run(
            "update spaces set parts_count = parts_count + 1, updated_at = ?1 where key = ?2",
            &[Value::from(now.as_str()), Value::from(self.key.as_str())],
        )?;

        if number > 1 {
            self.generate_index().await?;
        }

        info!(space = %self.key, partition = number, "allocated partition");
        Ok(number)
    }

    /// Full overwrite of the summary index, one reference per partition,
    /// timestamps read fresh from the per-space store.
    async fn generate_index(&self) -> Result<()> {
        let rows = self
            .index
            .all("select number, updated_at from partitions order by number", &[])?;
        if rows.len() <= 1 {
            return Ok(());
        }

        let parts = rows
            .iter()
            .map(|row| {
                Ok(PartRef {
                    number: row.integer("number")? as u32,
                    updated_at: row.text("updated_at")?.to_owned(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let document = self.format.index_document(&self.root_url, &parts);
        tokio::fs::write(self.dir.index_path(self.format), document).await?;

        debug!(space = %self.key, parts = parts.len(), "regenerated summary index");
        Ok(())
    }

    fn fetch_entry(&self, url: &str) -> Result<UrlEntry> {
        let row = self
            .index
            .get(
                "select url, lastmod, change_freq, priority, partition from entries where url = ?1",
                &[Value::from(url)],
            )?
            .ok_or_else(|| Error::UrlNotFound {
                url: url.to_owned(),
            })?;

        Ok(UrlEntry {
            url: row.text("url")?.to_owned(),
            lastmod: row.opt_text("lastmod")?.map(str::to_owned),
            change_freq: row.opt_text("change_freq")?.map(str::to_owned),
            priority: row.real("priority")?,
            partition: row.integer("partition")? as u32,
            size: self.format.entry_len(url),
        })
    }
}
