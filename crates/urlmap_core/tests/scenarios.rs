//! End-to-end engine scenarios.

use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;
use urlmap_core::{Config, Error, Manager, MapFormat, Space, UrlAttrs, UrlUpdate};
use urlmap_storage::{
    Row, SqliteStore, Store, StoreError, StoreOpener, StoreResult, Value,
};

const KEY: &str = "example-com";
const ROOT_URL: &str = "https://example.com";

/// Shared off-switch for [`ChaosStore`]: when set, any `run` whose SQL
/// contains the pattern fails before reaching the real store.
#[derive(Clone, Default)]
struct FailSwitch(Arc<Mutex<Option<&'static str>>>);

impl FailSwitch {
    fn arm(&self, pattern: &'static str) {
        *self.0.lock().unwrap() = Some(pattern);
    }

    fn disarm(&self) {
        *self.0.lock().unwrap() = None;
    }
}

struct ChaosOpener {
    switch: FailSwitch,
}

impl StoreOpener for ChaosOpener {
    fn open(&self, path: &Path) -> StoreResult<Box<dyn Store>> {
        Ok(Box::new(ChaosStore {
            inner: SqliteStore::open(path)?,
            switch: self.switch.clone(),
        }))
    }

    fn extension(&self) -> &'static str {
        "db"
    }
}

struct ChaosStore {
    inner: SqliteStore,
    switch: FailSwitch,
}

impl Store for ChaosStore {
    fn get(&self, sql: &str, params: &[Value]) -> StoreResult<Option<Row>> {
        self.inner.get(sql, params)
    }

    fn all(&self, sql: &str, params: &[Value]) -> StoreResult<Vec<Row>> {
        self.inner.all(sql, params)
    }

    fn run(&self, sql: &str, params: &[Value]) -> StoreResult<usize> {
        if let Some(pattern) = *self.switch.0.lock().unwrap() {
            if sql.contains(pattern) {
                return Err(StoreError::query("injected failure"));
            }
        }
        self.inner.run(sql, params)
    }
}

fn manager_at(root: &Path, max_urls: u64, max_bytes: u64) -> Manager {
    Manager::open(
        Config::new(root)
            .max_urls_per_part(max_urls)
            .max_part_bytes(max_bytes),
        Box::new(urlmap_storage::SqliteOpener::new()),
    )
    .unwrap()
}

fn chaos_manager_at(root: &Path, max_urls: u64, max_bytes: u64) -> (Manager, FailSwitch) {
    let switch = FailSwitch::default();
    let manager = Manager::open(
        Config::new(root)
            .max_urls_per_part(max_urls)
            .max_part_bytes(max_bytes),
        Box::new(ChaosOpener {
            switch: switch.clone(),
        }),
    )
    .unwrap();
    (manager, switch)
}

async fn fresh_space(manager: &Manager) -> Space {
    manager
        .register_space(KEY, "example.com", ROOT_URL, MapFormat::Text)
        .await
        .unwrap()
}

fn space_index(root: &Path, key: &str) -> SqliteStore {
    SqliteStore::open(&root.join(key).join(format!("{key}.db"))).unwrap()
}

fn read_part(root: &Path, key: &str, number: u32) -> String {
    std::fs::read_to_string(root.join(key).join(format!("sitemap-{number}.txt"))).unwrap()
}

/// Checks the aggregate invariants: global row == sum of partition rows
/// == sum of live serialized entries == file bytes, and partition
/// numbers form a contiguous 1-based run within their bounds.
fn assert_consistent(manager: &Manager, root: &Path, key: &str) {
    let stats = manager.space_stats(key).unwrap();
    let index = space_index(root, key);
    let parts = index
        .all(
            "select number, urls_count, size from partitions order by number",
            &[],
        )
        .unwrap();
    let entries = index.all("select url from entries", &[]).unwrap();

    assert_eq!(stats.parts_count, parts.len() as u64);
    for (i, part) in parts.iter().enumerate() {
        assert_eq!(part.integer("number").unwrap(), i as i64 + 1, "gap in numbering");
    }

    let limits = manager.config().limits;
    let mut part_size_sum = 0u64;
    let mut part_count_sum = 0u64;
    for part in &parts {
        let urls_count = part.integer("urls_count").unwrap() as u64;
        let size = part.integer("size").unwrap() as u64;
        assert!(urls_count <= limits.max_urls_per_part, "entry bound exceeded");
        assert!(size <= limits.max_part_bytes, "byte bound exceeded");
        part_size_sum += size;
        part_count_sum += urls_count;

        let number = part.integer("number").unwrap() as u32;
        let content = read_part(root, key, number);
        assert_eq!(content.len() as u64, size, "file drifted from index");
        assert_eq!(content.lines().count() as u64, urls_count);
    }

    let entry_size_sum: u64 = entries
        .iter()
        .map(|row| stats.format.entry_len(row.text("url").unwrap()))
        .sum();

    assert_eq!(stats.urls_count, entries.len() as u64);
    assert_eq!(stats.urls_count, part_count_sum);
    assert_eq!(stats.size, part_size_sum);
    assert_eq!(stats.size, entry_size_sum);
}

// Scenario A: the fourth URL under a 3-entry limit opens partition 2 and
// produces the summary index.
#[tokio::test]
async fn fourth_url_opens_a_second_partition() {
    let temp = tempdir().unwrap();
    let manager = manager_at(temp.path(), 3, 1000);
    let space = fresh_space(&manager).await;

    for page in ["a", "b", "c"] {
        let entry = space
            .register_url(format!("{ROOT_URL}/{page}"), UrlAttrs::default())
            .await
            .unwrap();
        assert_eq!(entry.partition, 1);
    }

    // No summary index while a single partition exists.
    assert!(!temp.path().join(KEY).join("sitemap.txt").exists());

    let entry = space
        .register_url(format!("{ROOT_URL}/d"), UrlAttrs::default())
        .await
        .unwrap();
    assert_eq!(entry.partition, 2);

    let stats = manager.space_stats(KEY).unwrap();
    assert_eq!(stats.parts_count, 2);
    assert_eq!(stats.urls_count, 4);

    let summary =
        std::fs::read_to_string(temp.path().join(KEY).join("sitemap.txt")).unwrap();
    assert!(summary.contains(&format!("<loc>{ROOT_URL}/sitemap-1.txt</loc>")));
    assert!(summary.contains(&format!("<loc>{ROOT_URL}/sitemap-2.txt</loc>")));

    assert_eq!(read_part(temp.path(), KEY, 2), format!("{ROOT_URL}/d\n"));
    assert_consistent(&manager, temp.path(), KEY);
}

// Scenario B: renaming rewrites the file and shifts size by the exact
// serialized delta.
#[tokio::test]
async fn rename_rewrites_the_partition_file() {
    let temp = tempdir().unwrap();
    let manager = manager_at(temp.path(), 100, 10_000);
    let space = fresh_space(&manager).await;

    space
        .register_url(format!("{ROOT_URL}/a"), UrlAttrs::default())
        .await
        .unwrap();
    let before = manager.space_stats(KEY).unwrap();

    space
        .update_url(
            format!("{ROOT_URL}/a"),
            UrlUpdate {
                new_url: Some(format!("{ROOT_URL}/a-new")),
                ..UrlUpdate::default()
            },
        )
        .await
        .unwrap();

    let content = read_part(temp.path(), KEY, 1);
    assert!(!content.contains(&format!("{ROOT_URL}/a\n")));
    assert_eq!(content.matches(&format!("{ROOT_URL}/a-new\n")).count(), 1);

    let after = manager.space_stats(KEY).unwrap();
    assert_eq!(after.size, before.size + "-new".len() as u64);
    assert_eq!(after.urls_count, before.urls_count);
    assert_consistent(&manager, temp.path(), KEY);
}

// Scenario C: deleting drops exactly the target line and decrements the
// partition counters.
#[tokio::test]
async fn delete_drops_the_entry_line() {
    let temp = tempdir().unwrap();
    let manager = manager_at(temp.path(), 100, 10_000);
    let space = fresh_space(&manager).await;

    space
        .register_url(format!("{ROOT_URL}/a"), UrlAttrs::default())
        .await
        .unwrap();
    space
        .register_url(format!("{ROOT_URL}/b"), UrlAttrs::default())
        .await
        .unwrap();

    space.delete_url(format!("{ROOT_URL}/a")).await.unwrap();

    assert_eq!(read_part(temp.path(), KEY, 1), format!("{ROOT_URL}/b\n"));

    let index = space_index(temp.path(), KEY);
    let part = index
        .get("select urls_count from partitions where number = 1", &[])
        .unwrap()
        .unwrap();
    assert_eq!(part.integer("urls_count").unwrap(), 1);
    assert_consistent(&manager, temp.path(), KEY);
}

// Scenario D: loading under the wrong variant fails without mutating
// anything.
#[tokio::test]
async fn load_with_wrong_format_fails() {
    let temp = tempdir().unwrap();
    let manager = manager_at(temp.path(), 100, 10_000);
    let space = fresh_space(&manager).await;
    space
        .register_url(format!("{ROOT_URL}/a"), UrlAttrs::default())
        .await
        .unwrap();
    let before = manager.space_stats(KEY).unwrap();

    let err = manager.load_space(KEY, MapFormat::Xml).await.unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { .. }));

    let after = manager.space_stats(KEY).unwrap();
    assert_eq!(after.urls_count, before.urls_count);
    assert_eq!(after.size, before.size);
    assert_eq!(after.updated_at, before.updated_at);
}

#[tokio::test]
async fn load_round_trips_registered_state() {
    let temp = tempdir().unwrap();
    let root = temp.path().to_path_buf();

    {
        let manager = manager_at(&root, 100, 10_000);
        let space = fresh_space(&manager).await;
        space
            .register_url(format!("{ROOT_URL}/a"), UrlAttrs::default())
            .await
            .unwrap();
    }

    let manager = manager_at(&root, 100, 10_000);
    let space = manager.load_space(KEY, MapFormat::Text).await.unwrap();
    assert_eq!(space.root_url(), ROOT_URL);
    assert_eq!(space.domain_name(), "example.com");

    // The loaded handle keeps filling partition 1.
    let entry = space
        .register_url(format!("{ROOT_URL}/b"), UrlAttrs::default())
        .await
        .unwrap();
    assert_eq!(entry.partition, 1);
    assert_consistent(&manager, &root, KEY);
}

#[tokio::test]
async fn loading_an_unknown_space_fails() {
    let temp = tempdir().unwrap();
    let manager = manager_at(temp.path(), 100, 10_000);

    let err = manager
        .load_space("missing", MapFormat::Text)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SpaceNotFound { .. }));
}

// Concurrently submitted mutations land in submission order; the file
// equals the strictly sequential application of the same operations.
#[tokio::test]
async fn concurrent_submissions_serialize_in_order() {
    let temp = tempdir().unwrap();
    let manager = manager_at(temp.path(), 100, 10_000);
    let space = fresh_space(&manager).await;

    let (a, b, rename, c, del) = tokio::join!(
        space.register_url(format!("{ROOT_URL}/a"), UrlAttrs::default()),
        space.register_url(format!("{ROOT_URL}/b"), UrlAttrs::default()),
        space.update_url(
            format!("{ROOT_URL}/a"),
            UrlUpdate {
                new_url: Some(format!("{ROOT_URL}/a2")),
                ..UrlUpdate::default()
            },
        ),
        space.register_url(format!("{ROOT_URL}/c"), UrlAttrs::default()),
        space.delete_url(format!("{ROOT_URL}/b")),
    );
    a.unwrap();
    b.unwrap();
    rename.unwrap();
    c.unwrap();
    del.unwrap();

    assert_eq!(
        read_part(temp.path(), KEY, 1),
        format!("{ROOT_URL}/a2\n{ROOT_URL}/c\n")
    );
    assert_consistent(&manager, temp.path(), KEY);
}

#[tokio::test]
async fn deleted_capacity_is_reused_first_fit() {
    let temp = tempdir().unwrap();
    let manager = manager_at(temp.path(), 2, 10_000);
    let space = fresh_space(&manager).await;

    for page in ["a", "b", "c"] {
        space
            .register_url(format!("{ROOT_URL}/{page}"), UrlAttrs::default())
            .await
            .unwrap();
    }
    space.delete_url(format!("{ROOT_URL}/a")).await.unwrap();

    // Partition 1 has room again; the next insert goes there, not to 2.
    let entry = space
        .register_url(format!("{ROOT_URL}/d"), UrlAttrs::default())
        .await
        .unwrap();
    assert_eq!(entry.partition, 1);
    assert_consistent(&manager, temp.path(), KEY);
}

#[tokio::test]
async fn duplicate_url_is_rejected() {
    let temp = tempdir().unwrap();
    let manager = manager_at(temp.path(), 100, 10_000);
    let space = fresh_space(&manager).await;

    space
        .register_url(format!("{ROOT_URL}/a"), UrlAttrs::default())
        .await
        .unwrap();
    let err = space
        .register_url(format!("{ROOT_URL}/a"), UrlAttrs::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Store(StoreError::Constraint { .. })));

    // The failed insert never reached the file.
    assert_eq!(read_part(temp.path(), KEY, 1), format!("{ROOT_URL}/a\n"));
    assert_consistent(&manager, temp.path(), KEY);
}

#[tokio::test]
async fn oversized_entry_is_rejected_up_front() {
    let temp = tempdir().unwrap();
    let manager = manager_at(temp.path(), 100, 16);
    let space = fresh_space(&manager).await;

    let err = space
        .register_url(format!("{ROOT_URL}/far-too-long"), UrlAttrs::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::EntryTooLarge { .. }));

    let stats = manager.space_stats(KEY).unwrap();
    assert_eq!(stats.parts_count, 0);
    assert_eq!(stats.urls_count, 0);
}

#[tokio::test]
async fn deleting_an_unknown_url_fails_without_writes() {
    let temp = tempdir().unwrap();
    let manager = manager_at(temp.path(), 100, 10_000);
    let space = fresh_space(&manager).await;
    space
        .register_url(format!("{ROOT_URL}/a"), UrlAttrs::default())
        .await
        .unwrap();
    let before = manager.space_stats(KEY).unwrap();

    let err = space.delete_url(format!("{ROOT_URL}/ghost")).await.unwrap_err();
    assert!(matches!(err, Error::UrlNotFound { .. }));

    let after = manager.space_stats(KEY).unwrap();
    assert_eq!(after.urls_count, before.urls_count);
    assert_eq!(after.size, before.size);
    assert_consistent(&manager, temp.path(), KEY);
}

#[tokio::test]
async fn update_with_no_changes_performs_no_write() {
    let temp = tempdir().unwrap();
    let (manager, switch) = chaos_manager_at(temp.path(), 100, 10_000);
    let space = fresh_space(&manager).await;

    space
        .register_url(
            format!("{ROOT_URL}/a"),
            UrlAttrs {
                lastmod: Some("2024-01-01 00:00:00".into()),
                change_freq: Some("daily".into()),
                priority: 0.5,
            },
        )
        .await
        .unwrap();

    // Any write from here on would fail; a true no-op never issues one.
    switch.arm("update");
    let entry = space
        .update_url(
            format!("{ROOT_URL}/a"),
            UrlUpdate {
                new_url: Some(format!("{ROOT_URL}/a")),
                lastmod: Some("2024-01-01 00:00:00".into()),
                change_freq: Some("daily".into()),
                priority: Some(0.5),
            },
        )
        .await
        .unwrap();
    switch.disarm();

    assert_eq!(entry.url, format!("{ROOT_URL}/a"));
    assert_eq!(entry.priority, 0.5);
}

#[tokio::test]
async fn metadata_update_never_touches_the_file() {
    let temp = tempdir().unwrap();
    let manager = manager_at(temp.path(), 100, 10_000);
    let space = fresh_space(&manager).await;

    space
        .register_url(format!("{ROOT_URL}/a"), UrlAttrs::default())
        .await
        .unwrap();
    let before = read_part(temp.path(), KEY, 1);

    let entry = space
        .update_url(
            format!("{ROOT_URL}/a"),
            UrlUpdate {
                lastmod: Some("2024-06-01 12:00:00".into()),
                priority: Some(0.8),
                ..UrlUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(entry.lastmod.as_deref(), Some("2024-06-01 12:00:00"));
    assert_eq!(entry.priority, 0.8);

    assert_eq!(read_part(temp.path(), KEY, 1), before);

    let index = space_index(temp.path(), KEY);
    let row = index
        .get("select lastmod, priority from entries where url = ?1",
             &[Value::from(format!("{ROOT_URL}/a"))])
        .unwrap()
        .unwrap();
    assert_eq!(row.text("lastmod").unwrap(), "2024-06-01 12:00:00");
    assert_eq!(row.real("priority").unwrap(), 0.8);
    assert_consistent(&manager, temp.path(), KEY);
}

// The documented boundary condition: the stores commit independently, so
// a failure between the file rewrite and the index update leaves them
// divergent - visibly, and without corrupting later operations.
#[tokio::test]
async fn mid_sequence_failure_leaves_documented_divergence() {
    let temp = tempdir().unwrap();
    let (manager, switch) = chaos_manager_at(temp.path(), 100, 10_000);
    let space = fresh_space(&manager).await;

    space
        .register_url(format!("{ROOT_URL}/a"), UrlAttrs::default())
        .await
        .unwrap();
    space
        .register_url(format!("{ROOT_URL}/b"), UrlAttrs::default())
        .await
        .unwrap();

    switch.arm("delete from entries");
    let err = space.delete_url(format!("{ROOT_URL}/a")).await.unwrap_err();
    assert!(matches!(err, Error::Store(_)));
    switch.disarm();

    // The file was rewritten before the index delete failed: the entry
    // line is gone from disk but still present in both indexes.
    assert_eq!(read_part(temp.path(), KEY, 1), format!("{ROOT_URL}/b\n"));
    let index = space_index(temp.path(), KEY);
    let orphan = index
        .get(
            "select url from entries where url = ?1",
            &[Value::from(format!("{ROOT_URL}/a"))],
        )
        .unwrap();
    assert!(orphan.is_some());
    assert_eq!(manager.space_stats(KEY).unwrap().urls_count, 2);

    // The lane is not poisoned: the same delete succeeds on retry.
    space.delete_url(format!("{ROOT_URL}/a")).await.unwrap();
    assert_consistent(&manager, temp.path(), KEY);
}

#[tokio::test]
async fn explicit_init_part_allocates_and_regenerates() {
    let temp = tempdir().unwrap();
    let manager = manager_at(temp.path(), 100, 10_000);
    let space = fresh_space(&manager).await;

    assert_eq!(space.init_part().await.unwrap(), 1);
    assert_eq!(space.init_part().await.unwrap(), 2);

    let stats = manager.space_stats(KEY).unwrap();
    assert_eq!(stats.parts_count, 2);
    assert!(temp.path().join(KEY).join("sitemap-2.txt").exists());
    assert!(temp.path().join(KEY).join("sitemap.txt").exists());
}

#[tokio::test]
async fn xml_spaces_serialize_url_elements() {
    let temp = tempdir().unwrap();
    let manager = manager_at(temp.path(), 100, 10_000);
    let space = manager
        .register_space(KEY, "example.com", ROOT_URL, MapFormat::Xml)
        .await
        .unwrap();

    space
        .register_url(format!("{ROOT_URL}/a"), UrlAttrs::default())
        .await
        .unwrap();

    let content =
        std::fs::read_to_string(temp.path().join(KEY).join("sitemap-1.xml")).unwrap();
    assert_eq!(content, format!("<url><loc>{ROOT_URL}/a</loc></url>\n"));
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        // Any register/delete sequence under tiny limits keeps all three
        // aggregates equal and every partition within bounds.
        #[test]
        fn aggregates_survive_random_mutation_sequences(
            ops in proptest::collection::vec(0u8..3, 1..24)
        ) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();

            rt.block_on(async move {
                let temp = tempdir().unwrap();
                let manager = manager_at(temp.path(), 3, 120);
                let space = fresh_space(&manager).await;

                let mut live: Vec<String> = Vec::new();
                let mut counter = 0usize;
                for op in ops {
                    if op < 2 {
                        let url = format!("{ROOT_URL}/page-{counter}");
                        counter += 1;
                        space.register_url(&url, UrlAttrs::default()).await.unwrap();
                        live.push(url);
                    } else if let Some(url) = live.pop() {
                        space.delete_url(&url).await.unwrap();
                    }
                }

                let stats = manager.space_stats(KEY).unwrap();
                assert_eq!(stats.urls_count, live.len() as u64);
                let expected: u64 = live
                    .iter()
                    .map(|url| MapFormat::Text.entry_len(url))
                    .sum();
                assert_eq!(stats.size, expected);
                assert_consistent(&manager, temp.path(), KEY);
            });
        }
    }
}
