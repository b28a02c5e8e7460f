//! Partitioned file driver.
//!
//! Two physical operations exist on a partition file:
//!
//! - **append** - inserts open the file in append mode and write one
//!   serialized entry.
//! - **rewrite** - renames and deletes stream the file line by line into
//!   a sibling temporary, transforming or dropping the target line, then
//!   rename the temporary over the original. Readers see either the old
//!   or the fully-rewritten content, never a half-written file.
//!
//! The caller (the space's task queue) guarantees no two operations on
//! the same space overlap; nothing here locks.

use crate::error::Result;
use std::path::Path;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};

/// Appends one serialized entry to a partition file.
pub async fn append(path: &Path, entry: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .await?;
    file.write_all(entry.as_bytes()).await?;
    Ok(())
}

/// Creates an empty partition file.
pub async fn create(path: &Path) -> Result<()> {
    fs::write(path, b"").await?;
    Ok(())
}

/// Rewrites a partition file through a temporary.
///
/// `transform` sees each line without its terminator and returns the
/// fully serialized replacement (terminator included), or `None` to drop
/// the line. The temporary is synced and renamed over the original, so a
/// failure mid-rewrite leaves the original untouched.
pub async fn rewrite<F>(path: &Path, temp_path: &Path, mut transform: F) -> Result<()>
where
    F: FnMut(&str) -> Option<String>,
{
    let source = File::open(path).await?;
    let mut lines = BufReader::new(source).lines();
    let mut temp = BufWriter::new(File::create(temp_path).await?);

    while let Some(line) = lines.next_line().await? {
        if let Some(replacement) = transform(&line) {
            temp.write_all(replacement.as_bytes()).await?;
        }
    }

    temp.flush().await?;
    temp.into_inner().sync_all().await?;
    fs::rename(temp_path, path).await?;
    Ok(())
}
