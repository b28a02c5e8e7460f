//! Command implementations.

use tracing::info;
use urlmap_core::{Manager, Result, SpaceStats, UrlAttrs, UrlUpdate};

/// Registers a new space.
pub async fn register(
    manager: &Manager,
    key: &str,
    domain_name: &str,
    root_url: &str,
    format: &str,
) -> Result<()> {
    info!("Registering space {key} for {root_url}");
    let space = manager
        .register_space(key, domain_name, root_url, format.parse()?)
        .await?;
    println!("registered {} ({})", space.key(), space.format());
    Ok(())
}

/// Loads a space by key using its stored format variant.
async fn load(manager: &Manager, key: &str) -> Result<urlmap_core::Space> {
    let stats = manager.space_stats(key)?;
    manager.load_space(key, stats.format).await
}

/// Registers a URL.
pub async fn add(
    manager: &Manager,
    key: &str,
    url: &str,
    lastmod: Option<String>,
    change_freq: Option<String>,
    priority: f64,
) -> Result<()> {
    let space = load(manager, key).await?;
    let entry = space
        .register_url(
            url,
            UrlAttrs {
                lastmod,
                change_freq,
                priority,
            },
        )
        .await?;
    println!(
        "added {} to partition {} ({} bytes)",
        entry.url, entry.partition, entry.size
    );
    Ok(())
}

/// Renames a URL or edits its metadata.
#[allow(clippy::too_many_arguments)]
pub async fn update(
    manager: &Manager,
    key: &str,
    url: &str,
    new_url: Option<String>,
    lastmod: Option<String>,
    change_freq: Option<String>,
    priority: Option<f64>,
) -> Result<()> {
    let space = load(manager, key).await?;
    let entry = space
        .update_url(
            url,
            UrlUpdate {
                new_url,
                lastmod,
                change_freq,
                priority,
            },
        )
        .await?;
    println!("updated {} (partition {})", entry.url, entry.partition);
    Ok(())
}

/// Deletes a URL.
pub async fn remove(manager: &Manager, key: &str, url: &str) -> Result<()> {
    let space = load(manager, key).await?;
    space.delete_url(url).await?;
    println!("removed {url}");
    Ok(())
}

/// Allocates the next partition.
pub async fn init_part(manager: &Manager, key: &str) -> Result<()> {
    let space = load(manager, key).await?;
    let number = space.init_part().await?;
    println!("allocated partition {number}");
    Ok(())
}

/// Prints aggregates for one space or for all of them.
pub fn inspect(manager: &Manager, key: Option<&str>, format: &str) -> Result<()> {
    let spaces = match key {
        Some(key) => vec![manager.space_stats(key)?],
        None => manager.list_spaces()?,
    };

    if format == "json" {
        let docs: Vec<_> = spaces.iter().map(to_json).collect();
        println!("{}", serde_json::to_string_pretty(&docs).unwrap_or_default());
    } else {
        for stats in &spaces {
            print_text(stats);
        }
    }
    Ok(())
}

fn to_json(stats: &SpaceStats) -> serde_json::Value {
    serde_json::json!({
        "key": stats.key,
        "domain_name": stats.domain_name,
        "root_url": stats.root_url,
        "format": stats.format.as_str(),
        "urls_count": stats.urls_count,
        "parts_count": stats.parts_count,
        "size": stats.size,
        "inserted_at": stats.inserted_at,
        "updated_at": stats.updated_at,
    })
}

fn print_text(stats: &SpaceStats) {
    println!("{} ({})", stats.key, stats.domain_name);
    println!("  root url:    {}", stats.root_url);
    println!("  format:      {}", stats.format);
    println!("  urls:        {}", stats.urls_count);
    println!("  partitions:  {}", stats.parts_count);
    println!("  size:        {} bytes", stats.size);
    println!("  inserted at: {}", stats.inserted_at);
    println!("  updated at:  {}", stats.updated_at);
}
