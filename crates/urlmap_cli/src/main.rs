//! urlmap CLI
//!
//! Command-line tools for urlmap space management.
//!
//! # Commands
//!
//! - `register` - Register a new space
//! - `add` - Register a URL in a space
//! - `update` - Rename a URL or edit its metadata
//! - `remove` - Delete a URL
//! - `init-part` - Allocate the next partition explicitly
//! - `inspect` - Show space aggregates

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use urlmap_core::{Config, Manager};
use urlmap_storage::SqliteOpener;

/// urlmap command-line space management.
#[derive(Parser)]
#[command(name = "urlmap")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Storage root all spaces live under
    #[arg(global = true, short, long, default_value = "urlmap-data")]
    storage_root: PathBuf,

    /// Maximum entries per partition
    #[arg(global = true, long)]
    max_urls: Option<u64>,

    /// Maximum bytes per partition
    #[arg(global = true, long)]
    max_bytes: Option<u64>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new space
    Register {
        /// Space key (also the storage-directory name)
        key: String,

        /// Display/domain name
        domain_name: String,

        /// Canonical root URL
        root_url: String,

        /// Entry format (txt, xml)
        #[arg(short, long, default_value = "txt")]
        format: String,
    },

    /// Register a URL in a space
    Add {
        /// Space key
        key: String,

        /// The URL to register
        url: String,

        /// Last-modification timestamp
        #[arg(long)]
        lastmod: Option<String>,

        /// Change-frequency label
        #[arg(long)]
        change_freq: Option<String>,

        /// Priority
        #[arg(long, default_value_t = 0.0)]
        priority: f64,
    },

    /// Rename a URL or edit its metadata
    Update {
        /// Space key
        key: String,

        /// The URL to change
        url: String,

        /// Replacement URL
        #[arg(long)]
        new_url: Option<String>,

        /// Replacement last-modification timestamp
        #[arg(long)]
        lastmod: Option<String>,

        /// Replacement change-frequency label
        #[arg(long)]
        change_freq: Option<String>,

        /// Replacement priority
        #[arg(long)]
        priority: Option<f64>,
    },

    /// Delete a URL
    Remove {
        /// Space key
        key: String,

        /// The URL to delete
        url: String,
    },

    /// Allocate the next partition explicitly
    InitPart {
        /// Space key
        key: String,
    },

    /// Show space aggregates
    Inspect {
        /// Space key (all spaces when omitted)
        key: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let mut config = Config::new(&cli.storage_root);
    if let Some(value) = cli.max_urls {
        config = config.max_urls_per_part(value);
    }
    if let Some(value) = cli.max_bytes {
        config = config.max_part_bytes(value);
    }

    let manager = Manager::open(config, Box::new(SqliteOpener::new()))?;

    match cli.command {
        Commands::Register {
            key,
            domain_name,
            root_url,
            format,
        } => commands::register(&manager, &key, &domain_name, &root_url, &format).await?,
        Commands::Add {
            key,
            url,
            lastmod,
            change_freq,
            priority,
        } => commands::add(&manager, &key, &url, lastmod, change_freq, priority).await?,
        Commands::Update {
            key,
            url,
            new_url,
            lastmod,
            change_freq,
            priority,
        } => commands::update(&manager, &key, &url, new_url, lastmod, change_freq, priority).await?,
        Commands::Remove { key, url } => commands::remove(&manager, &key, &url).await?,
        Commands::InitPart { key } => commands::init_part(&manager, &key).await?,
        Commands::Inspect { key, format } => commands::inspect(&manager, key.as_deref(), &format)?,
    }

    Ok(())
}
