//! Immulog CLI
//!
//! Drives a log store backed by the in-memory verified engine. Engine state
//! is loaded from and written back to a JSON snapshot file, so consecutive
//! invocations see the same logs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use immulog::{AddLogRequest, AddLogsRequest, AppConfig, LogStore, MemoryEngine};

#[derive(Parser)]
#[command(name = "immulog")]
#[command(about = "Append-only, tag-indexed log store with tamper-evident digests")]
struct Cli {
    /// TOML configuration file; environment variables are used otherwise
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the log tables
    Init,
    /// Store one log
    Add {
        content: String,

        #[arg(short, long = "tag")]
        tags: Vec<String>,
    },
    /// Store several logs sharing the same tags
    Batch {
        #[arg(required = true)]
        contents: Vec<String>,

        #[arg(short, long = "tag")]
        tags: Vec<String>,
    },
    /// Print the newest logs as JSON
    List {
        /// Maximum number of logs; 0 or less scans everything
        #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
        limit: i64,

        /// Check each log against its stored digest
        #[arg(long)]
        verify: bool,

        #[arg(short, long = "tag")]
        tags: Vec<String>,
    },
    /// Print the number of stored logs
    Count,
    /// Check content against the digest stored for an identifier
    Verify { identifier: String, content: String },
    /// Check a hex SHA-256 against the digest stored for an identifier
    VerifySha { identifier: String, sha: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "immulog=debug"
    } else {
        "immulog=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::load()?,
    };
    info!("Configuration loaded (engine {})", config.engine.url());

    let snapshot = PathBuf::from(&config.snapshot_path);
    let engine = MemoryEngine::load_snapshot(
        &snapshot,
        &config.engine.username,
        &config.engine.password,
    )
    .await?
    .with_max_rows_per_transaction(config.limits.max_rows_per_transaction);

    let store = LogStore::new(Arc::new(engine), &config.engine, config.limits.clone());
    store.create_tables().await?;

    let mutated = run(&store, cli.command).await?;
    if mutated {
        save(&store, &snapshot).await?;
    }
    store.release().await?;
    Ok(())
}

/// Runs one command and reports whether engine state changed.
async fn run(store: &LogStore<MemoryEngine>, command: Commands) -> Result<bool> {
    match command {
        Commands::Init => {
            println!("{}", json!({ "initialized": true }));
            Ok(true)
        }
        Commands::Add { content, tags } => {
            let request = AddLogRequest {
                log_content: content,
                tags,
                wait_for_identifier: true,
            };
            let identifier = store.process_log_request(&request).await?;
            println!("{}", json!({ "identifier": identifier }));
            Ok(true)
        }
        Commands::Batch { contents, tags } => {
            let mut request = AddLogsRequest::new(&contents[..], &[]);
            request.tags = tags;
            let identifiers = store.process_logs_request(&request).await?;
            println!("{}", json!({ "identifiers": identifiers }));
            Ok(true)
        }
        Commands::List {
            limit,
            verify,
            tags,
        } => {
            let logs = store.get_last_logs(limit, verify, &tags).await?;
            println!("{}", serde_json::to_string_pretty(&logs)?);
            Ok(false)
        }
        Commands::Count => {
            println!("{}", json!({ "count": store.get_log_count().await? }));
            Ok(false)
        }
        Commands::Verify {
            identifier,
            content,
        } => {
            let verified = store.verify_log_content(&content, &identifier).await;
            println!("{}", json!({ "verified": verified }));
            Ok(false)
        }
        Commands::VerifySha { identifier, sha } => {
            let verified = store.verify_log_by_sha(&sha, &identifier).await;
            println!("{}", json!({ "verified": verified }));
            Ok(false)
        }
    }
}

async fn save(store: &LogStore<MemoryEngine>, snapshot: &Path) -> Result<()> {
    store.engine().save_snapshot(snapshot).await?;
    info!("Snapshot written to {:?}", snapshot);
    Ok(())
}
