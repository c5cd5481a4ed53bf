use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use clickpack_bot::catalog::{HttpCatalogSource, RemoteCatalogCache};
use clickpack_bot::config;
use clickpack_bot::db;
use clickpack_bot::downloads::{DownloadAccounting, Recorded};

#[derive(Debug, Parser)]
#[command(author, version, about = "Record and query clickpack download counts")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Record one download of a catalog entry
    Record { name: String, ip_address: String },
    /// Download count for one catalog entry
    Count {
        name: String,
        /// Only count downloads on or after this date (YYYY-MM-DD)
        #[arg(long)]
        since: Option<NaiveDate>,
    },
    /// Download counts for every entry that has any
    All {
        #[arg(long)]
        since: Option<NaiveDate>,
    },
    /// Most recent download rows
    Recent {
        #[arg(long, default_value = "20")]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;

    let catalog = Arc::new(RemoteCatalogCache::with_max_age(
        HttpCatalogSource::new(cfg.catalog.url.clone()),
        Duration::from_secs(cfg.catalog.max_age_secs),
    ));
    let accounting = DownloadAccounting::new(pool.clone(), catalog);

    match args.command {
        Command::Record { name, ip_address } => {
            match accounting.record_download(&name, &ip_address).await? {
                Recorded::Fresh => info!(%name, "recorded"),
                Recorded::StaleCatalog => info!(%name, "recorded against a stale index"),
            }
        }
        Command::Count { name, since } => {
            let count = accounting.count_for(&name, since).await?;
            println!("{}\t{}", name, count);
        }
        Command::All { since } => {
            for (name, count) in accounting.counts_all(since).await? {
                println!("{}\t{}", name, count);
            }
        }
        Command::Recent { limit } => {
            for row in db::recent_downloads(&pool, limit).await? {
                let at = row
                    .downloaded_at
                    .map(|t| t.to_string())
                    .unwrap_or_default();
                println!("{}\t{}\t{}\t{}", row.id, at, row.name, row.ip_address);
            }
        }
    }

    Ok(())
}
