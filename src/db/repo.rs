use super::model::DownloadRecord;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteSynchronous};
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::instrument;

pub type Pool = SqlitePool;

/// Open the pool. Journal mode and sync level are connection options, so every
/// pooled connection gets them.
pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url)?;
    let options = SqliteConnectOptions::from_str(&normalized)?
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Full);
    let pool = SqlitePool::connect_with(options).await?;
    Ok(pool)
}

/// Expand a leading `~/` in a file-backed SQLite URL, create its parent
/// directory and ask SQLite to create the file. In-memory and non-sqlite URLs
/// pass through unchanged.
fn prepare_sqlite_url(url: &str) -> Result<String> {
    let Some(rest) = url.strip_prefix("sqlite:") else {
        return Ok(url.to_string());
    };
    if rest.starts_with(":memory") {
        return Ok(url.to_string());
    }

    let rest = rest.strip_prefix("//").unwrap_or(rest);
    let (path_part, query_part) = match rest.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (rest, None),
    };
    if path_part.is_empty() {
        return Ok(url.to_string());
    }

    let expanded_path = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(tail), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), tail),
        _ => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create database directory {}", parent.display()))?;
        }
    }

    let query = match query_part {
        Some(q) if q.contains("mode=") => q.to_string(),
        Some(q) => format!("{}&mode=rwc", q),
        None => "mode=rwc".to_string(),
    };
    Ok(format!("sqlite://{}?{}", expanded_path, query))
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn insert_download(pool: &Pool, name: &str, ip_address: &str) -> sqlx::Result<i64> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO downloads (name, ip_address) VALUES (?, ?) RETURNING id",
    )
    .bind(name)
    .bind(ip_address)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

/// Downloads of `name`, optionally only those on or after `since` (UTC date).
#[instrument(skip_all)]
pub async fn count_downloads(pool: &Pool, name: &str, since: Option<NaiveDate>) -> sqlx::Result<i64> {
    let count = match since {
        Some(date) => {
            sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM downloads WHERE name = ? AND date(downloaded_at) >= date(?)",
            )
            .bind(name)
            .bind(date)
            .fetch_one(pool)
            .await?
        }
        None => {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM downloads WHERE name = ?")
                .bind(name)
                .fetch_one(pool)
                .await?
        }
    };
    Ok(count)
}

#[instrument(skip_all)]
pub async fn count_all_downloads(
    pool: &Pool,
    since: Option<NaiveDate>,
) -> sqlx::Result<BTreeMap<String, i64>> {
    let rows: Vec<(String, i64)> = match since {
        Some(date) => {
            sqlx::query_as(
                "SELECT name, COUNT(*) AS count FROM downloads WHERE date(downloaded_at) >= date(?) GROUP BY name",
            )
            .bind(date)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as("SELECT name, COUNT(*) AS count FROM downloads GROUP BY name")
                .fetch_all(pool)
                .await?
        }
    };
    Ok(rows.into_iter().collect())
}

/// Most recent download rows, newest first.
#[instrument(skip_all)]
pub async fn recent_downloads(pool: &Pool, limit: i64) -> sqlx::Result<Vec<DownloadRecord>> {
    sqlx::query_as::<_, DownloadRecord>(
        "SELECT id, name, ip_address, downloaded_at FROM downloads ORDER BY id DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}
