//! Download accounting: local counters validated against the remote catalog.
//!
//! Writes tolerate a stale catalog; single-name reads do not.
use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{error, info, instrument, warn};

use crate::catalog::RemoteCatalogCache;
use crate::db::{self, Pool};
use crate::error::{ModerationError, Result};

/// How a recorded download was validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    Fresh,
    /// The catalog refresh failed and an older snapshot was used.
    StaleCatalog,
}

pub struct DownloadAccounting {
    pool: Pool,
    catalog: Arc<RemoteCatalogCache>,
}

impl DownloadAccounting {
    pub fn new(pool: Pool, catalog: Arc<RemoteCatalogCache>) -> Self {
        Self { pool, catalog }
    }

    #[instrument(skip_all, fields(name = %name))]
    pub async fn record_download(&self, name: &str, ip_address: &str) -> Result<Recorded> {
        let read = self.catalog.get_tolerant().await.map_err(|err| {
            error!(%err, "failed to fetch clickpack index during record_download");
            ModerationError::from(err)
        })?;
        let outcome = match &read.stale {
            Some(err) => {
                warn!(%err, "using cached index");
                Recorded::StaleCatalog
            }
            None => Recorded::Fresh,
        };

        if !read.catalog.contains(name) {
            warn!("attempted to download non-existent clickpack");
            return Err(ModerationError::UnknownCatalogEntry(name.to_string()));
        }

        db::insert_download(&self.pool, name, ip_address)
            .await
            .map_err(|err| {
                error!(?err, "failed to insert download record");
                err
            })?;
        info!("download recorded");
        Ok(outcome)
    }

    #[instrument(skip_all, fields(name = %name))]
    pub async fn count_for(&self, name: &str, since: Option<NaiveDate>) -> Result<i64> {
        let catalog = self.catalog.get().await.map_err(|err| {
            error!(%err, "failed to fetch clickpack index during count_for");
            ModerationError::from(err)
        })?;
        if !catalog.contains(name) {
            warn!("attempted to query non-existent clickpack");
            return Err(ModerationError::UnknownCatalogEntry(name.to_string()));
        }
        Ok(db::count_downloads(&self.pool, name, since).await?)
    }

    /// Counts for every name with at least one download. No catalog check:
    /// names without rows cannot appear.
    pub async fn counts_all(&self, since: Option<NaiveDate>) -> Result<BTreeMap<String, i64>> {
        Ok(db::count_all_downloads(&self.pool, since).await?)
    }
}
