//! Remote clickpack catalog and its process-wide cache.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub const DEFAULT_CATALOG_URL: &str =
    "https://raw.githubusercontent.com/zeozeozeo/clickpack-db/main/db.json";
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    /// Required: a body without it must not replace a good snapshot.
    pub clickpacks: HashMap<String, CatalogEntry>,
    #[serde(default)]
    pub version: i64,
}

impl Catalog {
    pub fn contains(&self, name: &str) -> bool {
        self.clickpacks.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.clickpacks.is_empty()
    }
}

#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    #[error("failed to fetch clickpack index: {0}")]
    Fetch(String),
    #[error("failed to decode clickpack index: {0}")]
    Decode(String),
}

#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch(&self) -> Result<Catalog, CatalogError>;
}

pub struct HttpCatalogSource {
    http: Client,
    url: String,
}

impl HttpCatalogSource {
    pub fn new(url: impl Into<String>) -> Self {
        let http = Client::builder()
            .user_agent(concat!("clickpack-bot/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    async fn fetch(&self) -> Result<Catalog, CatalogError> {
        let res = self
            .http
            .get(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| CatalogError::Fetch(e.to_string()))?;
        let body = res
            .text()
            .await
            .map_err(|e| CatalogError::Fetch(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| CatalogError::Decode(e.to_string()))
    }
}

/// What to do with the cached snapshot at `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    UseCached,
    Refresh,
}

pub fn cache_policy(now: Instant, fetched_at: Option<Instant>, max_age: Duration) -> CachePolicy {
    match fetched_at {
        Some(at) if now.saturating_duration_since(at) < max_age => CachePolicy::UseCached,
        _ => CachePolicy::Refresh,
    }
}

/// A snapshot handed to callers. `stale` is set when the last refresh failed
/// and an older snapshot is being served instead.
#[derive(Debug, Clone)]
pub struct CatalogRead {
    pub catalog: Arc<Catalog>,
    pub stale: Option<CatalogError>,
}

/// Stale fallback after a failed refresh: keep serving the previous snapshot
/// unless there is nothing to serve.
pub fn stale_fallback(previous: &Arc<Catalog>, err: CatalogError) -> Result<CatalogRead, CatalogError> {
    if previous.is_empty() {
        return Err(err);
    }
    Ok(CatalogRead {
        catalog: previous.clone(),
        stale: Some(err),
    })
}

struct CacheState {
    snapshot: Arc<Catalog>,
    fetched_at: Option<Instant>,
}

/// Single most recent catalog snapshot. The lock is held across a refresh so
/// concurrent readers wait for one fetch instead of issuing their own.
pub struct RemoteCatalogCache {
    source: Box<dyn CatalogSource>,
    max_age: Duration,
    state: Mutex<CacheState>,
}

impl RemoteCatalogCache {
    pub fn new(source: impl CatalogSource + 'static) -> Self {
        Self::with_max_age(source, DEFAULT_MAX_AGE)
    }

    pub fn with_max_age(source: impl CatalogSource + 'static, max_age: Duration) -> Self {
        Self {
            source: Box::new(source),
            max_age,
            state: Mutex::new(CacheState {
                snapshot: Arc::new(Catalog::default()),
                fetched_at: None,
            }),
        }
    }

    /// Fresh snapshot, or the refresh error. Used by read paths that must not
    /// answer from stale data.
    pub async fn get(&self) -> Result<Arc<Catalog>, CatalogError> {
        let mut state = self.state.lock().await;
        self.refresh_if_needed(&mut state).await
    }

    /// Snapshot, falling back to the previous one when a refresh fails.
    pub async fn get_tolerant(&self) -> Result<CatalogRead, CatalogError> {
        let mut state = self.state.lock().await;
        match self.refresh_if_needed(&mut state).await {
            Ok(catalog) => Ok(CatalogRead {
                catalog,
                stale: None,
            }),
            Err(err) => stale_fallback(&state.snapshot, err),
        }
    }

    async fn refresh_if_needed(&self, state: &mut CacheState) -> Result<Arc<Catalog>, CatalogError> {
        if cache_policy(Instant::now(), state.fetched_at, self.max_age) == CachePolicy::UseCached {
            return Ok(state.snapshot.clone());
        }
        debug!("refreshing clickpack index");
        let catalog = self.source.fetch().await?;
        info!(
            entries = catalog.clickpacks.len(),
            version = catalog.version,
            "clickpack index refreshed"
        );
        state.snapshot = Arc::new(catalog);
        state.fetched_at = Some(Instant::now());
        Ok(state.snapshot.clone())
    }
}
