//! # Cache-aside store
//!
//! Typed snapshot cache keyed by `(entity kind, id)`. Each backing service owns
//! one cache per entity type and follows the same protocol:
//!
//! - lookup by id: [`read_through`] (hit returns the snapshot, miss loads from
//!   the system-of-record and populates the cache with the configured TTL)
//! - create/update/delete: mutate the system-of-record first, then
//!   [`SnapshotCache::invalidate`]; entries are never updated in place
//! - listings and tracking-number lookups bypass the cache

mod memory;
mod redis;

pub use memory::MemorySnapshotCache;
pub use redis::RedisSnapshotCache;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::clock::SharedClock;
use crate::config::{CacheBackend, CacheConfig};

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache connection failed: {0}")]
    Connect(#[from] cached::stores::RedisCacheBuildError),

    #[error("cache operation failed: {0}")]
    Redis(#[from] cached::RedisCacheError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    User,
    Order,
    Delivery,
}

impl EntityKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Order => "order",
            EntityKind::Delivery => "delivery",
        }
    }
}

/// Deterministic cache key, rendered as `<kind>:<id>` (e.g. `delivery:42`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: EntityKind,
    pub id: i64,
}

impl CacheKey {
    pub fn user(id: i64) -> Self {
        Self { kind: EntityKind::User, id }
    }

    pub fn order(id: i64) -> Self {
        Self { kind: EntityKind::Order, id }
    }

    pub fn delivery(id: i64) -> Self {
        Self { kind: EntityKind::Delivery, id }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.prefix(), self.id)
    }
}

/// Snapshot store with a fixed per-store TTL
#[async_trait]
pub trait SnapshotCache<T>: Send + Sync + fmt::Debug {
    async fn read(&self, key: &CacheKey) -> Result<Option<T>, CacheError>;

    /// Store `value` for the configured TTL
    async fn write(&self, key: CacheKey, value: T) -> Result<(), CacheError>;

    async fn invalidate(&self, key: &CacheKey) -> Result<(), CacheError>;
}

pub type SharedCache<T> = Arc<dyn SnapshotCache<T>>;

/// Cache-aside lookup.
///
/// A failing cache read degrades to a system-of-record read; a failing
/// populate is logged and the fresh value is still returned.
pub async fn read_through<C, T, F, Fut, E>(
    cache: &C,
    key: CacheKey,
    load: F,
) -> Result<Option<T>, E>
where
    C: SnapshotCache<T> + ?Sized,
    T: Clone,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    match cache.read(&key).await {
        Ok(Some(value)) => {
            debug!(key = %key, "Cache hit");
            return Ok(Some(value));
        }
        Ok(None) => debug!(key = %key, "Cache miss"),
        Err(e) => warn!(key = %key, error = %e, "Cache read failed, reading system-of-record"),
    }

    let fresh = load().await?;
    if let Some(value) = &fresh {
        if let Err(e) = cache.write(key, value.clone()).await {
            warn!(key = %key, error = %e, "Cache populate failed");
        }
    }
    Ok(fresh)
}

/// Build the configured backend. Connection failure is fatal to the caller.
pub async fn connect<T>(config: &CacheConfig, clock: SharedClock) -> Result<SharedCache<T>, CacheError>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    let ttl = Duration::from_secs(config.ttl_secs);
    match config.backend {
        CacheBackend::Redis => {
            let cache = RedisSnapshotCache::connect(&config.url, config.ttl_secs).await?;
            info!(ttl_secs = config.ttl_secs, "Redis cache connected");
            Ok(Arc::new(cache))
        }
        CacheBackend::Memory => {
            info!(ttl_secs = config.ttl_secs, max_entries = config.max_entries, "In-process cache enabled");
            Ok(Arc::new(MemorySnapshotCache::new(config.max_entries, ttl, clock)))
        }
    }
}
