use async_trait::async_trait;
use cached::{AsyncRedisCache, IOCachedAsync};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;

use super::{CacheError, CacheKey, SnapshotCache};

/// Redis-backed snapshot cache. Keys are stored bare (`user:1`) and expiry is
/// enforced by Redis.
pub struct RedisSnapshotCache<T> {
    store: AsyncRedisCache<CacheKey, T>,
    ttl_secs: u64,
}

impl<T> RedisSnapshotCache<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    pub async fn connect(url: &str, ttl_secs: u64) -> Result<Self, CacheError> {
        let store = AsyncRedisCache::new("", ttl_secs)
            .set_namespace("")
            .set_connection_string(url)
            .set_refresh(false)
            .build()
            .await?;
        Ok(Self { store, ttl_secs })
    }
}

impl<T> fmt::Debug for RedisSnapshotCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisSnapshotCache")
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<T> SnapshotCache<T> for RedisSnapshotCache<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    async fn read(&self, key: &CacheKey) -> Result<Option<T>, CacheError> {
        Ok(self.store.cache_get(key).await?)
    }

    async fn write(&self, key: CacheKey, value: T) -> Result<(), CacheError> {
        self.store.cache_set(key, value).await?;
        Ok(())
    }

    async fn invalidate(&self, key: &CacheKey) -> Result<(), CacheError> {
        self.store.cache_remove(key).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires a running Redis on localhost:6379
    async fn test_round_trip_against_redis() {
        let cache: RedisSnapshotCache<String> =
            RedisSnapshotCache::connect("redis://127.0.0.1:6379", 60).await.unwrap();
        let key = CacheKey::user(987_654);

        cache.write(key, "snapshot".to_string()).await.unwrap();
        assert_eq!(cache.read(&key).await.unwrap().as_deref(), Some("snapshot"));

        cache.invalidate(&key).await.unwrap();
        assert!(cache.read(&key).await.unwrap().is_none());
    }
}
