use async_trait::async_trait;
use cached::{CanExpire, Cached, ExpiringValueCache};
use parking_lot::Mutex;
use std::fmt;
use std::time::{Duration, Instant};

use super::{CacheError, CacheKey, SnapshotCache};
use crate::clock::SharedClock;

#[derive(Clone)]
struct Entry<T> {
    value: T,
    /// `None` when the TTL does not fit in an `Instant`: never expires
    expires_at: Option<Instant>,
    clock: SharedClock,
}

impl<T> CanExpire for Entry<T> {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| self.clock.now() >= at)
    }
}

/// In-process snapshot cache (dev and tests). Size-bounded; expired entries
/// are dropped on access.
pub struct MemorySnapshotCache<T> {
    store: Mutex<ExpiringValueCache<CacheKey, Entry<T>>>,
    ttl: Duration,
    clock: SharedClock,
}

impl<T> MemorySnapshotCache<T> {
    pub fn new(max_entries: usize, ttl: Duration, clock: SharedClock) -> Self {
        Self {
            store: Mutex::new(ExpiringValueCache::with_size(max_entries.max(1))),
            ttl,
            clock,
        }
    }

    pub fn len(&self) -> usize {
        self.store.lock().cache_size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> fmt::Debug for MemorySnapshotCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySnapshotCache")
            .field("entries", &self.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[async_trait]
impl<T> SnapshotCache<T> for MemorySnapshotCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn read(&self, key: &CacheKey) -> Result<Option<T>, CacheError> {
        let mut store = self.store.lock();
        Ok(store.cache_get(key).map(|entry| entry.value.clone()))
    }

    async fn write(&self, key: CacheKey, value: T) -> Result<(), CacheError> {
        let entry = Entry {
            value,
            expires_at: self.clock.now().checked_add(self.ttl),
            clock: self.clock.clone(),
        };
        self.store.lock().cache_set(key, entry);
        Ok(())
    }

    async fn invalidate(&self, key: &CacheKey) -> Result<(), CacheError> {
        self.store.lock().cache_remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_invalidate_then_read_is_miss() {
        let cache = MemorySnapshotCache::new(8, Duration::from_secs(300), Arc::new(ManualClock::new()));
        let key = CacheKey::delivery(42);

        cache.write(key, 1u32).await.unwrap();
        assert_eq!(cache.read(&key).await.unwrap(), Some(1));

        cache.invalidate(&key).await.unwrap();
        assert_eq!(cache.read(&key).await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_entries_expire_with_clock() {
        let clock = Arc::new(ManualClock::new());
        let cache = MemorySnapshotCache::new(8, Duration::from_secs(300), clock.clone());
        let key = CacheKey::user(3);

        cache.write(key, "snapshot").await.unwrap();
        clock.advance(Duration::from_secs(300));
        assert_eq!(cache.read(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unrepresentable_ttl_never_expires() {
        let clock = Arc::new(ManualClock::new());
        let cache = MemorySnapshotCache::new(8, Duration::MAX, clock.clone());
        let key = CacheKey::order(5);

        cache.write(key, 5u8).await.unwrap();
        clock.advance(Duration::from_secs(86_400 * 365));
        assert_eq!(cache.read(&key).await.unwrap(), Some(5));
    }

    #[tokio::test]
    async fn test_keys_do_not_collide_across_kinds() {
        let cache = MemorySnapshotCache::new(8, Duration::from_secs(300), Arc::new(ManualClock::new()));

        cache.write(CacheKey::user(1), "user").await.unwrap();
        cache.write(CacheKey::order(1), "order").await.unwrap();

        assert_eq!(cache.read(&CacheKey::user(1)).await.unwrap(), Some("user"));
        assert_eq!(cache.read(&CacheKey::order(1)).await.unwrap(), Some("order"));
    }
}
