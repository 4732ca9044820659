//! SyncCache — time-bounded cache of the pair-discovery result.
//!
//! Two implementations exist: [`LocalSyncCache`] for long-lived daemon
//! processes, and the durable form on [`crate::store::RedbStateStore`] for
//! short-lived shells where an in-process cache would never survive long
//! enough to be useful.

use std::sync::Mutex;
use std::time::SystemTime;

use async_trait::async_trait;

use crate::error::StateResult;
use crate::types::PairMap;

/// Time-bounded cache for discovery results.
///
/// `get_sync` returns the cached map while `now` is at or before the stored
/// expiry, `None` otherwise. `store_sync` replaces the cached value
/// wholesale; passing `None` clears the cache.
#[async_trait]
pub trait SyncCache: Send + Sync {
    async fn get_sync(&self, now: SystemTime) -> StateResult<Option<PairMap>>;

    async fn store_sync(
        &self,
        entries: Option<PairMap>,
        expire_at: SystemTime,
    ) -> StateResult<()>;
}

struct CacheSlot {
    entries: PairMap,
    expire_at: SystemTime,
}

/// In-process cache guarded by a mutex.
///
/// The map is cloned on get and owned on store, so callers never alias the
/// cached value.
#[derive(Default)]
pub struct LocalSyncCache {
    slot: Mutex<Option<CacheSlot>>,
}

impl LocalSyncCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<CacheSlot>> {
        // A poisoned lock only means a panic elsewhere; the slot itself is
        // still a coherent value.
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl SyncCache for LocalSyncCache {
    async fn get_sync(&self, now: SystemTime) -> StateResult<Option<PairMap>> {
        let guard = self.lock();
        Ok(guard
            .as_ref()
            .filter(|slot| now <= slot.expire_at)
            .map(|slot| slot.entries.clone()))
    }

    async fn store_sync(
        &self,
        entries: Option<PairMap>,
        expire_at: SystemTime,
    ) -> StateResult<()> {
        let mut guard = self.lock();
        *guard = entries.map(|entries| CacheSlot { entries, expire_at });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn pairs() -> PairMap {
        PairMap::from([("arn:lb:tg/a".to_string(), "a.internal".to_string())])
    }

    #[tokio::test]
    async fn hit_until_expiry_then_miss() {
        let cache = LocalSyncCache::new();
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1000);
        let expire = now + Duration::from_secs(30);

        cache.store_sync(Some(pairs()), expire).await.unwrap();

        assert_eq!(cache.get_sync(now).await.unwrap(), Some(pairs()));
        // Exactly at the expiry is still a hit.
        assert_eq!(cache.get_sync(expire).await.unwrap(), Some(pairs()));
        assert_eq!(
            cache
                .get_sync(expire + Duration::from_secs(1))
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn empty_cache_misses() {
        let cache = LocalSyncCache::new();
        assert_eq!(cache.get_sync(SystemTime::now()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn storing_none_clears() {
        let cache = LocalSyncCache::new();
        let now = SystemTime::now();

        cache
            .store_sync(Some(pairs()), now + Duration::from_secs(60))
            .await
            .unwrap();
        cache
            .store_sync(None, now + Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(cache.get_sync(now).await.unwrap(), None);
    }

    #[tokio::test]
    async fn get_returns_a_copy() {
        let cache = LocalSyncCache::new();
        let now = SystemTime::now();
        cache
            .store_sync(Some(pairs()), now + Duration::from_secs(60))
            .await
            .unwrap();

        let mut first = cache.get_sync(now).await.unwrap().unwrap();
        first.insert("arn:lb:tg/b".to_string(), "b.internal".to_string());

        // Mutating the returned map must not affect the cached value.
        assert_eq!(cache.get_sync(now).await.unwrap(), Some(pairs()));
    }
}
