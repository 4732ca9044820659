//! SyncFinder — enumerates the (target group, hostname) pairs to reconcile.
//!
//! A finder is a single-operation capability. The fixed variant serves a
//! statically configured pair; discovery-backed variants (e.g. the tag
//! finder in `tgsync-control`) can be wrapped in [`CachedSyncFinder`] to
//! bound how often discovery runs.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tracing::warn;

use crate::cache::SyncCache;
use crate::types::{PairMap, TargetGroupArn};

/// Produces the map of pairs a sync pass should reconcile.
#[async_trait]
pub trait SyncFinder: Send + Sync {
    async fn to_sync(&self) -> anyhow::Result<PairMap>;
}

/// Finder for a single statically configured pair.
pub struct FixedSyncFinder {
    tg: TargetGroupArn,
    hostname: String,
}

impl FixedSyncFinder {
    pub fn new(tg: impl Into<TargetGroupArn>, hostname: impl Into<String>) -> Self {
        Self {
            tg: tg.into(),
            hostname: hostname.into(),
        }
    }
}

#[async_trait]
impl SyncFinder for FixedSyncFinder {
    async fn to_sync(&self) -> anyhow::Result<PairMap> {
        Ok(PairMap::from([(self.tg.clone(), self.hostname.clone())]))
    }
}

/// Caching envelope around another finder.
///
/// Discovery results are served from the cache until they expire. A cache
/// write failure downgrades to a warning and the freshly discovered map is
/// still returned; a cache read failure counts as a miss.
pub struct CachedSyncFinder {
    inner: Arc<dyn SyncFinder>,
    cache: Arc<dyn SyncCache>,
    cache_for: Duration,
}

impl CachedSyncFinder {
    pub fn new(inner: Arc<dyn SyncFinder>, cache: Arc<dyn SyncCache>, cache_for: Duration) -> Self {
        Self {
            inner,
            cache,
            cache_for,
        }
    }
}

#[async_trait]
impl SyncFinder for CachedSyncFinder {
    async fn to_sync(&self) -> anyhow::Result<PairMap> {
        let now = SystemTime::now();
        match self.cache.get_sync(now).await {
            Ok(Some(cached)) => return Ok(cached),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "sync cache read failed, treating as miss"),
        }

        let fresh = self.inner.to_sync().await?;
        if let Err(e) = self
            .cache
            .store_sync(Some(fresh.clone()), now + self.cache_for)
            .await
        {
            warn!(error = %e, "unable to cache discovery result");
        }
        Ok(fresh)
    }
}
