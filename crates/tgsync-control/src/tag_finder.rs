//! Tag-indexed pair discovery.

use async_trait::async_trait;
use tgsync_state::{PairMap, SyncFinder};
use tracing::debug;

use crate::client::ControlPlaneClient;

/// Discovers pairs from the control plane's resource-tag index.
///
/// Every resource carrying the configured tag key becomes a pair: the
/// resource ARN is the target group, the tag's value the hostname. When a
/// resource carries the key more than once, the first occurrence wins.
pub struct TagSyncFinder {
    client: ControlPlaneClient,
    tag_key: String,
}

impl TagSyncFinder {
    pub fn new(client: ControlPlaneClient, tag_key: impl Into<String>) -> Self {
        Self {
            client,
            tag_key: tag_key.into(),
        }
    }
}

#[async_trait]
impl SyncFinder for TagSyncFinder {
    async fn to_sync(&self) -> anyhow::Result<PairMap> {
        let resources = self.client.resources_by_tag_key(&self.tag_key).await?;
        let mut pairs = PairMap::new();
        for resource in resources {
            if let Some(tag) = resource.tags.iter().find(|t| t.key == self.tag_key) {
                pairs.insert(resource.arn, tag.value.clone());
            }
        }
        debug!(tag_key = %self.tag_key, pairs = pairs.len(), "tag discovery finished");
        Ok(pairs)
    }
}
