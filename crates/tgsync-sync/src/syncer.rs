//! Syncer — drives one reconciliation pass across all managed pairs.
//!
//! One pass: discover the pairs, batch-read their prior states, reconcile
//! each pair against fresh DNS and the control plane, then batch-write the
//! surviving states. Pairs are processed sequentially; control-plane and DNS
//! latency dominate and pair counts are small.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use tracing::{info, warn};

use tgsync_state::{State, StateKey, StateStore, SyncFinder, TargetGroupArn};

use crate::error::SyncError;
use crate::reconcile::{resolve, ReconcileOutcome};
use crate::resolver::Resolver;
use crate::target_group::TargetGroupClient;

/// Reconciliation policy knobs.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Consecutive misses before a tracked IP is deregistered.
    pub invocations_before_deregistration: u32,
    /// Remove registered IPs that were never tracked by this system.
    pub remove_unknown_tg_ips: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            invocations_before_deregistration: 3,
            remove_unknown_tg_ips: true,
        }
    }
}

/// Orchestrates sync passes over the full set of managed pairs.
pub struct Syncer {
    state: Arc<dyn StateStore>,
    client: Arc<dyn TargetGroupClient>,
    resolver: Arc<dyn Resolver>,
    finder: Arc<dyn SyncFinder>,
    config: SyncConfig,
}

impl Syncer {
    pub fn new(
        state: Arc<dyn StateStore>,
        client: Arc<dyn TargetGroupClient>,
        resolver: Arc<dyn Resolver>,
        finder: Arc<dyn SyncFinder>,
        config: SyncConfig,
    ) -> Self {
        Self {
            state,
            client,
            resolver,
            finder,
            config,
        }
    }

    /// Run one pass over every discovered pair.
    ///
    /// A pair whose resolution or control-plane calls fail is logged and
    /// excluded from the batch write, leaving its durable record unchanged;
    /// the next pass retries it with intact miss counters. Only discovery
    /// and batch read/write failures abort the pass.
    pub async fn sync(&self) -> Result<(), SyncError> {
        let pairs = self.finder.to_sync().await.map_err(SyncError::Discovery)?;
        let keys: Vec<StateKey> = pairs
            .iter()
            .map(|(tg, hostname)| StateKey::new(tg.clone(), hostname.clone()))
            .collect();
        let priors = self
            .state
            .get_states(&keys)
            .await
            .map_err(SyncError::StoreRead)?;

        let mut results: HashMap<StateKey, State> = HashMap::with_capacity(pairs.len());
        for (tg, hostname) in &pairs {
            let key = StateKey::new(tg.clone(), hostname.clone());
            let previous = priors.get(&key).cloned().unwrap_or_default();
            match self.sync_single(tg, hostname, &previous).await {
                Ok(next) => {
                    results.insert(key, next);
                }
                Err(e) => {
                    warn!(tg = %tg, hostname = %hostname, error = %e, "unable to sync pair");
                }
            }
        }

        self.state
            .store(results)
            .await
            .map_err(SyncError::StoreWrite)?;
        Ok(())
    }

    async fn sync_single(
        &self,
        tg: &TargetGroupArn,
        hostname: &str,
        previous: &State,
    ) -> Result<State, SyncError> {
        let resolved = self.resolve_ipv4s(hostname).await?;
        let registered = self
            .client
            .list_ips(tg)
            .await
            .map_err(|source| SyncError::ControlPlane {
                tg: tg.clone(),
                source,
            })?;

        let ReconcileOutcome {
            to_remove,
            to_add,
            next,
        } = resolve(
            previous,
            &registered,
            &resolved,
            self.config.invocations_before_deregistration,
            self.config.remove_unknown_tg_ips,
        );

        // Register before deregister, so a rotating IP never leaves the
        // group momentarily empty.
        if !to_add.is_empty() {
            info!(tg = %tg, hostname, targets = ?to_add, "registering targets");
            self.client
                .register(tg, &to_add)
                .await
                .map_err(|source| SyncError::ControlPlane {
                    tg: tg.clone(),
                    source,
                })?;
        }
        if !to_remove.is_empty() {
            info!(tg = %tg, hostname, targets = ?to_remove, "deregistering targets");
            self.client
                .deregister(tg, &to_remove)
                .await
                .map_err(|source| SyncError::ControlPlane {
                    tg: tg.clone(),
                    source,
                })?;
        }
        Ok(next)
    }

    /// Resolve the hostname, keeping non-unspecified IPv4 addresses only.
    async fn resolve_ipv4s(&self, hostname: &str) -> Result<Vec<String>, SyncError> {
        let addrs = self
            .resolver
            .lookup_ips(hostname)
            .await
            .map_err(|source| SyncError::Resolve {
                hostname: hostname.to_string(),
                source,
            })?;
        Ok(addrs
            .into_iter()
            .filter_map(|addr| match addr {
                IpAddr::V4(v4) if !v4.is_unspecified() => Some(v4.to_string()),
                _ => None,
            })
            .collect())
    }
}
