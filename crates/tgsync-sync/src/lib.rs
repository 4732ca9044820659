//! tgsync-sync — the reconciliation engine.
//!
//! Keeps the IP membership of load-balancer target groups aligned with the
//! DNS resolution of configured hostnames:
//!
//! - [`reconcile::resolve`] — the pure decision function turning (previous
//!   state, registered IPs, resolved IPs) into (additions, removals, next
//!   state)
//! - [`resolver::MultiResolver`] — DNS lookup with random-start sequential
//!   failover across configured servers
//! - [`target_group::TargetGroupClient`] — the control-plane capability the
//!   syncer mutates through
//! - [`syncer::Syncer`] — the orchestrator running one pass over all
//!   managed pairs

pub mod error;
pub mod reconcile;
pub mod resolver;
pub mod syncer;
pub mod target_group;

pub use error::SyncError;
pub use reconcile::{resolve, ReconcileOutcome};
pub use resolver::{DnsServerResolver, MultiResolver, Resolver, SystemResolver};
pub use syncer::{SyncConfig, Syncer};
pub use target_group::TargetGroupClient;
