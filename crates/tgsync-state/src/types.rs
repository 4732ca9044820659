//! Domain types for the tgsync state store.
//!
//! These types represent the persisted reconciliation state of each managed
//! (target group, hostname) pair. All persisted types are serializable
//! to/from JSON for storage in redb value columns.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Opaque control-plane identifier of a target group. Equality is byte-exact.
pub type TargetGroupArn = String;

/// Identity of one managed (target group, hostname) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateKey {
    pub tg: TargetGroupArn,
    pub hostname: String,
}

impl StateKey {
    pub fn new(tg: impl Into<TargetGroupArn>, hostname: impl Into<String>) -> Self {
        Self {
            tg: tg.into(),
            hostname: hostname.into(),
        }
    }

    /// Flat primary key used by durable stores: `{tg} {hostname}`.
    pub fn storage_key(&self) -> String {
        format!("{} {}", self.tg, self.hostname)
    }
}

/// One tracked endpoint: an IPv4 address and the number of consecutive sync
/// passes it has been absent from DNS resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub ip: String,
    pub times_missing: u32,
}

/// Durable per-pair reconciliation record.
///
/// An empty target list is equivalent to the record being absent; stores
/// delete the record instead of persisting an empty value. `version`
/// increments by one on every successful reconciliation of the pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub targets: Vec<Target>,
    pub version: u64,
}

impl State {
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Discovery output: target group → hostname to keep it aligned with.
///
/// A target group appears at most once; a hostname may repeat across
/// different target groups.
pub type PairMap = BTreeMap<TargetGroupArn, String>;
