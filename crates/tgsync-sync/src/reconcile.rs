//! Reconciliation decision function.
//!
//! Pure logic: given the previous durable state, the currently registered
//! IPs and the freshly resolved IPs, decide which IPs to register, which to
//! deregister, and what the next durable state is. No I/O, no clock, no
//! randomness.

use std::collections::{BTreeMap, BTreeSet};

use tgsync_state::{State, Target};

/// Result of reconciling one pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub to_remove: Vec<String>,
    pub to_add: Vec<String>,
    pub next: State,
}

/// Decide the mutations that bring a target group in line with DNS.
///
/// `threshold` is the miss count at which a tracked IP becomes eligible for
/// deregistration. `remove_unknown` governs IPs that are registered but were
/// never tracked: when true they are removed on the first pass, when false
/// they are left alone forever.
///
/// Inputs are treated as sets; outputs come back sorted.
pub fn resolve(
    previous: &State,
    registered: &[String],
    resolved: &[String],
    threshold: u32,
    remove_unknown: bool,
) -> ReconcileOutcome {
    let registered: BTreeSet<&str> = registered.iter().map(String::as_str).collect();
    let resolved: BTreeSet<&str> = resolved.iter().map(String::as_str).collect();

    let to_add: Vec<String> = resolved
        .difference(&registered)
        .map(|ip| ip.to_string())
        .collect();
    let missing: Vec<&str> = registered.difference(&resolved).copied().collect();

    let mut misses: BTreeMap<String, u32> = previous
        .targets
        .iter()
        .map(|t| (t.ip.clone(), t.times_missing))
        .collect();

    for ip in missing {
        if let Some(count) = misses.get_mut(ip) {
            *count = count.saturating_add(1);
        } else if remove_unknown {
            // Never tracked: force it past the threshold.
            misses.insert(ip.to_string(), threshold.saturating_add(1));
        }
    }

    // Reset happens after the increment pass, so an IP that was missing
    // last pass but resolves now goes back to zero.
    for ip in &resolved {
        misses.insert(ip.to_string(), 0);
    }

    let to_remove: Vec<String> = misses
        .iter()
        .filter(|&(_, &count)| count >= threshold && count > 0)
        .map(|(ip, _)| ip.clone())
        .collect();
    for ip in &to_remove {
        misses.remove(ip);
    }

    let next = State {
        targets: misses
            .into_iter()
            .map(|(ip, times_missing)| Target { ip, times_missing })
            .collect(),
        version: previous.version + 1,
    };

    ReconcileOutcome {
        to_remove,
        to_add,
        next,
    }
}
