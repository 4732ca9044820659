//! Control-plane operations on target groups.

use async_trait::async_trait;
use tgsync_state::TargetGroupArn;

/// Abstract control-plane operations, keyed by target group.
///
/// The control plane identifies each target by its IP string. Empty input
/// lists are no-ops and must never produce a control-plane call; the syncer
/// already guards for this, and bindings are expected to as well.
#[async_trait]
pub trait TargetGroupClient: Send + Sync {
    /// IPs currently registered in the target group.
    async fn list_ips(&self, tg: &TargetGroupArn) -> anyhow::Result<Vec<String>>;

    /// Register the given IPs with the target group.
    async fn register(&self, tg: &TargetGroupArn, ips: &[String]) -> anyhow::Result<()>;

    /// Deregister the given IPs from the target group.
    async fn deregister(&self, tg: &TargetGroupArn, ips: &[String]) -> anyhow::Result<()>;
}
