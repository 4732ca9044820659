//! tgsync-control — REST binding to the load-balancer control plane.
//!
//! Implements the syncer's [`tgsync_sync::TargetGroupClient`] capability and
//! the tag-indexed [`tgsync_state::SyncFinder`] over the control plane's
//! admin API:
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/v1/target-groups/targets?group=<arn>` | Currently registered targets |
//! | POST | `/v1/target-groups/register?group=<arn>` | Register targets |
//! | POST | `/v1/target-groups/deregister?group=<arn>` | Deregister targets |
//! | GET | `/v1/resources?tag-key=<key>` | Resources carrying a tag key |

pub mod client;
pub mod tag_finder;

pub use client::ControlPlaneClient;
pub use tag_finder::TagSyncFinder;
