//! Error types for sync passes.

use tgsync_state::{StateError, TargetGroupArn};
use thiserror::Error;

/// Errors from one sync pass.
///
/// `Discovery`, `StoreRead` and `StoreWrite` abort the whole pass.
/// `Resolve` and `ControlPlane` are scoped to a single pair: the pair is
/// logged and skipped, its durable state left untouched, and the rest of
/// the pass proceeds.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("unable to discover pairs to sync: {0}")]
    Discovery(anyhow::Error),

    #[error("unable to read prior states: {0}")]
    StoreRead(StateError),

    #[error("unable to store sync results: {0}")]
    StoreWrite(StateError),

    #[error("unable to resolve {hostname}: {source}")]
    Resolve {
        hostname: String,
        source: anyhow::Error,
    },

    #[error("control plane call failed for {tg}: {source}")]
    ControlPlane {
        tg: TargetGroupArn,
        source: anyhow::Error,
    },
}
