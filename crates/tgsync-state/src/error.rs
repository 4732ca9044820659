//! Error types for the tgsync state store.

use thiserror::Error;

/// Result type alias for state store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors from the durable state store and the discovery cache.
///
/// Database plumbing (transactions, tables, row access) collapses into
/// [`StateError::Backend`]; the two record kinds keep their own variants
/// carrying the flat key, so a bad row can be found and deleted by hand.
#[derive(Debug, Error)]
pub enum StateError {
    /// The backing database could not be opened or created.
    #[error("unable to open state database: {0}")]
    Open(String),

    /// A transaction, table or row operation against the backing database
    /// failed.
    #[error("state database access failed: {0}")]
    Backend(String),

    /// A per-pair reconciliation record would not encode or decode.
    #[error("bad state record for {key:?}: {reason}")]
    BadStateRecord { key: String, reason: String },

    /// The cached discovery result would not encode or decode.
    #[error("bad sync cache record {key:?}: {reason}")]
    BadSyncCacheRecord { key: String, reason: String },
}
