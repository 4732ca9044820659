//! tgsync-state — embedded reconciliation state for tgsync.
//!
//! Backed by [redb](https://docs.rs/redb), provides the durable per-pair
//! state records, the time-bounded discovery cache, and the pair-discovery
//! contracts used by the syncer.
//!
//! # Architecture
//!
//! All persisted types are JSON-serialized into redb's `&[u8]` value column
//! under flat string keys (`{tg} {hostname}` for state records,
//! `synccache_{prefix}` for the cached discovery result).
//!
//! [`RedbStateStore`] is `Clone` + `Send` + `Sync` (backed by
//! `Arc<Database>`) and can be shared across async tasks. It implements both
//! [`StateStore`] and [`SyncCache`]; which cache implementation a deployment
//! actually uses is decided by the bootstrap, not by the store.

pub mod cache;
pub mod error;
pub mod finder;
pub mod store;
pub mod types;

pub use cache::{LocalSyncCache, SyncCache};
pub use error::{StateError, StateResult};
pub use finder::{CachedSyncFinder, FixedSyncFinder, SyncFinder};
pub use store::{RedbStateStore, StateStore};
pub use types::{PairMap, State, StateKey, Target, TargetGroupArn};
