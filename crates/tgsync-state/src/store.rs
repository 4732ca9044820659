//! StateStore — redb-backed durable reconciliation state.
//!
//! One record per managed (target group, hostname) pair, JSON-serialized
//! into redb's `&[u8]` value column under the flat `{tg} {hostname}` key.
//! The store supports both on-disk and in-memory backends (the latter for
//! testing) and doubles as the durable [`SyncCache`] under a reserved key.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::SyncCache;
use crate::error::{StateError, StateResult};
use crate::types::{PairMap, State, StateKey, TargetGroupArn};

/// Reconciliation state records keyed by `{tg} {hostname}`, plus the sync
/// cache record under `synccache_{prefix}`.
const SYNC_STATE: TableDefinition<&str, &[u8]> = TableDefinition::new("sync_state");

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

fn bad_state_record(key: &str) -> impl Fn(serde_json::Error) -> StateError + '_ {
    move |e| StateError::BadStateRecord {
        key: key.to_string(),
        reason: e.to_string(),
    }
}

fn bad_cache_record(key: &str) -> impl Fn(serde_json::Error) -> StateError + '_ {
    move |e| StateError::BadSyncCacheRecord {
        key: key.to_string(),
        reason: e.to_string(),
    }
}

/// Durable keyed mapping from (target group, hostname) to reconciliation
/// state.
///
/// `get_states` returns exactly one entry per requested key; keys with no
/// durable record map to the zero [`State`]. `store` deletes entries whose
/// state has no targets and overwrites the rest: absence of a record and a
/// zero-target record are the same thing, so empty values never hit disk.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get_states(&self, keys: &[StateKey]) -> StateResult<HashMap<StateKey, State>>;

    async fn store(&self, batch: HashMap<StateKey, State>) -> StateResult<()>;
}

/// One durable record per managed pair.
#[derive(Debug, Serialize, Deserialize)]
struct StateRecord {
    key: String,
    tg_arn: TargetGroupArn,
    hostname: String,
    state: State,
}

/// Cached discovery result, co-located with the state records.
#[derive(Debug, Serialize, Deserialize)]
struct SyncCacheRecord {
    key: String,
    expire_at: SystemTime,
    entries: PairMap,
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct RedbStateStore {
    db: Arc<Database>,
    cache_prefix: String,
}

impl RedbStateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path, cache_prefix: &str) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self {
            db: Arc::new(db),
            cache_prefix: cache_prefix.to_string(),
        };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory(cache_prefix: &str) -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self {
            db: Arc::new(db),
            cache_prefix: cache_prefix.to_string(),
        };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create the table if it doesn't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Backend))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(SYNC_STATE).map_err(map_err!(Backend))?;
        txn.commit().map_err(map_err!(Backend))?;
        Ok(())
    }

    fn cache_key(&self) -> String {
        format!("synccache_{}", self.cache_prefix)
    }
}

#[async_trait]
impl StateStore for RedbStateStore {
    async fn get_states(&self, keys: &[StateKey]) -> StateResult<HashMap<StateKey, State>> {
        let txn = self.db.begin_read().map_err(map_err!(Backend))?;
        let table = txn.open_table(SYNC_STATE).map_err(map_err!(Backend))?;

        let mut out = HashMap::with_capacity(keys.len());
        for key in keys {
            let flat = key.storage_key();
            let state = match table.get(flat.as_str()).map_err(map_err!(Backend))? {
                Some(guard) => {
                    let record: StateRecord = serde_json::from_slice(guard.value())
                        .map_err(bad_state_record(&flat))?;
                    record.state
                }
                None => State::default(),
            };
            out.insert(key.clone(), state);
        }
        Ok(out)
    }

    async fn store(&self, batch: HashMap<StateKey, State>) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Backend))?;
        {
            let mut table = txn.open_table(SYNC_STATE).map_err(map_err!(Backend))?;
            for (key, state) in &batch {
                let flat = key.storage_key();
                if state.is_empty() {
                    table.remove(flat.as_str()).map_err(map_err!(Backend))?;
                    debug!(key = %flat, "state record deleted");
                    continue;
                }
                let record = StateRecord {
                    key: flat.clone(),
                    tg_arn: key.tg.clone(),
                    hostname: key.hostname.clone(),
                    state: state.clone(),
                };
                let value = serde_json::to_vec(&record).map_err(bad_state_record(&flat))?;
                table
                    .insert(flat.as_str(), value.as_slice())
                    .map_err(map_err!(Backend))?;
            }
        }
        txn.commit().map_err(map_err!(Backend))?;
        Ok(())
    }
}

#[async_trait]
impl SyncCache for RedbStateStore {
    async fn get_sync(&self, now: SystemTime) -> StateResult<Option<PairMap>> {
        let txn = self.db.begin_read().map_err(map_err!(Backend))?;
        let table = txn.open_table(SYNC_STATE).map_err(map_err!(Backend))?;

        let key = self.cache_key();
        let Some(guard) = table.get(key.as_str()).map_err(map_err!(Backend))? else {
            return Ok(None);
        };
        let record: SyncCacheRecord =
            serde_json::from_slice(guard.value()).map_err(bad_cache_record(&key))?;
        if record.expire_at < now {
            return Ok(None);
        }
        Ok(Some(record.entries))
    }

    async fn store_sync(
        &self,
        entries: Option<PairMap>,
        expire_at: SystemTime,
    ) -> StateResult<()> {
        let key = self.cache_key();
        let txn = self.db.begin_write().map_err(map_err!(Backend))?;
        {
            let mut table = txn.open_table(SYNC_STATE).map_err(map_err!(Backend))?;
            match entries {
                None => {
                    table.remove(key.as_str()).map_err(map_err!(Backend))?;
                    debug!(key = %key, "sync cache cleared");
                }
                Some(entries) => {
                    let record = SyncCacheRecord {
                        key: key.clone(),
                        expire_at,
                        entries,
                    };
                    let value = serde_json::to_vec(&record).map_err(bad_cache_record(&key))?;
                    table
                        .insert(key.as_str(), value.as_slice())
                        .map_err(map_err!(Backend))?;
                }
            }
        }
        txn.commit().map_err(map_err!(Backend))?;
        Ok(())
    }
}
