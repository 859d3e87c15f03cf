//! Key-value persistence contract, per `spec.md` §6: `put`, `get`, `scan`.
//! Storage engine details are a Non-goal (`spec.md` §1); this crate still
//! ships a usable in-memory reference implementation, the way
//! `knhk-autonomic` ships a `sled`-backed `KnowledgeBase` rather than
//! leaving persistence as an unimplemented trait.

use crate::error::{CoreError, Result};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Durable (or durable-enough) key-value storage used for workflow state,
/// the reaper registry, and the consensus history.
pub trait KvStore: Send + Sync {
    fn put(&self, key: &str, value: Vec<u8>) -> Result<()>;
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>>;
    fn delete(&self, key: &str) -> Result<()>;
}

/// In-memory `KvStore`. Sufficient for tests and single-process
/// deployments; a real deployment swaps this for a durable engine without
/// any caller-visible change, since the trait is the only contract.
#[derive(Debug, Default)]
pub struct MemKvStore {
    inner: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemKvStore {
    fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.inner.write().insert(key.to_string(), value);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.inner.read().get(key).cloned())
    }

    fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        Ok(self
            .inner
            .read()
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.inner.write().remove(key);
        Ok(())
    }
}

/// Helper for the `PERSISTENCE_IO` error-handling policy in `spec.md` §7:
/// exponential backoff up to 3 attempts, surfacing the last error on
/// exhaustion.
pub fn put_with_retry(store: &dyn KvStore, key: &str, value: Vec<u8>) -> Result<()> {
    crate::retry::with_backoff(3, std::time::Duration::from_millis(1), |_| {
        store.put(key, value.clone())
    })
    .map_err(|e| CoreError::Persistence(format!("exhausted retries for {key}: {e}")))
}
