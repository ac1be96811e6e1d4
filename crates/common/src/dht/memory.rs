//! In-memory DHT implementation.
//!
//! Backs single-node setups and the saga test suites. Besides plain storage
//! it keeps per-operation counters and a scripted fault table so tests can
//! assert how many network calls a saga made and force a failure at an exact
//! step.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use super::{DhtError, DhtPort, Key};

/// Totals of operations served since construction, including failed ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DhtOpCounts {
    pub gets: u64,
    pub puts: u64,
    pub removes: u64,
}

#[derive(Default)]
struct MemoryDhtInner {
    blocks: BTreeMap<Key, Bytes>,
    counts: DhtOpCounts,
    // keys whose next matching operation fails with the given error
    fail_get: BTreeMap<Key, DhtError>,
    fail_put: BTreeMap<Key, DhtError>,
    fail_remove: BTreeMap<Key, DhtError>,
    // every key a get was issued for, for per-key call assertions
    get_log: Vec<Key>,
}

/// In-process DHT over a mutex-guarded map.
#[derive(Clone, Default)]
pub struct MemoryDht {
    inner: Arc<Mutex<MemoryDhtInner>>,
}

impl MemoryDht {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the operation counters.
    pub fn op_counts(&self) -> DhtOpCounts {
        self.inner.lock().counts
    }

    /// Whether a block is currently stored under `key`.
    pub fn contains(&self, key: &Key) -> bool {
        self.inner.lock().blocks.contains_key(key)
    }

    /// Number of stored blocks.
    pub fn len(&self) -> usize {
        self.inner.lock().blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().blocks.is_empty()
    }

    /// Keys of all stored blocks.
    pub fn keys(&self) -> HashSet<Key> {
        self.inner.lock().blocks.keys().copied().collect()
    }

    /// How many gets have been issued for `key`.
    pub fn gets_for(&self, key: &Key) -> usize {
        self.inner.lock().get_log.iter().filter(|k| *k == key).count()
    }

    /// Fail the next `get` for `key` with `error`.
    pub fn fail_next_get(&self, key: Key, error: DhtError) {
        self.inner.lock().fail_get.insert(key, error);
    }

    /// Fail the next `put` for `key` with `error`.
    pub fn fail_next_put(&self, key: Key, error: DhtError) {
        self.inner.lock().fail_put.insert(key, error);
    }

    /// Fail the next `remove` for `key` with `error`.
    pub fn fail_next_remove(&self, key: Key, error: DhtError) {
        self.inner.lock().fail_remove.insert(key, error);
    }
}

#[async_trait]
impl DhtPort for MemoryDht {
    async fn get(&self, key: &Key) -> Result<Bytes, DhtError> {
        let mut inner = self.inner.lock();
        inner.counts.gets += 1;
        inner.get_log.push(*key);
        if let Some(error) = inner.fail_get.remove(key) {
            tracing::debug!(key = %key, "injected get failure");
            return Err(error);
        }
        inner.blocks.get(key).cloned().ok_or(DhtError::NotFound)
    }

    async fn put(&self, key: Key, value: Bytes) -> Result<(), DhtError> {
        let mut inner = self.inner.lock();
        inner.counts.puts += 1;
        if let Some(error) = inner.fail_put.remove(&key) {
            tracing::debug!(key = %key, "injected put failure");
            return Err(error);
        }
        inner.blocks.insert(key, value);
        Ok(())
    }

    async fn remove(&self, key: &Key) -> Result<(), DhtError> {
        let mut inner = self.inner.lock();
        inner.counts.removes += 1;
        if let Some(error) = inner.fail_remove.remove(key) {
            tracing::debug!(key = %key, "injected remove failure");
            return Err(error);
        }
        inner.blocks.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_put_get_remove() {
        let dht = MemoryDht::new();
        let key = Key::content(b"block");

        assert_eq!(dht.get(&key).await, Err(DhtError::NotFound));

        dht.put(key, Bytes::from_static(b"block")).await.unwrap();
        assert_eq!(dht.get(&key).await.unwrap(), Bytes::from_static(b"block"));

        dht.remove(&key).await.unwrap();
        assert_eq!(dht.get(&key).await, Err(DhtError::NotFound));

        let counts = dht.op_counts();
        assert_eq!(counts.gets, 3);
        assert_eq!(counts.puts, 1);
        assert_eq!(counts.removes, 1);
    }

    #[tokio::test]
    async fn test_remove_absent_is_ok() {
        let dht = MemoryDht::new();
        dht.remove(&Key::content(b"never stored")).await.unwrap();
    }

    #[tokio::test]
    async fn test_injected_fault_fires_once() {
        let dht = MemoryDht::new();
        let key = Key::content(b"block");
        dht.put(key, Bytes::from_static(b"block")).await.unwrap();

        dht.fail_next_get(key, DhtError::Timeout);
        assert_eq!(dht.get(&key).await, Err(DhtError::Timeout));
        assert!(dht.get(&key).await.is_ok());
    }
}
