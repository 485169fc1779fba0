// Path: crates/state/src/kv.rs
//! The external key-value database contract and an in-memory
//! implementation for tests and single-process nodes.

use std::collections::BTreeMap;
use std::sync::Arc;

use kiln_types::error::StateError;
use parking_lot::RwLock;

/// An ordered set of writes applied as one unit. `None` values are
/// deletions.
pub type WriteBatch = Vec<(Vec<u8>, Option<Vec<u8>>)>;

/// A byte-keyed, byte-valued ordered map with atomic batch commit.
///
/// `write_batch` must be all-or-nothing with respect to crash recovery;
/// that property is what makes block acceptance atomic.
pub trait Database: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StateError>;

    /// All pairs whose key starts with `prefix`, in key order.
    fn iter_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StateError>;

    /// Apply `batch` atomically.
    fn write_batch(&self, batch: WriteBatch) -> Result<(), StateError>;
}

impl<D: Database + ?Sized> Database for Arc<D> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StateError> {
        (**self).get(key)
    }

    fn iter_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StateError> {
        (**self).iter_prefix(prefix)
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<(), StateError> {
        (**self).write_batch(batch)
    }
}

/// BTreeMap-backed [`Database`]. Batches apply under one lock, so they
/// are trivially atomic.
#[derive(Default)]
pub struct MemoryStore {
    map: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys; used by tests.
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}

impl Database for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StateError> {
        Ok(self.map.read().get(key).cloned())
    }

    fn iter_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StateError> {
        let map = self.map.read();
        Ok(map
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<(), StateError> {
        let mut map = self.map.write();
        for (key, value) in batch {
            match value {
                Some(value) => {
                    map.insert(key, value);
                }
                None => {
                    map.remove(&key);
                }
            }
        }
        Ok(())
    }
}
