// Path: crates/state/src/store.rs

use std::collections::BTreeMap;
use std::sync::Arc;

use kiln_types::error::StateError;
use parking_lot::Mutex;

use crate::kv::{Database, WriteBatch};
use crate::overlay::Overlay;
use crate::view::View;
use crate::StateAccess;

/// The top-level state adapter: a cheaply clonable handle over the
/// external database plus a staged write-buffer.
///
/// Direct writes (and overlay commits, which fold into the same buffer)
/// become durable only when [`StateStore::commit`] flushes everything as
/// one atomic batch.
#[derive(Clone)]
pub struct StateStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    db: Arc<dyn Database>,
    staged: Mutex<BTreeMap<Vec<u8>, Option<Vec<u8>>>>,
}

impl StateStore {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                db,
                staged: Mutex::new(BTreeMap::new()),
            }),
        }
    }

    /// Open a speculative overlay on top of this store.
    pub fn overlay(&self) -> Overlay {
        Overlay::over_store(self.clone())
    }

    /// A view of this store with every key silently prefixed.
    pub fn prefix(&self, prefix: impl Into<Vec<u8>>) -> View<StateStore> {
        View::new(self.clone(), prefix)
    }

    /// Flush all staged writes to the database as one atomic batch.
    pub fn commit(&self) -> Result<(), StateError> {
        let batch: WriteBatch = {
            let mut staged = self.inner.staged.lock();
            std::mem::take(&mut *staged).into_iter().collect()
        };
        if batch.is_empty() {
            return Ok(());
        }
        self.inner.db.write_batch(batch)
    }

    /// Fold a resolved overlay's writes into the staged buffer.
    pub(crate) fn stage<I>(&self, writes: I)
    where
        I: IntoIterator<Item = (Vec<u8>, Option<Vec<u8>>)>,
    {
        self.inner.staged.lock().extend(writes);
    }

    /// Number of writes currently staged; diagnostic only.
    pub fn staged_len(&self) -> usize {
        self.inner.staged.lock().len()
    }
}

impl StateAccess for StateStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StateError> {
        if let Some(value) = self.inner.staged.lock().get(key) {
            return Ok(value.clone());
        }
        self.inner.db.get(key)
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StateError> {
        self.inner
            .staged
            .lock()
            .insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), StateError> {
        self.inner.staged.lock().insert(key.to_vec(), None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;

    #[test]
    fn staged_writes_invisible_until_commit() {
        let db = Arc::new(MemoryStore::new());
        let mut store = StateStore::new(db.clone());

        store.put(b"k", b"v").unwrap();
        assert_eq!(store.get(b"k").unwrap(), Some(b"v".to_vec()));
        assert_eq!(db.get(b"k").unwrap(), None);

        store.commit().unwrap();
        assert_eq!(db.get(b"k").unwrap(), Some(b"v".to_vec()));
        assert_eq!(store.staged_len(), 0);
    }

    #[test]
    fn staged_delete_masks_database_value() {
        let db = Arc::new(MemoryStore::new());
        db.write_batch(vec![(b"k".to_vec(), Some(b"v".to_vec()))])
            .unwrap();

        let mut store = StateStore::new(db.clone());
        store.delete(b"k").unwrap();
        assert_eq!(store.get(b"k").unwrap(), None);

        store.commit().unwrap();
        assert_eq!(db.get(b"k").unwrap(), None);
    }

    #[test]
    fn uncommitted_staging_is_lost_on_reopen() {
        // Simulated crash: a store is dropped without commit; a fresh
        // adapter over the same database sees none of its writes.
        let db = Arc::new(MemoryStore::new());
        {
            let mut store = StateStore::new(db.clone());
            store.put(b"k", b"v").unwrap();
        }
        let reopened = StateStore::new(db);
        assert_eq!(reopened.get(b"k").unwrap(), None);
    }
}
