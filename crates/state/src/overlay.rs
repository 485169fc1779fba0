// Path: crates/state/src/overlay.rs
//! Speculative write-buffers over the state store.

use std::collections::BTreeMap;
use std::sync::Arc;

use kiln_types::error::StateError;
use parking_lot::Mutex;

use crate::store::StateStore;
use crate::view::View;
use crate::StateAccess;

type Writes = BTreeMap<Vec<u8>, Option<Vec<u8>>>;

enum Parent {
    Store(StateStore),
    Overlay(Overlay),
}

enum Buf {
    Open(Writes),
    Committed,
    Discarded,
}

impl Buf {
    fn closed_err(&self) -> Option<StateError> {
        match self {
            Buf::Open(_) => None,
            Buf::Committed => Some(StateError::OverlayClosed("committed")),
            Buf::Discarded => Some(StateError::OverlayClosed("discarded")),
        }
    }
}

/// A read-through write-buffer over a [`StateStore`] or another overlay.
///
/// Reads consult the local buffer first (deletions are tombstones) and
/// fall through to the parent. `commit` folds the buffer into the parent;
/// `discard` drops it. Either way the overlay is closed and every further
/// operation fails with [`StateError::OverlayClosed`].
///
/// Clones share the same buffer; the engine is single-threaded with
/// respect to state, so the interior mutex only serializes, it does not
/// coordinate.
#[derive(Clone)]
pub struct Overlay {
    inner: Arc<OverlayInner>,
}

struct OverlayInner {
    parent: Parent,
    buf: Mutex<Buf>,
}

impl Overlay {
    pub(crate) fn over_store(store: StateStore) -> Self {
        Self::with_parent(Parent::Store(store))
    }

    fn with_parent(parent: Parent) -> Self {
        Self {
            inner: Arc::new(OverlayInner {
                parent,
                buf: Mutex::new(Buf::Open(Writes::new())),
            }),
        }
    }

    /// Stack a child overlay on top of this one.
    pub fn overlay(&self) -> Overlay {
        Self::with_parent(Parent::Overlay(self.clone()))
    }

    /// A view of this overlay with every key silently prefixed.
    pub fn prefix(&self, prefix: impl Into<Vec<u8>>) -> View<Overlay> {
        View::new(self.clone(), prefix)
    }

    /// Fold the buffered writes into the parent and close the overlay.
    pub fn commit(&self) -> Result<(), StateError> {
        let writes = self.take_writes(Buf::Committed)?;
        match &self.inner.parent {
            Parent::Store(store) => {
                store.stage(writes);
                Ok(())
            }
            Parent::Overlay(parent) => parent.absorb(writes),
        }
    }

    /// Drop the buffered writes and close the overlay.
    pub fn discard(&self) -> Result<(), StateError> {
        self.take_writes(Buf::Discarded).map(drop)
    }

    /// Number of buffered writes; diagnostic only.
    pub fn len(&self) -> Result<usize, StateError> {
        let buf = self.inner.buf.lock();
        match &*buf {
            Buf::Open(writes) => Ok(writes.len()),
            closed => Err(closed.closed_err().unwrap_or(StateError::OverlayClosed("closed"))),
        }
    }

    pub fn is_empty(&self) -> Result<bool, StateError> {
        Ok(self.len()? == 0)
    }

    fn take_writes(&self, next: Buf) -> Result<Writes, StateError> {
        let mut buf = self.inner.buf.lock();
        if let Some(err) = buf.closed_err() {
            return Err(err);
        }
        match std::mem::replace(&mut *buf, next) {
            Buf::Open(writes) => Ok(writes),
            // Unreachable: the closed check above just passed.
            closed => Err(closed
                .closed_err()
                .unwrap_or(StateError::OverlayClosed("closed"))),
        }
    }

    fn absorb(&self, writes: Writes) -> Result<(), StateError> {
        let mut buf = self.inner.buf.lock();
        match &mut *buf {
            Buf::Open(own) => {
                own.extend(writes);
                Ok(())
            }
            closed => Err(closed
                .closed_err()
                .unwrap_or(StateError::OverlayClosed("closed"))),
        }
    }
}

impl StateAccess for Overlay {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StateError> {
        {
            let buf = self.inner.buf.lock();
            match &*buf {
                Buf::Open(writes) => {
                    if let Some(value) = writes.get(key) {
                        return Ok(value.clone());
                    }
                }
                closed => {
                    return Err(closed
                        .closed_err()
                        .unwrap_or(StateError::OverlayClosed("closed")))
                }
            }
        }
        match &self.inner.parent {
            Parent::Store(store) => store.get(key),
            Parent::Overlay(parent) => parent.get(key),
        }
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StateError> {
        let mut buf = self.inner.buf.lock();
        match &mut *buf {
            Buf::Open(writes) => {
                writes.insert(key.to_vec(), Some(value.to_vec()));
                Ok(())
            }
            closed => Err(closed
                .closed_err()
                .unwrap_or(StateError::OverlayClosed("closed"))),
        }
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), StateError> {
        let mut buf = self.inner.buf.lock();
        match &mut *buf {
            Buf::Open(writes) => {
                writes.insert(key.to_vec(), None);
                Ok(())
            }
            closed => Err(closed
                .closed_err()
                .unwrap_or(StateError::OverlayClosed("closed"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{Database, MemoryStore};

    fn fresh_store() -> (Arc<MemoryStore>, StateStore) {
        let db = Arc::new(MemoryStore::new());
        let store = StateStore::new(db.clone());
        (db, store)
    }

    #[test]
    fn reads_fall_through_to_store() {
        let (_db, mut store) = fresh_store();
        store.put(b"k", b"base").unwrap();

        let overlay = store.overlay();
        assert_eq!(overlay.get(b"k").unwrap(), Some(b"base".to_vec()));
    }

    #[test]
    fn writes_shadow_and_tombstones_mask() {
        let (_db, mut store) = fresh_store();
        store.put(b"k", b"base").unwrap();

        let mut overlay = store.overlay();
        overlay.put(b"k", b"new").unwrap();
        assert_eq!(overlay.get(b"k").unwrap(), Some(b"new".to_vec()));

        overlay.delete(b"k").unwrap();
        assert_eq!(overlay.get(b"k").unwrap(), None);
        // The store itself is untouched.
        assert_eq!(store.get(b"k").unwrap(), Some(b"base".to_vec()));
    }

    #[test]
    fn discard_is_a_no_op_on_the_store() {
        let (db, store) = fresh_store();
        let mut overlay = store.overlay();
        overlay.put(b"k", b"v").unwrap();
        overlay.discard().unwrap();

        store.commit().unwrap();
        assert!(db.is_empty());
        assert_eq!(store.get(b"k").unwrap(), None);
    }

    #[test]
    fn commit_stages_into_store_then_database() {
        let (db, store) = fresh_store();
        let mut overlay = store.overlay();
        overlay.put(b"k", b"v").unwrap();
        overlay.commit().unwrap();

        // Staged but not yet durable.
        assert_eq!(db.get(b"k").unwrap(), None);
        store.commit().unwrap();
        assert_eq!(db.get(b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn stacked_overlays_compose() {
        let (_db, mut store) = fresh_store();
        store.put(b"base", b"1").unwrap();

        let mut block = store.overlay();
        block.put(b"block", b"2").unwrap();

        let mut scratch = block.overlay();
        scratch.put(b"scratch", b"3").unwrap();

        // The child sees through both layers.
        assert_eq!(scratch.get(b"base").unwrap(), Some(b"1".to_vec()));
        assert_eq!(scratch.get(b"block").unwrap(), Some(b"2".to_vec()));

        scratch.commit().unwrap();
        assert_eq!(block.get(b"scratch").unwrap(), Some(b"3".to_vec()));
        // But nothing reached the store.
        assert_eq!(store.get(b"scratch").unwrap(), None);
    }

    #[test]
    fn discarded_child_leaves_parent_untouched() {
        let (_db, store) = fresh_store();
        let block = store.overlay();
        let mut scratch = block.overlay();
        scratch.put(b"k", b"v").unwrap();
        scratch.discard().unwrap();

        assert_eq!(block.get(b"k").unwrap(), None);
        assert!(block.is_empty().unwrap());
    }

    #[test]
    fn closed_overlay_is_unusable() {
        let (_db, store) = fresh_store();
        let mut overlay = store.overlay();
        overlay.commit().unwrap();

        assert!(matches!(
            overlay.get(b"k"),
            Err(StateError::OverlayClosed("committed"))
        ));
        assert!(matches!(
            overlay.put(b"k", b"v"),
            Err(StateError::OverlayClosed("committed"))
        ));
        assert!(matches!(
            overlay.commit(),
            Err(StateError::OverlayClosed("committed"))
        ));

        let discarded = store.overlay();
        discarded.discard().unwrap();
        assert!(matches!(
            discarded.discard(),
            Err(StateError::OverlayClosed("discarded"))
        ));
    }

    #[test]
    fn clones_share_one_buffer() {
        let (_db, store) = fresh_store();
        let overlay = store.overlay();
        let mut handle = overlay.clone();
        handle.put(b"k", b"v").unwrap();
        assert_eq!(overlay.get(b"k").unwrap(), Some(b"v".to_vec()));
    }
}
