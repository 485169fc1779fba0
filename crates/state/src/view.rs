// Path: crates/state/src/view.rs

use kiln_types::error::StateError;

use crate::StateAccess;

/// A keyspace view that silently prefixes every key and forwards to the
/// wrapped accessor.
///
/// Deliberately a thin adapter with no buffer of its own: writes through a
/// view land wherever the wrapped accessor buffers them, so committing a
/// block overlay always carries the program-scoped writes with it.
#[derive(Clone)]
pub struct View<S> {
    inner: S,
    prefix: Vec<u8>,
}

impl<S> View<S> {
    pub fn new(inner: S, prefix: impl Into<Vec<u8>>) -> Self {
        Self {
            inner,
            prefix: prefix.into(),
        }
    }

    fn full_key(&self, key: &[u8]) -> Vec<u8> {
        [self.prefix.as_slice(), key].concat()
    }
}

impl<S: StateAccess> StateAccess for View<S> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StateError> {
        self.inner.get(&self.full_key(key))
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StateError> {
        self.inner.put(&self.full_key(key), value)
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), StateError> {
        self.inner.delete(&self.full_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;
    use crate::store::StateStore;
    use std::sync::Arc;

    #[test]
    fn view_rewrites_keys() {
        let store = StateStore::new(Arc::new(MemoryStore::new()));
        let mut view = store.prefix(vec![0xab]);
        view.put(b"key", b"value").unwrap();

        assert_eq!(store.get(&[0xab, b'k', b'e', b'y']).unwrap(), Some(b"value".to_vec()));
        assert_eq!(view.get(b"key").unwrap(), Some(b"value".to_vec()));
    }

    #[test]
    fn view_over_overlay_writes_into_the_overlay() {
        let store = StateStore::new(Arc::new(MemoryStore::new()));
        let overlay = store.overlay();
        let mut view = overlay.prefix(vec![0x01]);

        view.put(b"k", b"v").unwrap();
        assert_eq!(overlay.get(&[0x01, b'k']).unwrap(), Some(b"v".to_vec()));
        // Nothing leaks past the overlay until it commits.
        assert_eq!(store.get(&[0x01, b'k']).unwrap(), None);

        overlay.commit().unwrap();
        assert_eq!(store.get(&[0x01, b'k']).unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn views_with_different_prefixes_are_disjoint() {
        let store = StateStore::new(Arc::new(MemoryStore::new()));
        let mut a = store.prefix(vec![0x01]);
        let mut b = store.prefix(vec![0x02]);

        a.put(b"k", b"a").unwrap();
        b.put(b"k", b"b").unwrap();

        assert_eq!(a.get(b"k").unwrap(), Some(b"a".to_vec()));
        assert_eq!(b.get(b"k").unwrap(), Some(b"b".to_vec()));
    }
}
