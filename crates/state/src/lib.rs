// Path: crates/state/src/lib.rs
//! State storage for the kiln VM.
//!
//! The persistent database is an external collaborator behind the
//! [`Database`] trait. [`StateStore`] wraps it with a top-level staged
//! write-buffer whose `commit` is a single atomic batch; [`Overlay`] adds
//! stackable speculative buffers on top (one per candidate block, plus a
//! scratch layer per guest invocation); [`View`] rewrites keys under a
//! fixed prefix without buffering anything itself, so prefix-scoped writes
//! always land in the overlay they were opened from.

mod kv;
mod overlay;
mod store;
mod view;

pub use kv::{Database, MemoryStore, WriteBatch};
pub use overlay::Overlay;
pub use store::StateStore;
pub use view::View;

use kiln_types::error::StateError;

/// Uniform read/write access to a keyspace. Implemented by the store, by
/// overlays and by prefix views, so engine code is generic over where its
/// writes are buffered.
pub trait StateAccess {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StateError>;
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StateError>;
    fn delete(&mut self, key: &[u8]) -> Result<(), StateError>;
}
