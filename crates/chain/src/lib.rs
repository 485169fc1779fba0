// Path: crates/chain/src/lib.rs
//! Block assembly and the verify/accept/reject surface driven by an
//! external consensus engine.
//!
//! The [`BlockProcessor`] owns no consensus policy: it builds candidate
//! blocks from the mempool, verifies them against a per-block staged
//! overlay, and commits or discards that overlay when consensus decides.

mod mempool;
mod processor;

pub use mempool::{ChainEvent, Mempool};
pub use processor::{BlockProcessor, BlockStatus, TrackedBlock};
