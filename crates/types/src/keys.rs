// Path: crates/types/src/keys.rs
//! Persisted key layout.
//!
//! The store is partitioned into one-byte namespaces. Program memory
//! snapshots and the per-program private keyspace get separate namespaces
//! so an arbitrary guest-chosen key can never alias a snapshot.

use crate::ids::{Address, BlockId, Id, TxId};

/// `0x00 ++ address` → encoded account.
pub const ACCOUNT_PREFIX: &[u8] = &[0x00];
/// `0x01 ++ program_id` → immutable bytecode blob.
pub const PROGRAM_CODE_PREFIX: &[u8] = &[0x01];
/// `0x02 ++ program_id` → linear-memory snapshot after the last
/// successful invocation.
pub const PROGRAM_STATE_PREFIX: &[u8] = &[0x02];
/// `0x03 ++ tx_id` → encoded receipt.
pub const RECEIPT_PREFIX: &[u8] = &[0x03];
/// `0x04 ++ block_id` → encoded block.
pub const BLOCK_PREFIX: &[u8] = &[0x04];
/// `0x05 ++ …` → consensus metadata (last-accepted pointer, block status).
pub const META_PREFIX: &[u8] = &[0x05];
/// `0x06 ++ program_id ++ key` → the program's private key-value pairs.
pub const PROGRAM_KV_PREFIX: &[u8] = &[0x06];

/// Key of the invocation byte arguments inside a program's private view.
pub const ARGS_KEY: &[u8] = &[0x00];
/// Key of the guest-staged return value inside a program's private view.
pub const RETURN_KEY: &[u8] = &[0x01];
/// Key of the seeded sender address inside a program's private view.
pub const SENDER_KEY: &[u8] = &[0x02];

pub fn account_key(address: &Address) -> Vec<u8> {
    [ACCOUNT_PREFIX, address.as_bytes()].concat()
}

pub fn program_code_key(id: &Id) -> Vec<u8> {
    [PROGRAM_CODE_PREFIX, id.as_bytes()].concat()
}

pub fn program_state_key(id: &Id) -> Vec<u8> {
    [PROGRAM_STATE_PREFIX, id.as_bytes()].concat()
}

/// Prefix under which a program's private key-value pairs live. The
/// per-invocation view rewrites guest keys under this prefix.
pub fn program_view_prefix(id: &Id) -> Vec<u8> {
    [PROGRAM_KV_PREFIX, id.as_bytes()].concat()
}

pub fn receipt_key(id: &TxId) -> Vec<u8> {
    [RECEIPT_PREFIX, id.as_bytes()].concat()
}

pub fn block_key(id: &BlockId) -> Vec<u8> {
    [BLOCK_PREFIX, id.as_bytes()].concat()
}

/// Consensus metadata: id of the last accepted block.
pub fn last_accepted_key() -> Vec<u8> {
    [META_PREFIX, b"last_accepted".as_slice()].concat()
}

/// Consensus metadata: one status byte per decided block.
pub fn block_status_key(id: &BlockId) -> Vec<u8> {
    [META_PREFIX, b"status".as_slice(), id.as_bytes()].concat()
}
