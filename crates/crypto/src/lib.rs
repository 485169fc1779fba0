// Path: crates/crypto/src/lib.rs
//! Hashing and account-key cryptography.
//!
//! Signatures are recoverable secp256k1 over the SHA-256 of the message,
//! so transactions carry no public key: the sender address is recovered
//! from the signature itself.

mod hash;
mod signer;

pub use hash::{keccak256, sha256};
pub use signer::{recover, Keypair};
