// Path: crates/types/src/error.rs
//! Error types, one enum per layer.

use crate::ids::{BlockId, ProgramId};
use thiserror::Error;

/// Errors from the canonical wire codec.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Input ended before the value was fully decoded.
    #[error("unexpected end of input")]
    UnexpectedEof,
    /// A top-level decode left bytes unconsumed.
    #[error("{0} trailing bytes after value")]
    Trailing(usize),
    /// A length prefix exceeds the wire cap.
    #[error("length {len} exceeds wire cap {max}")]
    Oversized { len: usize, max: usize },
    /// An unknown discriminant byte.
    #[error("unknown {what} tag {tag:#04x}")]
    UnknownTag { what: &'static str, tag: u8 },
    /// A length-prefixed string was not valid UTF-8.
    #[error("byte string is not valid utf-8")]
    InvalidUtf8,
    /// A boolean byte was neither 0 nor 1.
    #[error("invalid boolean byte {0:#04x}")]
    InvalidBool(u8),
}

/// Errors from the state store and its overlays.
#[derive(Error, Debug)]
pub enum StateError {
    /// The underlying key-value backend failed.
    #[error("state backend: {0}")]
    Backend(String),
    /// The overlay was already committed or discarded.
    #[error("overlay already {0}")]
    OverlayClosed(&'static str),
}

/// Errors from signing and public-key recovery.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid private key")]
    InvalidKey,
    #[error("invalid signature encoding")]
    InvalidSignature,
    #[error("public key recovery failed")]
    RecoveryFailed,
}

/// Errors from the guest-bytecode engine. Traps during execution are
/// *not* errors: they are contained as unsuccessful invocations and
/// reported through the receipt.
#[derive(Error, Debug)]
pub enum VmError {
    /// The engine itself failed to initialize.
    #[error("engine initialization failed: {0}")]
    Initialization(String),
    /// The module failed to compile or instantiate, or lacks the
    /// required `memory` export.
    #[error("invalid module: {0}")]
    InvalidModule(String),
    /// The requested export does not exist.
    #[error("no exported function '{0}'")]
    NoSuchFunction(String),
    /// The export's result type is not a single i32 or i64.
    #[error("function '{0}' must return a single i32 or i64")]
    BadReturnType(String),
    /// The saved state cannot be restored into the instance's memory.
    #[error("saved state is {got} bytes but instance memory is {expected}")]
    StateSizeMismatch { expected: usize, got: usize },
}

/// Transaction verification failures. Any of these makes the enclosing
/// block unverifiable; guest-level failures (traps, non-zero returns) are
/// deliberately *not* represented here.
#[derive(Error, Debug)]
pub enum TxError {
    #[error("signature did not recover a valid sender")]
    BadSignature,
    #[error("expected nonce {expected} but got {got}")]
    BadNonce { expected: u64, got: u64 },
    #[error("unknown program {0}")]
    UnknownProgram(ProgramId),
    #[error("program {0} already deployed")]
    DuplicateProgram(ProgramId),
    #[error("invalid bytecode: {0}")]
    InvalidBytecode(String),
    #[error("program has no function '{0}'")]
    NoSuchFunction(String),
    #[error("exported function must return a single i32 or i64")]
    BadReturnType,
    #[error("argument length {len} exceeds cap {max}")]
    OversizedArgument { len: usize, max: usize },
    #[error("saved state is {got} bytes but instance memory is {expected}")]
    StateSizeMismatch { expected: usize, got: usize },
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Store(#[from] StateError),
}

/// Block verification failures.
#[derive(Error, Debug)]
pub enum BlockError {
    #[error("block has no transactions")]
    Empty,
    #[error("transaction {index}: {source}")]
    Tx {
        index: usize,
        #[source]
        source: TxError,
    },
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Store(#[from] StateError),
}

/// Top-level errors surfaced to the consensus driver.
#[derive(Error, Debug)]
pub enum ChainError {
    #[error(transparent)]
    Block(#[from] BlockError),
    #[error("unknown block {0}")]
    UnknownBlock(BlockId),
    #[error("mempool is empty")]
    EmptyMempool,
    #[error("mempool is full")]
    MempoolFull,
    #[error(transparent)]
    Store(#[from] StateError),
    #[error(transparent)]
    Codec(#[from] CodecError),
}
