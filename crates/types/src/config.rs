// Path: crates/types/src/config.rs
//! Runtime limits and chain configuration.

use std::time::Duration;

/// Execution and argument limits for guest programs.
///
/// These are consensus-relevant: every verifier must run with the same
/// values.
#[derive(Debug, Clone)]
pub struct VmLimits {
    /// Maximum length of a transaction's `byte_args`.
    pub max_byte_args: usize,
    /// Maximum number of scalar arguments to an exported function.
    pub max_scalar_args: usize,
    /// Maximum key length accepted by `dbPut`.
    pub max_db_key: usize,
    /// Maximum value length accepted by `dbPut` and `returnValue`.
    pub max_db_value: usize,
    /// Cap on a guest instance's linear memory, enforced by the engine.
    pub max_memory_bytes: usize,
    /// Wall-clock deadline for a single guest invocation. Exceeding it
    /// traps the guest, which is contained as an unsuccessful invocation.
    pub deadline: Duration,
}

impl Default for VmLimits {
    fn default() -> Self {
        Self {
            max_byte_args: 64 * 1024,
            max_scalar_args: 16,
            max_db_key: 1024,
            max_db_value: 1024,
            max_memory_bytes: 16 * 1024 * 1024,
            deadline: Duration::from_secs(1),
        }
    }
}

/// Block-building and mempool configuration.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// Maximum number of transactions drained into one candidate block.
    pub max_block_txs: usize,
    /// Mempool capacity; `append` fails beyond this.
    pub mempool_capacity: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            max_block_txs: 64,
            mempool_capacity: 1024,
        }
    }
}
