// Path: crates/chain/src/processor.rs

use std::sync::Arc;

use kiln_crypto::sha256;
use kiln_state::{Overlay, StateAccess, StateStore};
use kiln_tx::SignedTransaction;
use kiln_types::app::Block;
use kiln_types::codec::{Decode, Encode};
use kiln_types::config::ChainConfig;
use kiln_types::error::{BlockError, ChainError, StateError};
use kiln_types::ids::BlockId;
use kiln_types::keys;
use kiln_vm::WasmEngine;

use crate::mempool::Mempool;

/// Consensus decision recorded for a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
    Accepted,
    Rejected,
}

impl BlockStatus {
    fn to_byte(self) -> u8 {
        match self {
            BlockStatus::Accepted => 1,
            BlockStatus::Rejected => 2,
        }
    }

    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(BlockStatus::Accepted),
            2 => Some(BlockStatus::Rejected),
            _ => None,
        }
    }
}

/// A candidate block plus everything derived from it: canonical bytes,
/// id, initialized transactions and the staged overlay its verification
/// writes into. The overlay lives until consensus accepts or rejects the
/// block.
pub struct TrackedBlock {
    block: Block,
    bytes: Vec<u8>,
    id: BlockId,
    txs: Vec<SignedTransaction>,
    overlay: Overlay,
}

impl TrackedBlock {
    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn parent_id(&self) -> BlockId {
        self.block.parent_id
    }

    pub fn block(&self) -> &Block {
        &self.block
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn txs(&self) -> &[SignedTransaction] {
        &self.txs
    }

    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }
}

/// Builds, verifies and settles blocks. Consensus policy lives outside:
/// this type only supplies the primitives an external engine drives
/// serially.
pub struct BlockProcessor {
    store: StateStore,
    engine: Arc<WasmEngine>,
    mempool: Arc<Mempool>,
    config: ChainConfig,
    preferred: BlockId,
}

impl BlockProcessor {
    /// Open the chain over `store`, bootstrapping `genesis` as the first
    /// accepted block if the store is empty.
    pub fn new(
        store: StateStore,
        engine: Arc<WasmEngine>,
        mempool: Arc<Mempool>,
        config: ChainConfig,
        genesis: Block,
    ) -> Result<Self, ChainError> {
        let preferred = match store.get(&keys::last_accepted_key())? {
            Some(bytes) => decode_block_id(&bytes)?,
            None => {
                let bytes = genesis.to_bytes().map_err(BlockError::Codec)?;
                let id = BlockId::from(sha256(&bytes));
                let mut store = store.clone();
                store.put(&keys::block_key(&id), &bytes)?;
                store.put(
                    &keys::block_status_key(&id),
                    &[BlockStatus::Accepted.to_byte()],
                )?;
                store.put(&keys::last_accepted_key(), id.as_bytes())?;
                store.commit()?;
                tracing::info!(target: "chain", block = %id, "genesis bootstrapped");
                id
            }
        };

        Ok(Self {
            store,
            engine,
            mempool,
            config,
            preferred,
        })
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// ID of the block new candidates build on.
    pub fn preferred(&self) -> BlockId {
        self.preferred
    }

    /// Drain pending transactions into a candidate block on top of the
    /// preferred block, persist it and allocate its staged overlay.
    pub fn build_block(&mut self) -> Result<TrackedBlock, ChainError> {
        let txs = self.mempool.drain(self.config.max_block_txs);
        if txs.is_empty() {
            return Err(ChainError::EmptyMempool);
        }

        let block = Block {
            parent_id: self.preferred,
            transactions: txs.iter().map(|tx| tx.tx().clone()).collect(),
        };
        let bytes = block.to_bytes().map_err(BlockError::Codec)?;
        let id = BlockId::from(sha256(&bytes));

        let mut store = self.store.clone();
        store.put(&keys::block_key(&id), &bytes)?;
        store.commit()?;

        tracing::info!(
            target: "chain",
            block = %id,
            parent = %self.preferred,
            txs = txs.len(),
            "candidate block built"
        );
        Ok(TrackedBlock {
            block,
            bytes,
            id,
            txs,
            overlay: self.store.overlay(),
        })
    }

    /// Decode a block received from a peer and derive its transactions
    /// and overlay.
    pub fn parse_block(&self, bytes: &[u8]) -> Result<TrackedBlock, ChainError> {
        let block = Block::from_bytes(bytes).map_err(BlockError::Codec)?;
        let id = BlockId::from(sha256(bytes));

        let mut txs = Vec::with_capacity(block.transactions.len());
        for (index, tx) in block.transactions.iter().cloned().enumerate() {
            let signed = SignedTransaction::from_tx(tx)
                .map_err(|source| BlockError::Tx { index, source })?;
            txs.push(signed);
        }

        Ok(TrackedBlock {
            block,
            bytes: bytes.to_vec(),
            id,
            txs,
            overlay: self.store.overlay(),
        })
    }

    /// Verify every transaction, first syntactically, then semantically
    /// against the block's overlay, in declared order and fail-fast. Does
    /// not resolve the overlay: a failed block is still valid to reject.
    pub fn verify(&self, block: &TrackedBlock) -> Result<(), ChainError> {
        if block.txs.is_empty() {
            return Err(BlockError::Empty.into());
        }

        for (index, tx) in block.txs.iter().enumerate() {
            tx.verify_syntactic(&self.engine)
                .map_err(|source| BlockError::Tx { index, source })?;
        }

        for (index, tx) in block.txs.iter().enumerate() {
            if let Err(source) = tx.verify_semantic(&block.overlay, &self.engine) {
                tracing::error!(
                    target: "chain",
                    block = %block.id,
                    index,
                    error = %source,
                    "block verification failed"
                );
                return Err(BlockError::Tx { index, source }.into());
            }
        }
        Ok(())
    }

    /// Commit the block's overlay, record the decision and flush the
    /// store atomically. The block becomes the preferred parent.
    pub fn accept(&mut self, block: &TrackedBlock) -> Result<(), ChainError> {
        block.overlay.commit()?;

        let mut store = self.store.clone();
        store.put(&keys::block_key(&block.id), &block.bytes)?;
        store.put(
            &keys::block_status_key(&block.id),
            &[BlockStatus::Accepted.to_byte()],
        )?;
        store.put(&keys::last_accepted_key(), block.id.as_bytes())?;
        store.commit()?;

        self.preferred = block.id;
        tracing::info!(target: "chain", block = %block.id, "block accepted");
        Ok(())
    }

    /// Discard the block's overlay and record the rejection. State is
    /// left exactly as it was before verification.
    pub fn reject(&mut self, block: &TrackedBlock) -> Result<(), ChainError> {
        block.overlay.discard()?;

        let mut store = self.store.clone();
        store.put(&keys::block_key(&block.id), &block.bytes)?;
        store.put(
            &keys::block_status_key(&block.id),
            &[BlockStatus::Rejected.to_byte()],
        )?;
        store.commit()?;

        tracing::info!(target: "chain", block = %block.id, "block rejected");
        Ok(())
    }

    pub fn get_block(&self, id: &BlockId) -> Result<Option<Block>, ChainError> {
        match self.store.get(&keys::block_key(id))? {
            Some(bytes) => Ok(Some(Block::from_bytes(&bytes).map_err(BlockError::Codec)?)),
            None => Ok(None),
        }
    }

    pub fn status(&self, id: &BlockId) -> Result<Option<BlockStatus>, ChainError> {
        match self.store.get(&keys::block_status_key(id))? {
            Some(bytes) => Ok(bytes.first().copied().and_then(BlockStatus::from_byte)),
            None => Ok(None),
        }
    }

    pub fn last_accepted(&self) -> Result<BlockId, ChainError> {
        let bytes = self
            .store
            .get(&keys::last_accepted_key())?
            .ok_or_else(|| StateError::Backend("last-accepted pointer missing".into()))?;
        decode_block_id(&bytes)
    }
}

fn decode_block_id(bytes: &[u8]) -> Result<BlockId, ChainError> {
    let raw: [u8; 32] = bytes
        .try_into()
        .map_err(|_| StateError::Backend("malformed block id in metadata".into()))?;
    Ok(BlockId::from(raw))
}
