// Path: crates/chain/src/mempool.rs

use std::collections::VecDeque;
use std::sync::mpsc::{channel, Receiver, Sender};

use kiln_tx::SignedTransaction;
use kiln_types::error::ChainError;
use parking_lot::Mutex;

/// Signals from the mempool to whoever drives block production.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainEvent {
    /// At least one transaction is pending; a block can be built.
    BlockReady,
}

/// A bounded FIFO of pending signed transactions.
///
/// No deduplication and no priority: blocks drain in insertion order.
/// This is the one piece of state shared with concurrent RPC handlers,
/// hence the mutex; everything downstream is single-threaded.
pub struct Mempool {
    txs: Mutex<VecDeque<SignedTransaction>>,
    capacity: usize,
    notify: Sender<ChainEvent>,
}

impl Mempool {
    /// Create a mempool and the event channel its owner listens on.
    pub fn new(capacity: usize) -> (Self, Receiver<ChainEvent>) {
        let (notify, events) = channel();
        (
            Self {
                txs: Mutex::new(VecDeque::new()),
                capacity,
                notify,
            },
            events,
        )
    }

    /// Append to the tail and raise `BlockReady`.
    pub fn append(&self, tx: SignedTransaction) -> Result<(), ChainError> {
        {
            let mut txs = self.txs.lock();
            if txs.len() >= self.capacity {
                return Err(ChainError::MempoolFull);
            }
            txs.push_back(tx);
        }
        // The receiver may be gone during shutdown; nothing to do then.
        let _ = self.notify.send(ChainEvent::BlockReady);
        Ok(())
    }

    /// Remove and return up to `n` transactions from the head.
    pub fn drain(&self, n: usize) -> Vec<SignedTransaction> {
        let mut txs = self.txs.lock();
        let n = n.min(txs.len());
        txs.drain(..n).collect()
    }

    pub fn len(&self) -> usize {
        self.txs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_crypto::Keypair;

    fn tx(nonce: u64) -> SignedTransaction {
        let keypair = Keypair::generate();
        SignedTransaction::deploy(&keypair, vec![1, 2, 3], nonce).unwrap()
    }

    #[test]
    fn fifo_order_and_signal() {
        let (pool, events) = Mempool::new(8);
        let first = tx(1);
        let second = tx(2);
        pool.append(first.clone()).unwrap();
        pool.append(second.clone()).unwrap();

        assert_eq!(events.try_recv().unwrap(), ChainEvent::BlockReady);
        assert_eq!(events.try_recv().unwrap(), ChainEvent::BlockReady);

        let drained = pool.drain(10);
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].id(), first.id());
        assert_eq!(drained[1].id(), second.id());
        assert!(pool.is_empty());
    }

    #[test]
    fn capacity_is_enforced() {
        let (pool, _events) = Mempool::new(1);
        pool.append(tx(1)).unwrap();
        assert!(matches!(pool.append(tx(1)), Err(ChainError::MempoolFull)));
    }

    #[test]
    fn drain_takes_at_most_n() {
        let (pool, _events) = Mempool::new(8);
        for nonce in 1..=3 {
            pool.append(tx(nonce)).unwrap();
        }
        assert_eq!(pool.drain(2).len(), 2);
        assert_eq!(pool.len(), 1);
    }
}
