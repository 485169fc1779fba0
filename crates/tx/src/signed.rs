// Path: crates/tx/src/signed.rs

use kiln_crypto::{recover, sha256, Keypair};
use kiln_state::Overlay;
use kiln_types::app::{DeployTx, InvokeTx, ScalarArg, Transaction};
use kiln_types::codec::{Decode, Encode};
use kiln_types::error::TxError;
use kiln_types::ids::{Address, ProgramId, TxId, SIGNATURE_LEN};
use kiln_vm::WasmEngine;

use crate::{deploy, invoke};

/// A wire transaction plus the fields derived from it exactly once: its
/// canonical signed encoding, its id (SHA-256 of those bytes) and the
/// sender recovered from the signature over the unsigned body.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    tx: Transaction,
    bytes: Vec<u8>,
    id: TxId,
    sender: Address,
}

impl SignedTransaction {
    /// Derive the id and sender for a wire transaction. Fails with
    /// `BadSignature` when no public key can be recovered.
    pub fn from_tx(tx: Transaction) -> Result<Self, TxError> {
        let bytes = tx.to_bytes()?;
        let id = TxId::from(sha256(&bytes));
        let unsigned = tx.unsigned_bytes()?;
        let sender = recover(&unsigned, tx.signature()).map_err(|_| TxError::BadSignature)?;
        Ok(Self {
            tx,
            bytes,
            id,
            sender,
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TxError> {
        Self::from_tx(Transaction::from_bytes(bytes)?)
    }

    /// Build and sign a deploy transaction.
    pub fn deploy(
        keypair: &Keypair,
        contract_bytes: Vec<u8>,
        sender_nonce: u64,
    ) -> Result<Self, TxError> {
        let mut tx = Transaction::Deploy(DeployTx {
            contract_bytes,
            sender_nonce,
            signature: [0u8; SIGNATURE_LEN],
        });
        sign_in_place(keypair, &mut tx)?;
        Self::from_tx(tx)
    }

    /// Build and sign an invoke transaction.
    pub fn invoke(
        keypair: &Keypair,
        program_id: ProgramId,
        function: impl Into<String>,
        scalar_args: Vec<ScalarArg>,
        byte_args: Vec<u8>,
        sender_nonce: u64,
    ) -> Result<Self, TxError> {
        let mut tx = Transaction::Invoke(InvokeTx {
            program_id,
            function: function.into(),
            scalar_args,
            byte_args,
            sender_nonce,
            signature: [0u8; SIGNATURE_LEN],
        });
        sign_in_place(keypair, &mut tx)?;
        Self::from_tx(tx)
    }

    pub fn tx(&self) -> &Transaction {
        &self.tx
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn id(&self) -> TxId {
        self.id
    }

    pub fn sender(&self) -> &Address {
        &self.sender
    }

    /// Stateless validity checks.
    pub fn verify_syntactic(&self, engine: &WasmEngine) -> Result<(), TxError> {
        match &self.tx {
            Transaction::Deploy(tx) => deploy::verify_syntactic(self, tx, engine),
            Transaction::Invoke(tx) => invoke::verify_syntactic(self, tx, engine.limits()),
        }
    }

    /// Apply this transaction to `overlay`, verifying the state
    /// transition. All writes go to the overlay; nothing touches the
    /// store directly.
    pub fn verify_semantic(&self, overlay: &Overlay, engine: &WasmEngine) -> Result<(), TxError> {
        match &self.tx {
            Transaction::Deploy(tx) => deploy::verify_semantic(self, tx, overlay),
            Transaction::Invoke(tx) => invoke::verify_semantic(self, tx, overlay, engine),
        }
    }
}

fn sign_in_place(keypair: &Keypair, tx: &mut Transaction) -> Result<(), TxError> {
    let unsigned = tx.unsigned_bytes()?;
    let signature = keypair.sign(&unsigned).map_err(|_| TxError::BadSignature)?;
    match tx {
        Transaction::Deploy(t) => t.signature = signature,
        Transaction::Invoke(t) => t.signature = signature,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_fields_survive_a_wire_round_trip() {
        let keypair = Keypair::generate();
        let signed = SignedTransaction::deploy(&keypair, b"\0asm".to_vec(), 1).unwrap();

        let reparsed = SignedTransaction::from_bytes(signed.bytes()).unwrap();
        assert_eq!(reparsed.id(), signed.id());
        assert_eq!(reparsed.sender(), signed.sender());
        assert_eq!(reparsed.sender(), &keypair.address());
    }

    #[test]
    fn tampering_changes_the_sender() {
        let keypair = Keypair::generate();
        let signed =
            SignedTransaction::invoke(&keypair, ProgramId::ZERO, "run", vec![], vec![], 1).unwrap();

        let mut tx = signed.tx().clone();
        if let Transaction::Invoke(t) = &mut tx {
            t.sender_nonce = 99;
        }
        // A tampered body either fails recovery outright or recovers a
        // different address; it must never keep the original sender.
        match SignedTransaction::from_tx(tx) {
            Ok(forged) => assert_ne!(forged.sender(), signed.sender()),
            Err(e) => assert!(matches!(e, TxError::BadSignature)),
        }
    }
}
