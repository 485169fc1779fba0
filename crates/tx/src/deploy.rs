// Path: crates/tx/src/deploy.rs
//! Verification of deploy transactions.

use kiln_state::Overlay;
use kiln_types::app::{DeployTx, Receipt};
use kiln_types::error::TxError;
use kiln_vm::WasmEngine;

use crate::registry;
use crate::signed::SignedTransaction;

pub(crate) fn verify_syntactic(
    signed: &SignedTransaction,
    tx: &DeployTx,
    engine: &WasmEngine,
) -> Result<(), TxError> {
    if tx.contract_bytes.is_empty() {
        return Err(TxError::InvalidBytecode("empty bytecode".into()));
    }
    if signed.sender().is_zero() {
        return Err(TxError::BadSignature);
    }
    if tx.sender_nonce == 0 {
        return Err(TxError::BadNonce {
            expected: 1,
            got: 0,
        });
    }
    if !engine.validate(&tx.contract_bytes) {
        return Err(TxError::InvalidBytecode(
            "bytecode failed module validation".into(),
        ));
    }
    Ok(())
}

/// Register the program under this transaction's id: bytecode, an empty
/// state image and a successful receipt. Nonce discipline is identical to
/// invoke.
pub(crate) fn verify_semantic(
    signed: &SignedTransaction,
    tx: &DeployTx,
    overlay: &Overlay,
) -> Result<(), TxError> {
    let mut overlay = overlay.clone();
    registry::advance_nonce(&mut overlay, signed.sender(), tx.sender_nonce)?;

    let program_id = signed.id();
    if registry::program_code(&overlay, &program_id)?.is_some() {
        return Err(TxError::DuplicateProgram(program_id));
    }

    registry::put_program_code(&mut overlay, &program_id, &tx.contract_bytes)?;
    registry::put_program_state(&mut overlay, &program_id, &[])?;
    registry::put_receipt(
        &mut overlay,
        &program_id,
        &Receipt {
            tx: signed.tx().clone(),
            invocation_successful: true,
            return_value: Vec::new(),
        },
    )?;

    tracing::info!(
        target: "tx",
        program = %program_id,
        sender = %signed.sender(),
        bytes = tx.contract_bytes.len(),
        "program deployed"
    );
    Ok(())
}
