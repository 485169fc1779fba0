// Path: crates/tx/src/invoke.rs
//! Verification of invoke transactions: the deterministic execution
//! protocol.

use kiln_state::{Overlay, StateAccess};
use kiln_types::app::{InvokeTx, Receipt};
use kiln_types::config::VmLimits;
use kiln_types::error::{TxError, VmError};
use kiln_types::keys::{program_view_prefix, ARGS_KEY, RETURN_KEY, SENDER_KEY};
use kiln_vm::{AbiContext, Outcome, WasmEngine};

use crate::registry;
use crate::signed::SignedTransaction;

pub(crate) fn verify_syntactic(
    signed: &SignedTransaction,
    tx: &InvokeTx,
    limits: &VmLimits,
) -> Result<(), TxError> {
    if tx.function.is_empty() {
        return Err(TxError::NoSuchFunction(String::new()));
    }
    if tx.byte_args.len() > limits.max_byte_args {
        return Err(TxError::OversizedArgument {
            len: tx.byte_args.len(),
            max: limits.max_byte_args,
        });
    }
    if tx.scalar_args.len() > limits.max_scalar_args {
        return Err(TxError::OversizedArgument {
            len: tx.scalar_args.len(),
            max: limits.max_scalar_args,
        });
    }
    if signed.sender().is_zero() {
        return Err(TxError::BadSignature);
    }
    Ok(())
}

/// Run the invocation against the block's staged overlay.
///
/// The nonce advance and the receipt go straight to the block overlay.
/// Everything the guest can observe or write (the seeded ABI keys, its
/// own `dbPut`s, the new memory snapshot) happens inside a scratch
/// overlay stacked on top, which commits only when the guest reports
/// success. A trap or non-zero return therefore leaves exactly two
/// durable effects: the advanced nonce and an unsuccessful receipt.
pub(crate) fn verify_semantic(
    signed: &SignedTransaction,
    tx: &InvokeTx,
    overlay: &Overlay,
    engine: &WasmEngine,
) -> Result<(), TxError> {
    let mut block = overlay.clone();
    registry::advance_nonce(&mut block, signed.sender(), tx.sender_nonce)?;

    let code = registry::program_code(&block, &tx.program_id)?
        .ok_or(TxError::UnknownProgram(tx.program_id))?;
    let saved = registry::program_state(&block, &tx.program_id)?
        .ok_or(TxError::UnknownProgram(tx.program_id))?;

    let scratch = overlay.overlay();
    let mut program_db = scratch.prefix(program_view_prefix(&tx.program_id));
    program_db.put(ARGS_KEY, &tx.byte_args)?;
    program_db.put(SENDER_KEY, signed.sender().as_bytes())?;
    // A stale return value from an earlier invocation must never leak
    // into this receipt.
    program_db.delete(RETURN_KEY)?;

    let success = {
        let ctx = AbiContext {
            program_db: program_db.clone(),
            tx_id: signed.id(),
            sender: *signed.sender(),
        };
        let mut instance = engine.instantiate(&code, ctx).map_err(vm_to_tx)?;
        instance.restore_state(&saved).map_err(vm_to_tx)?;

        match instance.invoke(&tx.function, &tx.scalar_args).map_err(vm_to_tx)? {
            Outcome::Returned(value) => {
                tracing::debug!(
                    target: "tx",
                    tx = %signed.id(),
                    function = %tx.function,
                    value,
                    "guest returned"
                );
                let success = value == 0;
                if success {
                    let snapshot = instance.snapshot_memory();
                    let mut scratch_writer = scratch.clone();
                    registry::put_program_state(&mut scratch_writer, &tx.program_id, &snapshot)?;
                }
                success
            }
            Outcome::Trapped(reason) => {
                tracing::error!(
                    target: "tx",
                    tx = %signed.id(),
                    function = %tx.function,
                    %reason,
                    "guest trapped"
                );
                false
            }
        }
        // The instance is dropped here, before the scratch overlay is
        // resolved and well before verification returns.
    };

    let return_value = program_db.get(RETURN_KEY)?.unwrap_or_default();
    if success {
        scratch.commit()?;
    } else {
        scratch.discard()?;
    }

    registry::put_receipt(
        &mut block,
        &signed.id(),
        &Receipt {
            tx: signed.tx().clone(),
            invocation_successful: success,
            return_value,
        },
    )?;

    tracing::info!(
        target: "tx",
        tx = %signed.id(),
        program = %tx.program_id,
        function = %tx.function,
        success,
        "invocation verified"
    );
    Ok(())
}

fn vm_to_tx(e: VmError) -> TxError {
    match e {
        VmError::NoSuchFunction(name) => TxError::NoSuchFunction(name),
        VmError::BadReturnType(_) => TxError::BadReturnType,
        VmError::StateSizeMismatch { expected, got } => {
            TxError::StateSizeMismatch { expected, got }
        }
        VmError::InvalidModule(msg) | VmError::Initialization(msg) => {
            TxError::InvalidBytecode(msg)
        }
    }
}
