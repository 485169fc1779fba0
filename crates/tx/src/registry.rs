// Path: crates/tx/src/registry.rs
//! Typed access to the chain's namespaced keyspaces: accounts, program
//! code and state, receipts.
//!
//! Accounts are synthesized at nonce 0 on first use and only persisted
//! once their nonce advances. All helpers are generic over [`StateAccess`]
//! so they work against the store, a block overlay or a scratch overlay
//! alike.

use kiln_state::StateAccess;
use kiln_types::app::{Account, Receipt};
use kiln_types::codec::{Decode, Encode};
use kiln_types::error::TxError;
use kiln_types::ids::{Address, ProgramId, TxId};
use kiln_types::keys;

/// Load an account, synthesizing `{address, nonce: 0}` if absent.
pub fn get_account<S: StateAccess + ?Sized>(
    state: &S,
    address: &Address,
) -> Result<Account, TxError> {
    match state.get(&keys::account_key(address))? {
        Some(bytes) => Ok(Account::from_bytes(&bytes)?),
        None => Ok(Account {
            address: *address,
            nonce: 0,
        }),
    }
}

pub fn put_account<S: StateAccess + ?Sized>(
    state: &mut S,
    account: &Account,
) -> Result<(), TxError> {
    state.put(&keys::account_key(&account.address), &account.to_bytes()?)?;
    Ok(())
}

/// Check that `declared` is exactly the sender's next unused nonce, then
/// advance and persist the account. Returns the updated account.
pub fn advance_nonce<S: StateAccess + ?Sized>(
    state: &mut S,
    sender: &Address,
    declared: u64,
) -> Result<Account, TxError> {
    let mut account = get_account(state, sender)?;
    let expected = account.nonce + 1;
    if declared != expected {
        return Err(TxError::BadNonce {
            expected,
            got: declared,
        });
    }
    account.nonce = expected;
    put_account(state, &account)?;
    Ok(account)
}

pub fn program_code<S: StateAccess + ?Sized>(
    state: &S,
    id: &ProgramId,
) -> Result<Option<Vec<u8>>, TxError> {
    Ok(state.get(&keys::program_code_key(id))?)
}

pub fn put_program_code<S: StateAccess + ?Sized>(
    state: &mut S,
    id: &ProgramId,
    bytecode: &[u8],
) -> Result<(), TxError> {
    state.put(&keys::program_code_key(id), bytecode)?;
    Ok(())
}

pub fn program_state<S: StateAccess + ?Sized>(
    state: &S,
    id: &ProgramId,
) -> Result<Option<Vec<u8>>, TxError> {
    Ok(state.get(&keys::program_state_key(id))?)
}

pub fn put_program_state<S: StateAccess + ?Sized>(
    state: &mut S,
    id: &ProgramId,
    snapshot: &[u8],
) -> Result<(), TxError> {
    state.put(&keys::program_state_key(id), snapshot)?;
    Ok(())
}

pub fn get_receipt<S: StateAccess + ?Sized>(
    state: &S,
    id: &TxId,
) -> Result<Option<Receipt>, TxError> {
    match state.get(&keys::receipt_key(id))? {
        Some(bytes) => Ok(Some(Receipt::from_bytes(&bytes)?)),
        None => Ok(None),
    }
}

pub fn put_receipt<S: StateAccess + ?Sized>(
    state: &mut S,
    id: &TxId,
    receipt: &Receipt,
) -> Result<(), TxError> {
    state.put(&keys::receipt_key(id), &receipt.to_bytes()?)?;
    Ok(())
}
