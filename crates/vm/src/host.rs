// Path: crates/vm/src/host.rs
//! The host ABI exported to guest programs.
//!
//! Seven functions under the `env` import module. Every pointer/length
//! pair coming out of the guest is validated (non-negative, no 32-bit
//! overflow, inside linear memory) before any byte is touched; a failed
//! check logs at error level and returns the function's failure sentinel
//! without modifying the program's keyspace or memory. Host return values
//! are decisions for the guest; they never abort execution.

use kiln_state::{Overlay, StateAccess, View};
use kiln_types::config::VmLimits;
use kiln_types::ids::{Address, TxId, ADDRESS_LEN};
use kiln_types::keys::{ARGS_KEY, RETURN_KEY, SENDER_KEY};
use wasmtime::{Caller, Linker, Memory, StoreLimits};

/// Per-invocation context reachable from every host function. Bound into
/// the store's user data before the instance runs; no process globals.
pub struct AbiContext {
    /// The program's private keyspace, prefix-scoped into the block's
    /// staged overlay.
    pub program_db: View<Overlay>,
    /// ID of the transaction driving this invocation.
    pub tx_id: TxId,
    /// Recovered sender of that transaction.
    pub sender: Address,
}

/// Store data for one guest instance.
pub(crate) struct HostState {
    pub(crate) ctx: AbiContext,
    pub(crate) memory: Option<Memory>,
    pub(crate) limits: StoreLimits,
    pub(crate) caps: VmLimits,
}

/// Bind the host ABI into `linker`.
pub(crate) fn add_host_imports(linker: &mut Linker<HostState>) -> wasmtime::Result<()> {
    linker.func_wrap("env", "print", host_print)?;
    linker.func_wrap("env", "dbPut", host_db_put)?;
    linker.func_wrap("env", "dbGet", host_db_get)?;
    linker.func_wrap("env", "dbGetValueLen", host_db_get_value_len)?;
    linker.func_wrap("env", "getArgs", host_get_args)?;
    linker.func_wrap("env", "getSender", host_get_sender)?;
    linker.func_wrap("env", "returnValue", host_return_value)?;
    Ok(())
}

/// Validated byte range inside a linear memory of `mem_len` bytes.
fn checked_range(mem_len: usize, ptr: i32, len: i32) -> Option<std::ops::Range<usize>> {
    if ptr < 0 || len < 0 {
        return None;
    }
    let end = (ptr as u32).checked_add(len as u32)?;
    if end as usize > mem_len {
        return None;
    }
    Some(ptr as usize..end as usize)
}

fn bound_memory(caller: &Caller<'_, HostState>, what: &str) -> Option<Memory> {
    let memory = caller.data().memory;
    if memory.is_none() {
        tracing::error!(target: "abi", "{what} failed: memory not bound");
    }
    memory
}

/// `print(ptr, len)`: log bytes from guest memory, as UTF-8 when valid.
fn host_print(caller: Caller<'_, HostState>, ptr: i32, len: i32) {
    let Some(memory) = bound_memory(&caller, "print") else {
        return;
    };
    let data = memory.data(&caller);
    let Some(range) = checked_range(data.len(), ptr, len) else {
        tracing::error!(target: "abi", "print failed: index out of bounds");
        return;
    };
    let bytes = &data[range];
    let tx = caller.data().ctx.tx_id;
    match std::str::from_utf8(bytes) {
        Ok(text) => tracing::info!(target: "abi", tx = %tx, "guest print: {text}"),
        Err(_) => {
            tracing::info!(target: "abi", tx = %tx, "guest print (raw): {}", hex::encode(bytes))
        }
    }
}

/// `dbPut(kPtr, kLen, vPtr, vLen) -> i32`: 0 on success, 1 on failure.
fn host_db_put(
    mut caller: Caller<'_, HostState>,
    key_ptr: i32,
    key_len: i32,
    value_ptr: i32,
    value_len: i32,
) -> i32 {
    let Some(memory) = bound_memory(&caller, "dbPut") else {
        return 1;
    };
    let caps = &caller.data().caps;
    if key_len > caps.max_db_key as i32 || value_len > caps.max_db_value as i32 {
        tracing::error!(target: "abi", "dbPut failed: key or value exceeds size cap");
        return 1;
    }

    let data = memory.data(&caller);
    let (Some(key_range), Some(value_range)) = (
        checked_range(data.len(), key_ptr, key_len),
        checked_range(data.len(), value_ptr, value_len),
    ) else {
        tracing::error!(target: "abi", "dbPut failed: index out of bounds");
        return 1;
    };
    let key = data[key_range].to_vec();
    let value = data[value_range].to_vec();

    tracing::trace!(
        target: "abi",
        key = %hex::encode(&key),
        value = %hex::encode(&value),
        "dbPut"
    );
    match caller.data_mut().ctx.program_db.put(&key, &value) {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(target: "abi", "dbPut failed: {e}");
            1
        }
    }
}

/// `dbGet(kPtr, kLen, vPtr) -> i32`: copies the value into guest memory
/// at `vPtr` and returns its length, or -1 on failure. The guest is
/// responsible for sizing the destination (see `dbGetValueLen`).
fn host_db_get(mut caller: Caller<'_, HostState>, key_ptr: i32, key_len: i32, value_ptr: i32) -> i32 {
    let Some(memory) = bound_memory(&caller, "dbGet") else {
        return -1;
    };
    let data = memory.data(&caller);
    let mem_len = data.len();
    let Some(key_range) = checked_range(mem_len, key_ptr, key_len) else {
        tracing::error!(target: "abi", "dbGet failed: key index out of bounds");
        return -1;
    };
    let key = data[key_range].to_vec();

    let value = match caller.data().ctx.program_db.get(&key) {
        Ok(Some(value)) => value,
        Ok(None) => {
            tracing::error!(target: "abi", key = %hex::encode(&key), "dbGet failed: key not found");
            return -1;
        }
        Err(e) => {
            tracing::error!(target: "abi", "dbGet failed: {e}");
            return -1;
        }
    };

    if checked_range(mem_len, value_ptr, value.len() as i32).is_none() {
        tracing::error!(target: "abi", "dbGet failed: value index out of bounds");
        return -1;
    }
    if let Err(e) = memory.write(&mut caller, value_ptr as usize, &value) {
        tracing::error!(target: "abi", "dbGet failed: {e}");
        return -1;
    }
    tracing::trace!(target: "abi", key = %hex::encode(&key), len = value.len(), "dbGet");
    value.len() as i32
}

/// `dbGetValueLen(kPtr, kLen) -> i32`: length of the stored value, or -1.
fn host_db_get_value_len(caller: Caller<'_, HostState>, key_ptr: i32, key_len: i32) -> i32 {
    let Some(memory) = bound_memory(&caller, "dbGetValueLen") else {
        return -1;
    };
    let data = memory.data(&caller);
    let Some(key_range) = checked_range(data.len(), key_ptr, key_len) else {
        tracing::error!(target: "abi", "dbGetValueLen failed: key index out of bounds");
        return -1;
    };
    let key = data[key_range].to_vec();

    match caller.data().ctx.program_db.get(&key) {
        Ok(Some(value)) => value.len() as i32,
        Ok(None) => -1,
        Err(e) => {
            tracing::error!(target: "abi", "dbGetValueLen failed: {e}");
            -1
        }
    }
}

/// `getArgs(ptr) -> i32`: copy the invocation byte arguments into guest
/// memory and return their length, or -1 on failure.
fn host_get_args(mut caller: Caller<'_, HostState>, ptr: i32) -> i32 {
    let Some(memory) = bound_memory(&caller, "getArgs") else {
        return -1;
    };
    let args = match caller.data().ctx.program_db.get(ARGS_KEY) {
        Ok(value) => value.unwrap_or_default(),
        Err(e) => {
            tracing::error!(target: "abi", "getArgs failed: {e}");
            return -1;
        }
    };

    let mem_len = memory.data_size(&caller);
    if checked_range(mem_len, ptr, args.len() as i32).is_none() {
        tracing::error!(target: "abi", "getArgs failed: index out of bounds");
        return -1;
    }
    if let Err(e) = memory.write(&mut caller, ptr as usize, &args) {
        tracing::error!(target: "abi", "getArgs failed: {e}");
        return -1;
    }
    args.len() as i32
}

/// `getSender(ptr) -> i32`: write the 20-byte sender address into guest
/// memory; 0 on success, -1 on failure.
fn host_get_sender(mut caller: Caller<'_, HostState>, ptr: i32) -> i32 {
    let Some(memory) = bound_memory(&caller, "getSender") else {
        return -1;
    };
    let sender = match caller.data().ctx.program_db.get(SENDER_KEY) {
        Ok(Some(value)) => value,
        Ok(None) => {
            tracing::error!(target: "abi", "getSender failed: sender not seeded");
            return -1;
        }
        Err(e) => {
            tracing::error!(target: "abi", "getSender failed: {e}");
            return -1;
        }
    };
    if sender.len() != ADDRESS_LEN {
        tracing::error!(
            target: "abi",
            "getSender failed: expected {ADDRESS_LEN} bytes but got {}",
            sender.len()
        );
        return -1;
    }

    let mem_len = memory.data_size(&caller);
    if checked_range(mem_len, ptr, ADDRESS_LEN as i32).is_none() {
        tracing::error!(target: "abi", "getSender failed: index out of bounds");
        return -1;
    }
    if let Err(e) = memory.write(&mut caller, ptr as usize, &sender) {
        tracing::error!(target: "abi", "getSender failed: {e}");
        return -1;
    }
    0
}

/// `returnValue(ptr, len) -> i32`: stage bytes as the invocation's
/// return value; 0 on success, -1 on failure. The last call wins.
fn host_return_value(mut caller: Caller<'_, HostState>, value_ptr: i32, value_len: i32) -> i32 {
    let Some(memory) = bound_memory(&caller, "returnValue") else {
        return -1;
    };
    if value_len > caller.data().caps.max_db_value as i32 {
        tracing::error!(target: "abi", "returnValue failed: value exceeds size cap");
        return -1;
    }
    let data = memory.data(&caller);
    let Some(range) = checked_range(data.len(), value_ptr, value_len) else {
        tracing::error!(target: "abi", "returnValue failed: index out of bounds");
        return -1;
    };
    let value = data[range].to_vec();

    match caller.data_mut().ctx.program_db.put(RETURN_KEY, &value) {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(target: "abi", "returnValue failed: {e}");
            -1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checked_range_accepts_exact_fit() {
        assert_eq!(checked_range(8, 0, 8), Some(0..8));
        assert_eq!(checked_range(8, 8, 0), Some(8..8));
    }

    #[test]
    fn checked_range_rejects_negative_and_out_of_bounds() {
        assert_eq!(checked_range(8, -1, 4), None);
        assert_eq!(checked_range(8, 4, -1), None);
        assert_eq!(checked_range(8, 0, 9), None);
        assert_eq!(checked_range(100, i32::MAX, i32::MAX), None);
    }
}
