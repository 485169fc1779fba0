// Path: crates/program-sdk/src/lib.rs
//! Guest-side bindings to the kiln host ABI.
//!
//! Programs compile to `wasm32-unknown-unknown`, export functions
//! returning i32 (0 = success) and talk to the chain through the seven
//! `env` imports wrapped here. Values are fetched in two steps (size the
//! buffer with `dbGetValueLen`, then copy with `dbGet`) so the wrappers
//! never guess at lengths.
//!
//! ```ignore
//! #[no_mangle]
//! pub extern "C" fn run() -> i32 {
//!     let Some(args) = kiln_program_sdk::args() else { return 1 };
//!     kiln_program_sdk::db_put(b"last_args", &args);
//!     kiln_program_sdk::set_return(&args);
//!     0
//! }
//! ```

#![cfg(target_arch = "wasm32")]

const ADDRESS_LEN: usize = 20;

mod host {
    #[allow(non_snake_case)]
    extern "C" {
        pub fn print(ptr: u32, len: u32);
        pub fn dbPut(key_ptr: u32, key_len: u32, value_ptr: u32, value_len: u32) -> i32;
        pub fn dbGet(key_ptr: u32, key_len: u32, value_ptr: u32) -> i32;
        pub fn dbGetValueLen(key_ptr: u32, key_len: u32) -> i32;
        pub fn getArgs(value_ptr: u32) -> i32;
        pub fn getSender(ptr: u32) -> i32;
        pub fn returnValue(value_ptr: u32, value_len: u32) -> i32;
    }
}

/// Log a message through the chain's logger.
pub fn log(message: &str) {
    unsafe { host::print(message.as_ptr() as u32, message.len() as u32) }
}

/// Store a key-value pair in the program's private keyspace. Returns
/// false when the host rejects the pair (size caps, store failure).
pub fn db_put(key: &[u8], value: &[u8]) -> bool {
    let status = unsafe {
        host::dbPut(
            key.as_ptr() as u32,
            key.len() as u32,
            value.as_ptr() as u32,
            value.len() as u32,
        )
    };
    status == 0
}

/// Fetch a value from the program's private keyspace.
pub fn db_get(key: &[u8]) -> Option<Vec<u8>> {
    let len = unsafe { host::dbGetValueLen(key.as_ptr() as u32, key.len() as u32) };
    if len < 0 {
        return None;
    }
    let mut value = vec![0u8; len as usize];
    let copied = unsafe {
        host::dbGet(
            key.as_ptr() as u32,
            key.len() as u32,
            value.as_ptr() as u32,
        )
    };
    if copied != len {
        return None;
    }
    Some(value)
}

/// The invocation's byte arguments.
pub fn args() -> Option<Vec<u8>> {
    // byte_args are capped at 64 KiB chain-side, so one fixed buffer
    // always fits.
    let mut buf = vec![0u8; 64 * 1024];
    let len = unsafe { host::getArgs(buf.as_ptr() as u32) };
    if len < 0 {
        return None;
    }
    buf.truncate(len as usize);
    Some(buf)
}

/// The 20-byte address that signed the invoking transaction.
pub fn sender() -> Option<[u8; ADDRESS_LEN]> {
    let buf = [0u8; ADDRESS_LEN];
    let status = unsafe { host::getSender(buf.as_ptr() as u32) };
    if status != 0 {
        return None;
    }
    Some(buf)
}

/// Stage bytes as the invocation's return value; the last call wins.
pub fn set_return(value: &[u8]) -> bool {
    let status = unsafe { host::returnValue(value.as_ptr() as u32, value.len() as u32) };
    status == 0
}
