// Path: crates/vm/src/lib.rs
//! The guest-bytecode engine: wasmtime wrapped behind the small contract
//! the transaction engine needs (validate, instantiate, invoke, snapshot),
//! plus the host ABI exported to guest programs.
//!
//! Determinism rules: guests see no clock, no randomness and no imports
//! beyond the host ABI; NaN canonicalization is enabled so float results
//! cannot differ across verifiers. The only nondeterministic edge is the
//! wall-clock deadline, which manifests as a trap and is contained as an
//! unsuccessful invocation.

mod engine;
mod host;
mod instance;

pub use engine::WasmEngine;
pub use host::AbiContext;
pub use instance::{Outcome, ProgramInstance};
