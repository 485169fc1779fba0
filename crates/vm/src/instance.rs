// Path: crates/vm/src/instance.rs

use kiln_types::app::ScalarArg;
use kiln_types::error::VmError;
use wasmtime::{Instance, Memory, Store, Val, ValType};

use crate::host::HostState;

/// Result of driving an exported function to completion.
#[derive(Debug)]
pub enum Outcome {
    /// The function returned normally. By guest convention 0 means
    /// success; anything else means the invocation failed.
    Returned(i64),
    /// The guest trapped: out-of-bounds access, unreachable, stack
    /// overflow, deadline or memory-cap exceeded. Contained by the
    /// caller, never a verification error.
    Trapped(String),
}

/// A single-use guest instance bound to one invocation's context.
pub struct ProgramInstance {
    store: Store<HostState>,
    instance: Instance,
    memory: Memory,
}

impl ProgramInstance {
    pub(crate) fn new(store: Store<HostState>, instance: Instance, memory: Memory) -> Self {
        Self {
            store,
            instance,
            memory,
        }
    }

    /// Size of the instance's linear memory in bytes.
    pub fn memory_size(&self) -> usize {
        self.memory.data_size(&self.store)
    }

    /// Load a previously persisted memory image.
    ///
    /// An empty image means the program has never run successfully and the
    /// fresh instance memory is kept. A non-empty image must match the
    /// instance's memory size exactly; anything else would silently change
    /// what the program observes.
    pub fn restore_state(&mut self, saved: &[u8]) -> Result<(), VmError> {
        if saved.is_empty() {
            return Ok(());
        }
        let expected = self.memory_size();
        if saved.len() != expected {
            return Err(VmError::StateSizeMismatch {
                expected,
                got: saved.len(),
            });
        }
        self.memory.data_mut(&mut self.store)[..expected].copy_from_slice(saved);
        Ok(())
    }

    /// Invoke the export named `function` with `args`.
    ///
    /// The export must exist and must return a single i32 or i64; both are
    /// checked before the call so a bad signature surfaces as a
    /// verification error, not a trap.
    pub fn invoke(&mut self, function: &str, args: &[ScalarArg]) -> Result<Outcome, VmError> {
        let func = self
            .instance
            .get_func(&mut self.store, function)
            .ok_or_else(|| VmError::NoSuchFunction(function.to_string()))?;

        let ty = func.ty(&self.store);
        let mut results_ty = ty.results();
        let result_ok = results_ty.len() == 1
            && matches!(results_ty.next(), Some(ValType::I32) | Some(ValType::I64));
        if !result_ok {
            return Err(VmError::BadReturnType(function.to_string()));
        }

        let params: Vec<Val> = args.iter().map(val_of).collect();
        let mut results = [Val::I32(0)];
        match func.call(&mut self.store, &params, &mut results) {
            Ok(()) => match results[0] {
                Val::I32(v) => Ok(Outcome::Returned(v as i64)),
                Val::I64(v) => Ok(Outcome::Returned(v)),
                // Result type was checked above.
                _ => Err(VmError::BadReturnType(function.to_string())),
            },
            // Arity/type mismatches on the parameters also land here and
            // are treated like any other failed execution.
            Err(e) => Ok(Outcome::Trapped(e.to_string())),
        }
    }

    /// Copy out the full linear memory; persisted as the program's state
    /// after a successful invocation.
    pub fn snapshot_memory(&self) -> Vec<u8> {
        self.memory.data(&self.store).to_vec()
    }
}

fn val_of(arg: &ScalarArg) -> Val {
    match *arg {
        ScalarArg::I32(v) => Val::I32(v),
        ScalarArg::I64(v) => Val::I64(v),
        ScalarArg::F32(v) => Val::F32(v.to_bits()),
        ScalarArg::F64(v) => Val::F64(v.to_bits()),
    }
}
