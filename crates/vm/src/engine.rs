// Path: crates/vm/src/engine.rs

use std::thread;
use std::time::Duration;

use kiln_types::config::VmLimits;
use kiln_types::error::VmError;
use wasmtime::{Config, Engine, Linker, Module, Store, StoreLimitsBuilder};

use crate::host::{self, AbiContext, HostState};
use crate::instance::ProgramInstance;

/// Granularity of the epoch ticker that enforces invocation deadlines.
const EPOCH_TICK: Duration = Duration::from_millis(10);

/// The process-wide guest engine. Cheap to clone; create once and share.
///
/// A background thread increments the wasmtime epoch every [`EPOCH_TICK`];
/// each instance gets a deadline in ticks, and running past it traps the
/// guest.
#[derive(Clone)]
pub struct WasmEngine {
    engine: Engine,
    limits: VmLimits,
}

impl WasmEngine {
    pub fn new(limits: VmLimits) -> Result<Self, VmError> {
        let mut config = Config::new();
        config.epoch_interruption(true);
        // Float NaN payloads are the one place wasm execution is allowed
        // to differ between hosts; canonicalize them away.
        config.cranelift_nan_canonicalization(true);
        let engine =
            Engine::new(&config).map_err(|e| VmError::Initialization(e.to_string()))?;

        let ticker = engine.clone();
        thread::Builder::new()
            .name("kiln-wasm-epoch".into())
            .spawn(move || loop {
                thread::sleep(EPOCH_TICK);
                ticker.increment_epoch();
            })
            .map_err(|e| VmError::Initialization(e.to_string()))?;

        Ok(Self { engine, limits })
    }

    pub fn limits(&self) -> &VmLimits {
        &self.limits
    }

    /// True iff `bytes` is a well-formed module. Used by deploy
    /// verification; never instantiates anything.
    pub fn validate(&self, bytes: &[u8]) -> bool {
        Module::validate(&self.engine, bytes).is_ok()
    }

    /// Compile and instantiate `bytecode` with the host ABI bound to
    /// `ctx`. The instance is single-use: one invocation, then dropped.
    pub fn instantiate(
        &self,
        bytecode: &[u8],
        ctx: AbiContext,
    ) -> Result<ProgramInstance, VmError> {
        let module = Module::new(&self.engine, bytecode)
            .map_err(|e| VmError::InvalidModule(e.to_string()))?;

        let mut linker: Linker<HostState> = Linker::new(&self.engine);
        host::add_host_imports(&mut linker).map_err(|e| VmError::Initialization(e.to_string()))?;

        let store_limits = StoreLimitsBuilder::new()
            .memory_size(self.limits.max_memory_bytes)
            .instances(1)
            .build();
        let mut store = Store::new(
            &self.engine,
            HostState {
                ctx,
                memory: None,
                limits: store_limits,
                caps: self.limits.clone(),
            },
        );
        store.limiter(|state| &mut state.limits);
        store.set_epoch_deadline(deadline_ticks(self.limits.deadline));
        store.epoch_deadline_trap();

        let instance = linker
            .instantiate(&mut store, &module)
            .map_err(|e| VmError::InvalidModule(e.to_string()))?;
        let memory = instance
            .get_memory(&mut store, "memory")
            .ok_or_else(|| VmError::InvalidModule("module must export 'memory'".into()))?;
        store.data_mut().memory = Some(memory);

        Ok(ProgramInstance::new(store, instance, memory))
    }
}

fn deadline_ticks(deadline: Duration) -> u64 {
    let ticks = deadline.as_millis() as u64 / EPOCH_TICK.as_millis() as u64;
    ticks.max(1)
}
