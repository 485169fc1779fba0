// Path: crates/vm/tests/host_abi.rs
//! Host-ABI behavior exercised through real wasmtime instances.

use std::sync::Arc;
use std::time::Duration;

use kiln_state::{MemoryStore, Overlay, StateAccess, StateStore, View};
use kiln_types::app::ScalarArg;
use kiln_types::config::VmLimits;
use kiln_types::error::VmError;
use kiln_types::ids::{Address, Id};
use kiln_types::keys::{program_view_prefix, ARGS_KEY, RETURN_KEY, SENDER_KEY};
use kiln_vm::{AbiContext, Outcome, WasmEngine};

const PROGRAM: Id = Id([0x11; 32]);
const SENDER: Address = Address([0x22; 20]);

fn engine() -> WasmEngine {
    WasmEngine::new(VmLimits::default()).unwrap()
}

fn overlay() -> (StateStore, Overlay) {
    let store = StateStore::new(Arc::new(MemoryStore::new()));
    let overlay = store.overlay();
    (store, overlay)
}

fn program_view(overlay: &Overlay) -> View<Overlay> {
    overlay.prefix(program_view_prefix(&PROGRAM))
}

fn abi_ctx(overlay: &Overlay) -> AbiContext {
    AbiContext {
        program_db: program_view(overlay),
        tx_id: Id([0x33; 32]),
        sender: SENDER,
    }
}

fn invoke(engine: &WasmEngine, overlay: &Overlay, wat: &str, function: &str) -> Outcome {
    let bytecode = wat::parse_str(wat).unwrap();
    let mut instance = engine.instantiate(&bytecode, abi_ctx(overlay)).unwrap();
    instance.invoke(function, &[]).unwrap()
}

#[test]
fn db_put_lands_in_program_view() {
    let engine = engine();
    let (_store, overlay) = overlay();

    let outcome = invoke(
        &engine,
        &overlay,
        r#"(module
            (import "env" "dbPut" (func $dbPut (param i32 i32 i32 i32) (result i32)))
            (memory (export "memory") 1)
            (data (i32.const 0) "\01\02\03")
            (data (i32.const 16) "\09\09")
            (func (export "run") (result i32)
                (call $dbPut (i32.const 0) (i32.const 3) (i32.const 16) (i32.const 2))))"#,
        "run",
    );

    assert!(matches!(outcome, Outcome::Returned(0)));
    let view = program_view(&overlay);
    assert_eq!(view.get(&[1, 2, 3]).unwrap(), Some(vec![9, 9]));
}

#[test]
fn out_of_bounds_db_put_returns_sentinel_without_writing() {
    let engine = engine();
    let (_store, overlay) = overlay();

    // Key range runs past the single 64 KiB page.
    let outcome = invoke(
        &engine,
        &overlay,
        r#"(module
            (import "env" "dbPut" (func $dbPut (param i32 i32 i32 i32) (result i32)))
            (memory (export "memory") 1)
            (func (export "run") (result i32)
                (call $dbPut (i32.const 65530) (i32.const 64) (i32.const 0) (i32.const 2))))"#,
        "run",
    );

    assert!(matches!(outcome, Outcome::Returned(1)));
    assert!(overlay.is_empty().unwrap());
}

#[test]
fn db_get_round_trips_through_guest_memory() {
    let engine = engine();
    let (_store, overlay) = overlay();
    program_view(&overlay).put(b"k", b"stored").unwrap();

    // Reads value length, fetches the value to offset 32, then re-stores
    // it under a second key so the host side can observe the copy.
    let outcome = invoke(
        &engine,
        &overlay,
        r#"(module
            (import "env" "dbGet" (func $dbGet (param i32 i32 i32) (result i32)))
            (import "env" "dbGetValueLen" (func $dbGetValueLen (param i32 i32) (result i32)))
            (import "env" "dbPut" (func $dbPut (param i32 i32 i32 i32) (result i32)))
            (memory (export "memory") 1)
            (data (i32.const 0) "k")
            (data (i32.const 1) "q")
            (func (export "run") (result i32)
                (local $len i32)
                (local.set $len (call $dbGetValueLen (i32.const 0) (i32.const 1)))
                (if (i32.ne (local.get $len) (call $dbGet (i32.const 0) (i32.const 1) (i32.const 32)))
                    (then (return (i32.const 1))))
                (call $dbPut (i32.const 1) (i32.const 1) (i32.const 32) (local.get $len))))"#,
        "run",
    );

    assert!(matches!(outcome, Outcome::Returned(0)));
    assert_eq!(
        program_view(&overlay).get(b"q").unwrap(),
        Some(b"stored".to_vec())
    );
}

#[test]
fn db_get_missing_key_is_minus_one() {
    let engine = engine();
    let (_store, overlay) = overlay();

    let outcome = invoke(
        &engine,
        &overlay,
        r#"(module
            (import "env" "dbGet" (func $dbGet (param i32 i32 i32) (result i32)))
            (memory (export "memory") 1)
            (func (export "run") (result i32)
                (call $dbGet (i32.const 0) (i32.const 1) (i32.const 32))))"#,
        "run",
    );

    assert!(matches!(outcome, Outcome::Returned(-1)));
}

#[test]
fn get_args_and_sender_are_visible_to_the_guest() {
    let engine = engine();
    let (_store, overlay) = overlay();
    let mut view = program_view(&overlay);
    view.put(ARGS_KEY, b"payload").unwrap();
    view.put(SENDER_KEY, SENDER.as_bytes()).unwrap();

    let bytecode = wat::parse_str(
        r#"(module
            (import "env" "getArgs" (func $getArgs (param i32) (result i32)))
            (import "env" "getSender" (func $getSender (param i32) (result i32)))
            (memory (export "memory") 1)
            (func (export "run") (result i32)
                (if (i32.ne (call $getArgs (i32.const 0)) (i32.const 7))
                    (then (return (i32.const 1))))
                (call $getSender (i32.const 64))))"#,
    )
    .unwrap();
    let mut instance = engine.instantiate(&bytecode, abi_ctx(&overlay)).unwrap();
    let outcome = instance.invoke("run", &[]).unwrap();

    assert!(matches!(outcome, Outcome::Returned(0)));
    let memory = instance.snapshot_memory();
    assert_eq!(&memory[..7], b"payload");
    assert_eq!(&memory[64..84], SENDER.as_bytes());
}

#[test]
fn return_value_last_call_wins() {
    let engine = engine();
    let (_store, overlay) = overlay();

    let outcome = invoke(
        &engine,
        &overlay,
        r#"(module
            (import "env" "returnValue" (func $returnValue (param i32 i32) (result i32)))
            (memory (export "memory") 1)
            (data (i32.const 0) "first")
            (data (i32.const 8) "second")
            (func (export "run") (result i32)
                (drop (call $returnValue (i32.const 0) (i32.const 5)))
                (call $returnValue (i32.const 8) (i32.const 6))))"#,
        "run",
    );

    assert!(matches!(outcome, Outcome::Returned(0)));
    assert_eq!(
        program_view(&overlay).get(RETURN_KEY).unwrap(),
        Some(b"second".to_vec())
    );
}

#[test]
fn scalar_args_reach_the_guest() {
    let engine = engine();
    let (_store, overlay) = overlay();

    let bytecode = wat::parse_str(
        r#"(module
            (memory (export "memory") 1)
            (func (export "add") (param i32 i64) (result i64)
                (i64.add (i64.extend_i32_s (local.get 0)) (local.get 1))))"#,
    )
    .unwrap();
    let mut instance = engine.instantiate(&bytecode, abi_ctx(&overlay)).unwrap();
    let outcome = instance
        .invoke("add", &[ScalarArg::I32(2), ScalarArg::I64(40)])
        .unwrap();

    assert!(matches!(outcome, Outcome::Returned(42)));
}

#[test]
fn trap_is_contained_as_outcome() {
    let engine = engine();
    let (_store, overlay) = overlay();

    let outcome = invoke(
        &engine,
        &overlay,
        r#"(module
            (memory (export "memory") 1)
            (func (export "run") (result i32) unreachable))"#,
        "run",
    );

    assert!(matches!(outcome, Outcome::Trapped(_)));
}

#[test]
fn runaway_guest_hits_the_deadline() {
    let limits = VmLimits {
        deadline: Duration::from_millis(50),
        ..VmLimits::default()
    };
    let engine = WasmEngine::new(limits).unwrap();
    let (_store, overlay) = overlay();

    let outcome = invoke(
        &engine,
        &overlay,
        r#"(module
            (memory (export "memory") 1)
            (func (export "run") (result i32)
                (loop $spin (br $spin))
                (i32.const 0)))"#,
        "run",
    );

    assert!(matches!(outcome, Outcome::Trapped(_)));
}

#[test]
fn missing_export_and_bad_return_type() {
    let engine = engine();
    let (_store, overlay) = overlay();

    let bytecode = wat::parse_str(
        r#"(module
            (memory (export "memory") 1)
            (func (export "frac") (result f32) (f32.const 0.5)))"#,
    )
    .unwrap();
    let mut instance = engine.instantiate(&bytecode, abi_ctx(&overlay)).unwrap();

    assert!(matches!(
        instance.invoke("absent", &[]),
        Err(VmError::NoSuchFunction(name)) if name == "absent"
    ));
    assert!(matches!(
        instance.invoke("frac", &[]),
        Err(VmError::BadReturnType(_))
    ));
}

#[test]
fn module_without_memory_export_is_rejected() {
    let engine = engine();
    let (_store, overlay) = overlay();

    let bytecode = wat::parse_str(r#"(module (func (export "run") (result i32) i32.const 0))"#).unwrap();
    assert!(matches!(
        engine.instantiate(&bytecode, abi_ctx(&overlay)),
        Err(VmError::InvalidModule(_))
    ));
}

#[test]
fn restore_state_enforces_exact_size() {
    let engine = engine();
    let (_store, overlay) = overlay();

    let bytecode = wat::parse_str(r#"(module (memory (export "memory") 1))"#).unwrap();
    let mut instance = engine.instantiate(&bytecode, abi_ctx(&overlay)).unwrap();
    let page = instance.memory_size();

    // Empty image: fresh program, nothing to restore.
    instance.restore_state(&[]).unwrap();

    assert!(matches!(
        instance.restore_state(&vec![0u8; page - 1]),
        Err(VmError::StateSizeMismatch { .. })
    ));

    let mut image = vec![0u8; page];
    image[0] = 0xfe;
    instance.restore_state(&image).unwrap();
    assert_eq!(instance.snapshot_memory()[0], 0xfe);
}
