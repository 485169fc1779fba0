// Path: crates/node/src/main.rs
//! Single-process node wiring: in-memory store, solo consensus (every
//! built block that verifies is accepted), JSON-RPC on top.

#![forbid(unsafe_code)]

use std::net::SocketAddr;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use kiln_chain::{BlockProcessor, ChainEvent, Mempool};
use kiln_rpc::{router, RpcContext};
use kiln_state::{MemoryStore, StateStore};
use kiln_types::app::Block;
use kiln_types::config::{ChainConfig, VmLimits};
use kiln_types::error::ChainError;
use kiln_types::ids::Id;
use kiln_vm::WasmEngine;
use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "kiln-node", about = "Run a single kiln VM node")]
struct Args {
    /// Address the JSON-RPC server listens on.
    #[arg(long, default_value = "127.0.0.1:9650")]
    listen: SocketAddr,

    /// Wall-clock deadline for one guest invocation, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    deadline_ms: u64,

    /// Maximum transactions per block.
    #[arg(long, default_value_t = 64)]
    max_block_txs: usize,

    /// Mempool capacity.
    #[arg(long, default_value_t = 1024)]
    mempool_capacity: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let limits = VmLimits {
        deadline: Duration::from_millis(args.deadline_ms),
        ..VmLimits::default()
    };
    let config = ChainConfig {
        max_block_txs: args.max_block_txs,
        mempool_capacity: args.mempool_capacity,
    };

    let store = StateStore::new(Arc::new(MemoryStore::new()));
    let engine = Arc::new(WasmEngine::new(limits).context("initializing guest engine")?);
    let (mempool, events) = Mempool::new(config.mempool_capacity);
    let mempool = Arc::new(mempool);

    let genesis = Block {
        parent_id: Id::ZERO,
        transactions: Vec::new(),
    };
    let processor = BlockProcessor::new(store, engine, mempool.clone(), config, genesis)
        .context("opening chain")?;
    let last_accepted = processor.last_accepted()?;
    tracing::info!(target: "node", %last_accepted, "chain open");
    let processor = Arc::new(Mutex::new(processor));

    let listener = tokio::net::TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("binding {}", args.listen))?;
    tracing::info!(target: "node", listen = %args.listen, "rpc listening");
    let app = router(Arc::new(RpcContext {
        mempool: mempool.clone(),
        processor: processor.clone(),
    }));
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(target: "node", "rpc server exited: {e}");
        }
    });

    let consensus = processor.clone();
    tokio::task::spawn_blocking(move || consensus_loop(events, consensus));

    tokio::signal::ctrl_c().await?;
    tracing::info!(target: "node", "shutting down");
    Ok(())
}

/// Solo consensus: whenever the mempool signals, package everything
/// pending into blocks; each block that verifies is accepted, each that
/// fails is rejected and its transactions dropped.
fn consensus_loop(events: Receiver<ChainEvent>, processor: Arc<Mutex<BlockProcessor>>) {
    while let Ok(ChainEvent::BlockReady) = events.recv() {
        let mut processor = processor.lock();
        loop {
            let block = match processor.build_block() {
                Ok(block) => block,
                Err(ChainError::EmptyMempool) => break,
                Err(e) => {
                    tracing::error!(target: "node", "building block: {e}");
                    break;
                }
            };
            match processor.verify(&block) {
                Ok(()) => {
                    if let Err(e) = processor.accept(&block) {
                        tracing::error!(target: "node", block = %block.id(), "accepting: {e}");
                    }
                }
                Err(e) => {
                    tracing::warn!(target: "node", block = %block.id(), "rejecting: {e}");
                    if let Err(e) = processor.reject(&block) {
                        tracing::error!(target: "node", block = %block.id(), "rejecting: {e}");
                    }
                }
            }
        }
    }
}
