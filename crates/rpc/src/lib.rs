// Path: crates/rpc/src/lib.rs
//! JSON-RPC 2.0 surface: `wasm.newKey`, `wasm.createContract`,
//! `wasm.invoke`, `wasm.getTx`.
//!
//! Keys, ids and raw byte blobs travel as base58 strings with a 4-byte
//! SHA-256 checksum suffix. `invoke.args` is either a JSON object/array
//! (serialized verbatim into the transaction's byte arguments) or such a
//! checksummed base58 string (decoded to raw bytes).

mod format;

use std::sync::Arc;

use axum::routing::post;
use axum::{Json, Router};
use kiln_chain::{BlockProcessor, Mempool};
use kiln_crypto::Keypair;
use kiln_tx::{registry, SignedTransaction};
use kiln_types::app::Transaction;
use kiln_types::ids::{Id, ID_LEN};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

pub use format::{cb58_decode, cb58_encode};

/// Shared state behind the RPC handlers. The processor mutex serializes
/// read access with the consensus loop; handlers never build or settle
/// blocks themselves.
pub struct RpcContext {
    pub mempool: Arc<Mempool>,
    pub processor: Arc<Mutex<BlockProcessor>>,
}

/// JSON-RPC error raised by a method handler.
#[derive(Debug)]
struct RpcError {
    code: i64,
    message: String,
}

impl RpcError {
    fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: -32602,
            message: message.into(),
        }
    }

    fn server(message: impl Into<String>) -> Self {
        Self {
            code: -32000,
            message: message.into(),
        }
    }
}

type RpcResult = Result<Value, RpcError>;

#[derive(Deserialize)]
struct RpcRequest {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    method: String,
    #[serde(default)]
    params: Value,
}

/// Build the RPC router.
pub fn router(ctx: Arc<RpcContext>) -> Router {
    Router::new()
        .route("/", post(handle))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn handle(
    axum::extract::State(ctx): axum::extract::State<Arc<RpcContext>>,
    Json(request): Json<RpcRequest>,
) -> Json<Value> {
    tracing::debug!(target: "rpc", method = %request.method, "request");
    let result = match request.method.as_str() {
        "wasm.newKey" => new_key(),
        "wasm.createContract" => create_contract(&ctx, &request.params),
        "wasm.invoke" => invoke(&ctx, &request.params),
        "wasm.getTx" => get_tx(&ctx, &request.params),
        other => Err(RpcError {
            code: -32601,
            message: format!("unknown method '{other}'"),
        }),
    };

    Json(match result {
        Ok(result) => json!({ "jsonrpc": "2.0", "id": request.id, "result": result }),
        Err(e) => json!({
            "jsonrpc": "2.0",
            "id": request.id,
            "error": { "code": e.code, "message": e.message },
        }),
    })
}

fn new_key() -> RpcResult {
    let keypair = Keypair::generate();
    Ok(json!({ "privateKey": cb58_encode(&keypair.to_bytes()) }))
}

fn create_contract(ctx: &RpcContext, params: &Value) -> RpcResult {
    let contract = required_bytes(params, "contract")?;
    let keypair = sender_keypair(params)?;
    let nonce = sender_nonce(params)?;

    let tx = SignedTransaction::deploy(&keypair, contract, nonce)
        .map_err(|e| RpcError::server(format!("couldn't create tx: {e}")))?;
    let id = tx.id();
    append(ctx, tx)?;
    Ok(json!({ "txID": cb58_encode(id.as_bytes()) }))
}

fn invoke(ctx: &RpcContext, params: &Value) -> RpcResult {
    let program_id = required_id(params, "contractID")?;
    let function = params
        .get("function")
        .and_then(Value::as_str)
        .filter(|f| !f.is_empty())
        .ok_or_else(|| RpcError::invalid_params("function not specified"))?;
    let keypair = sender_keypair(params)?;
    let nonce = sender_nonce(params)?;
    let byte_args = parse_byte_args(params.get("args"))?;

    let tx = SignedTransaction::invoke(
        &keypair,
        program_id,
        function,
        Vec::new(),
        byte_args,
        nonce,
    )
    .map_err(|e| RpcError::server(format!("couldn't create tx: {e}")))?;
    let id = tx.id();
    append(ctx, tx)?;
    Ok(json!({ "txID": cb58_encode(id.as_bytes()) }))
}

fn get_tx(ctx: &RpcContext, params: &Value) -> RpcResult {
    let id = required_id(params, "id")?;
    let processor = ctx.processor.lock();
    let receipt = registry::get_receipt(processor.store(), &id)
        .map_err(|e| RpcError::server(e.to_string()))?
        .ok_or_else(|| RpcError::server(format!("couldn't find tx {id}")))?;

    let receipt_json = match &receipt.tx {
        Transaction::Deploy(tx) => json!({
            "type": "contract creation",
            "senderNonce": tx.sender_nonce,
            "contract": cb58_encode(&tx.contract_bytes),
        }),
        Transaction::Invoke(tx) => json!({
            "type": "contract invocation",
            "contractID": cb58_encode(tx.program_id.as_bytes()),
            "function": tx.function,
            "senderNonce": tx.sender_nonce,
            "invocationSuccessful": receipt.invocation_successful,
            "returnValue": format_return_value(&receipt.return_value),
        }),
    };
    Ok(json!({ "receipt": receipt_json }))
}

fn append(ctx: &RpcContext, tx: SignedTransaction) -> Result<(), RpcError> {
    ctx.mempool
        .append(tx)
        .map_err(|e| RpcError::server(e.to_string()))
}

/// Return bytes are shown as JSON when they parse as a JSON object or
/// array, as checksummed base58 otherwise; empty is null.
fn format_return_value(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    if let Ok(value) = serde_json::from_slice::<Value>(bytes) {
        if value.is_object() || value.is_array() {
            return value;
        }
    }
    Value::String(cb58_encode(bytes))
}

/// `args` is JSON (kept verbatim) or a checksummed base58 string.
fn parse_byte_args(args: Option<&Value>) -> Result<Vec<u8>, RpcError> {
    match args {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(value @ (Value::Object(_) | Value::Array(_))) => serde_json::to_vec(value)
            .map_err(|_| RpcError::invalid_params("couldn't serialize 'args'")),
        Some(Value::String(s)) => cb58_decode(s).map_err(|_| {
            RpcError::invalid_params(
                "expected 'args' to be JSON or base58-checksummed bytes but was neither",
            )
        }),
        Some(_) => Err(RpcError::invalid_params(
            "expected 'args' to be JSON or base58-checksummed bytes but was neither",
        )),
    }
}

fn sender_keypair(params: &Value) -> Result<Keypair, RpcError> {
    let bytes = required_bytes(params, "senderKey")?;
    Keypair::from_bytes(&bytes)
        .map_err(|_| RpcError::invalid_params("couldn't parse 'senderKey' to a private key"))
}

fn sender_nonce(params: &Value) -> Result<u64, RpcError> {
    let nonce = params
        .get("senderNonce")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    if nonce == 0 {
        return Err(RpcError::invalid_params("'senderNonce' must be at least 1"));
    }
    Ok(nonce)
}

fn required_bytes(params: &Value, field: &str) -> Result<Vec<u8>, RpcError> {
    let encoded = params
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| RpcError::invalid_params(format!("argument '{field}' not given")))?;
    cb58_decode(encoded)
        .map_err(|_| RpcError::invalid_params(format!("argument '{field}' is not valid base58")))
}

fn required_id(params: &Value, field: &str) -> Result<Id, RpcError> {
    let bytes = required_bytes(params, field)?;
    let raw: [u8; ID_LEN] = bytes
        .try_into()
        .map_err(|_| RpcError::invalid_params(format!("argument '{field}' is not a 32-byte id")))?;
    Ok(Id(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_args_accept_json_and_base58() {
        let object = json!({"owner_id": 7});
        let bytes = parse_byte_args(Some(&object)).unwrap();
        assert_eq!(serde_json::from_slice::<Value>(&bytes).unwrap(), object);

        let raw = vec![1u8, 2, 3];
        let encoded = Value::String(cb58_encode(&raw));
        assert_eq!(parse_byte_args(Some(&encoded)).unwrap(), raw);

        assert!(parse_byte_args(Some(&json!(42))).is_err());
        assert!(parse_byte_args(None).unwrap().is_empty());
    }

    #[test]
    fn return_value_rendering() {
        assert_eq!(format_return_value(b""), Value::Null);
        assert_eq!(
            format_return_value(b"{\"ok\":true}"),
            json!({"ok": true})
        );
        let opaque = format_return_value(&[0xde, 0xad]);
        assert_eq!(cb58_decode(opaque.as_str().unwrap()).unwrap(), vec![0xde, 0xad]);
    }

    #[test]
    fn nonce_validation() {
        assert!(sender_nonce(&json!({"senderNonce": 0})).is_err());
        assert!(sender_nonce(&json!({})).is_err());
        assert_eq!(sender_nonce(&json!({"senderNonce": 3})).unwrap(), 3);
    }
}
