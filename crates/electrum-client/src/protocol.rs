//! JSON-RPC framing and the typed results of the methods the wallet uses.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ElectrumError;

pub const METHOD_GET_BALANCE: &str = "blockchain.scripthash.get_balance";
pub const METHOD_LIST_UNSPENT: &str = "blockchain.scripthash.listunspent";
pub const METHOD_BROADCAST: &str = "blockchain.transaction.broadcast";

/// Result of `blockchain.scripthash.get_balance`, in satoshis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub confirmed: u64,
    /// Mempool delta; negative when unconfirmed spends exceed receives.
    pub unconfirmed: i64,
}

/// One entry of `blockchain.scripthash.listunspent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnspentOutput {
    pub tx_hash: String,
    pub tx_pos: u32,
    pub value: u64,
    /// Confirmation height, 0 (or negative) for mempool outputs.
    pub height: i64,
}

/// Serialize one request as a single newline-terminated line.
pub fn encode_request(id: u64, method: &str, params: &[Value]) -> Vec<u8> {
    let request = json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    });
    let mut line = request.to_string().into_bytes();
    line.push(b'\n');
    line
}

/// What a decoded line turned out to be.
#[derive(Debug)]
pub enum Incoming {
    /// A server-initiated notification (has `method`, no `id`).
    Notification(String),
    /// A response carrying some other request's `id`.
    Unmatched(Value),
    /// A response; `Ok` holds `result`, `Err` is the response error.
    Response(Result<Value, ElectrumError>),
}

/// Decode one line received from the server.
///
/// A line that is not a JSON object is a protocol error. A response whose
/// `id` is not `expected_id` is reported as [`Incoming::Unmatched`] so the
/// reader can discard it and keep looking. A well-formed object without a
/// `result` member is a response error carrying the `error` member (or
/// `null`).
pub fn decode_line(line: &[u8], expected_id: u64) -> Result<Incoming, ElectrumError> {
    let value: Value = serde_json::from_slice(line)
        .map_err(|e| ElectrumError::Protocol(format!("invalid JSON line: {e}")))?;
    let mut object = match value {
        Value::Object(object) => object,
        other => {
            return Err(ElectrumError::Protocol(format!(
                "expected a JSON object, got {other}"
            )))
        }
    };

    let id = object.get("id").filter(|id| !id.is_null());
    if id.is_none() {
        if let Some(Value::String(method)) = object.get("method") {
            return Ok(Incoming::Notification(method.clone()));
        }
    }
    if let Some(id) = id {
        if id.as_u64() != Some(expected_id) {
            return Ok(Incoming::Unmatched(id.clone()));
        }
    }

    match object.remove("result") {
        Some(result) => Ok(Incoming::Response(Ok(result))),
        None => {
            let error = object.remove("error").unwrap_or(Value::Null);
            Ok(Incoming::Response(Err(ElectrumError::Response(error))))
        }
    }
}
