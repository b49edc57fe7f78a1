//! Binary wire codec between the embedder and the core.
//!
//! Every payload is a single version byte followed by a MessagePack
//! document with named fields. The version byte lets the format evolve
//! without breaking old embedders; an unknown version is a `PROTOCOL`
//! error, never a silent misparse.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, ErrorKind};
use crate::ir::QueryIR;
use crate::value::Value;

/// Current wire format version.
pub const WIRE_VERSION: u8 = 1;

/// Named rows as shipped over the wire: one shared column list, row values
/// in column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowsPayload {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// Result of one prefetch fan-out, keyed by the prefetch name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefetchResult {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// Response envelope returned by the driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    /// SELECT / RAW result rows.
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
        #[serde(default)]
        prefetched: Vec<PrefetchResult>,
    },
    /// INSERT / UPDATE / DELETE outcome. `inserted_ids` is populated for
    /// INSERT; `ids_exact` is false when the id range was synthesised from
    /// a single last-insert-id (MySQL multi-row inserts).
    Mutation {
        rowcount: u64,
        #[serde(default)]
        returning: Option<RowsPayload>,
        #[serde(default)]
        inserted_ids: Vec<Value>,
        #[serde(default = "default_true")]
        ids_exact: bool,
    },
    /// EXPLAIN output, either plain text or the backend's JSON tree.
    Plan { plan: serde_json::Value },
}

fn default_true() -> bool {
    true
}

/// Wire form of an [`EngineError`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default)]
    pub backend_code: Option<String>,
    #[serde(default)]
    pub constraint: Option<String>,
    #[serde(default)]
    pub column: Option<String>,
}

impl From<&EngineError> for ErrorEnvelope {
    fn from(err: &EngineError) -> Self {
        let (backend_code, constraint, column) = match err {
            EngineError::Integrity {
                constraint, column, ..
            } => (None, constraint.clone(), column.clone()),
            EngineError::Backend { code, .. } => (code.clone(), None, None),
            EngineError::Hydration { column, .. } => (None, None, Some(column.clone())),
            _ => (None, None, None),
        };
        ErrorEnvelope {
            kind: err.kind(),
            message: err.to_string(),
            backend_code,
            constraint,
            column,
        }
    }
}

fn frame(body: Vec<u8>) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 1);
    out.push(WIRE_VERSION);
    out.extend_from_slice(&body);
    out
}

fn unframe(bytes: &[u8]) -> Result<&[u8], EngineError> {
    match bytes.split_first() {
        Some((&WIRE_VERSION, body)) => Ok(body),
        Some((&version, _)) => Err(EngineError::Protocol(format!(
            "unsupported wire version {version} (expected {WIRE_VERSION})"
        ))),
        None => Err(EngineError::Protocol("empty payload".into())),
    }
}

/// Encode a [`QueryIR`] for transport.
///
/// # Errors
///
/// Returns `EngineError::Protocol` if serialization fails.
pub fn encode_ir(ir: &QueryIR) -> Result<Vec<u8>, EngineError> {
    let body = rmp_serde::to_vec_named(ir)
        .map_err(|e| EngineError::Protocol(format!("failed to encode IR: {e}")))?;
    Ok(frame(body))
}

/// Decode a [`QueryIR`] received from an embedder.
///
/// # Errors
///
/// Returns `EngineError::Protocol` on an unknown version byte or a
/// malformed MessagePack body (including unknown tags).
pub fn decode_ir(bytes: &[u8]) -> Result<QueryIR, EngineError> {
    let body = unframe(bytes)?;
    rmp_serde::from_slice(body)
        .map_err(|e| EngineError::Protocol(format!("failed to decode IR: {e}")))
}

/// Encode a response envelope.
///
/// # Errors
///
/// Returns `EngineError::Protocol` if serialization fails.
pub fn encode_response(response: &Response) -> Result<Vec<u8>, EngineError> {
    let body = rmp_serde::to_vec_named(response)
        .map_err(|e| EngineError::Protocol(format!("failed to encode response: {e}")))?;
    Ok(frame(body))
}

/// Decode a response envelope (used by embedder-side bindings and tests).
///
/// # Errors
///
/// Returns `EngineError::Protocol` on version mismatch or malformed body.
pub fn decode_response(bytes: &[u8]) -> Result<Response, EngineError> {
    let body = unframe(bytes)?;
    rmp_serde::from_slice(body)
        .map_err(|e| EngineError::Protocol(format!("failed to decode response: {e}")))
}

/// Encode an error envelope.
#[must_use]
pub fn encode_error(err: &EngineError) -> Vec<u8> {
    let envelope = ErrorEnvelope::from(err);
    // An envelope of plain strings and options cannot fail to serialize.
    let body = rmp_serde::to_vec_named(&envelope).unwrap_or_default();
    frame(body)
}
