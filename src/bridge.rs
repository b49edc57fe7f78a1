//! Byte-oriented async entry points for an embedding language.
//!
//! Every function here is a plain `Send` future: an embedder binding (a
//! PyO3 module, an N-API addon, ...) drives these futures through its own
//! async integration, and it is that integration which releases the
//! embedder's concurrency lock for the duration of awaited I/O and
//! reacquires it only to hand back the encoded response. Nothing in this
//! module touches embedder state, so nothing here ever holds such a lock
//! across a suspension point.
//!
//! Queries arrive as codec-framed IR bytes and leave as codec-framed
//! response envelopes; errors convert to the error envelope via
//! [`crate::codec::encode_error`].

use crate::codec;
use crate::driver;
use crate::error::EngineError;
use crate::ir::{Operation, QueryIR, RawQuery};
use crate::pool::PoolSettings;
use crate::registry;
use crate::transaction;
use crate::value::Value;

/// Register a pool under a unique name.
///
/// # Errors
///
/// `CONFIG` for bad URLs/settings or duplicate names, `CONNECTION` when the
/// backend pool cannot be built.
pub async fn init_pool(
    name: &str,
    url: &str,
    settings: &PoolSettings,
) -> Result<(), EngineError> {
    registry::init_pool(name, url, settings).await
}

/// Register a pool, draining and replacing any existing pool of that name.
///
/// # Errors
///
/// Same as [`init_pool`] minus the duplicate-name failure.
pub async fn init_pool_overwrite(
    name: &str,
    url: &str,
    settings: &PoolSettings,
) -> Result<(), EngineError> {
    registry::init_pool_overwrite(name, url, settings).await
}

/// Close a pool; a no-op when the name is not registered.
pub async fn close_pool(name: &str) {
    registry::close_pool(name).await;
}

/// Close every pool, rolling back their live transactions first.
pub async fn close_all() {
    registry::close_all().await;
}

/// Begin a transaction on the named pool and return its handle id.
///
/// # Errors
///
/// Pool lookup/acquisition errors and the `BEGIN` statement error.
pub async fn begin_transaction(pool_name: &str) -> Result<u64, EngineError> {
    transaction::begin(pool_name).await
}

/// Open a nested savepoint scope on an active transaction.
///
/// # Errors
///
/// See [`transaction::begin_savepoint`].
pub async fn begin_savepoint(tx_id: u64) -> Result<(), EngineError> {
    transaction::begin_savepoint(tx_id).await
}

/// Commit the innermost scope of a transaction.
///
/// # Errors
///
/// See [`transaction::commit`].
pub async fn commit_transaction(tx_id: u64) -> Result<(), EngineError> {
    transaction::commit(tx_id).await
}

/// Roll back the innermost scope of a transaction.
///
/// # Errors
///
/// See [`transaction::rollback`].
pub async fn rollback_transaction(tx_id: u64) -> Result<(), EngineError> {
    transaction::rollback(tx_id).await
}

/// Force the outermost commit of a transaction to roll back instead.
///
/// # Errors
///
/// `USAGE` when the id is unknown.
pub async fn set_rollback(tx_id: u64) -> Result<(), EngineError> {
    transaction::set_rollback(tx_id).await
}

/// Decode IR bytes, execute against the pool (or the pinned transaction
/// connection), and encode the response envelope.
///
/// # Errors
///
/// `PROTOCOL` for oversize or malformed payloads, then the full execution
/// surface of [`driver::execute_ir`].
pub async fn execute(
    pool_name: &str,
    ir_bytes: &[u8],
    tx_id: Option<u64>,
) -> Result<Vec<u8>, EngineError> {
    let ir = decode_checked(pool_name, ir_bytes).await?;
    let response = driver::execute_ir(pool_name, &ir, tx_id).await?;
    codec::encode_response(&response)
}

/// Decode IR bytes and run the dialect's EXPLAIN over the compiled query.
///
/// # Errors
///
/// Same decoding surface as [`execute`] plus [`driver::explain_ir`].
pub async fn explain(
    pool_name: &str,
    ir_bytes: &[u8],
    analyze: bool,
) -> Result<Vec<u8>, EngineError> {
    let ir = decode_checked(pool_name, ir_bytes).await?;
    let response = driver::explain_ir(pool_name, &ir, analyze).await?;
    codec::encode_response(&response)
}

/// Execute trusted SQL verbatim with pre-bound parameters.
///
/// # Errors
///
/// `BUILD` for placeholder-style violations, then the execution surface of
/// [`driver::execute_ir`].
pub async fn raw_execute(
    pool_name: &str,
    sql: &str,
    params: Vec<Value>,
    tx_id: Option<u64>,
) -> Result<Vec<u8>, EngineError> {
    let mut ir = QueryIR::new(Operation::Raw, "");
    ir.raw = Some(RawQuery {
        sql: sql.to_string(),
        params,
    });
    let response = driver::execute_ir(pool_name, &ir, tx_id).await?;
    codec::encode_response(&response)
}

/// Compile IR bytes to SQL without executing, for debugging and logging.
///
/// # Errors
///
/// `PROTOCOL` for malformed payloads and `BUILD`/`USAGE` from compilation.
pub fn render_sql(
    ir_bytes: &[u8],
    dialect: crate::builder::Dialect,
) -> Result<(String, Vec<Value>), EngineError> {
    let ir = codec::decode_ir(ir_bytes)?;
    crate::builder::build(&ir, dialect)
}

/// Encode an error as its wire envelope.
#[must_use]
pub fn encode_error(err: &EngineError) -> Vec<u8> {
    codec::encode_error(err)
}

async fn decode_checked(pool_name: &str, ir_bytes: &[u8]) -> Result<QueryIR, EngineError> {
    let ceiling = registry::lookup(pool_name)
        .await?
        .settings
        .max_payload_bytes;
    if ir_bytes.len() > ceiling {
        return Err(EngineError::Protocol(format!(
            "payload of {} bytes exceeds the {ceiling}-byte ceiling",
            ir_bytes.len()
        )));
    }
    codec::decode_ir(ir_bytes)
}
