//! Statement execution: routing compiled SQL onto a pooled connection or a
//! transaction's pinned connection, and shaping backend results into the
//! response envelope.
//!
//! Stand-alone executions acquire a connection for exactly one IR (plus its
//! prefetch fan-out) and release it on success and failure alike; supplying
//! a transaction id routes every statement to that transaction's pinned
//! connection in strict order.

pub(crate) mod mysql;
pub(crate) mod postgres;
pub(crate) mod sqlite;

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use serde_json::Value as JsonValue;

use crate::builder::{self, Dialect};
use crate::codec::{PrefetchResult, Response, RowsPayload};
use crate::error::EngineError;
use crate::ir::{FilterNode, FilterOp, Operand, Operation, PrefetchSpec, QueryIR};
use crate::pool::PoolConnection;
use crate::registry;
use crate::transaction::{self, PoisonScope};
use crate::value::Value;

/// Outcome of a row-less statement execution.
pub(crate) struct ExecOutcome {
    pub affected: u64,
    pub last_insert_id: Option<i64>,
}

pub(crate) async fn run_query(
    conn: &mut PoolConnection,
    sql: &str,
    params: &[Value],
) -> Result<RowsPayload, EngineError> {
    tracing::trace!(sql, params = params.len(), "query");
    match conn {
        PoolConnection::Postgres(client) => postgres::query(client, sql, params).await,
        PoolConnection::Sqlite(conn) => sqlite::query(Arc::clone(&**conn), sql, params).await,
        PoolConnection::MySql(conn) => mysql::query(&mut conn.conn, sql, params).await,
    }
}

pub(crate) async fn run_execute(
    conn: &mut PoolConnection,
    sql: &str,
    params: &[Value],
) -> Result<ExecOutcome, EngineError> {
    tracing::trace!(sql, params = params.len(), "execute");
    match conn {
        PoolConnection::Postgres(client) => postgres::execute(client, sql, params).await,
        PoolConnection::Sqlite(conn) => sqlite::execute(Arc::clone(&**conn), sql, params).await,
        PoolConnection::MySql(conn) => mysql::execute(&mut conn.conn, sql, params).await,
    }
}

pub(crate) async fn run_batch(conn: &mut PoolConnection, sql: &str) -> Result<(), EngineError> {
    tracing::trace!(sql, "batch");
    match conn {
        PoolConnection::Postgres(client) => postgres::batch(client, sql).await,
        PoolConnection::Sqlite(conn) => sqlite::batch(Arc::clone(&**conn), sql).await,
        PoolConnection::MySql(conn) => mysql::batch(&mut conn.conn, sql).await,
    }
}

/// Execute an IR against a named pool, or against a transaction's pinned
/// connection when `tx_id` is supplied.
///
/// # Errors
///
/// The full error surface of the engine: `USAGE` for invalid IR or an
/// unknown pool/transaction, `BUILD` from compilation, `POOL_TIMEOUT` from
/// acquisition, backend-classified errors from execution, `NOT_FOUND` /
/// `MULTIPLE_FOUND` for violated `expect_one`, and `TRANSACTION_POISONED`
/// for a poisoned handle.
pub async fn execute_ir(
    pool_name: &str,
    ir: &QueryIR,
    tx_id: Option<u64>,
) -> Result<Response, EngineError> {
    ir.validate()?;
    let entry = registry::lookup(pool_name).await?;
    let dialect = entry.dialect;
    let batch_size = entry.settings.insert_batch_size;

    match tx_id {
        None => {
            let mut conn = entry.pool.acquire(&entry.name).await?;
            let result = execute_on_conn(&mut conn, dialect, batch_size, ir).await;
            if let Err(err) = &result {
                if err.is_connection_error() {
                    conn.mark_broken();
                    tracing::warn!(pool = pool_name, "discarding connection after error: {err}");
                }
            }
            result
        }
        Some(id) => {
            let mut lease = transaction::lease(id).await?;
            if lease.pool_name() != pool_name {
                return Err(EngineError::Usage(format!(
                    "transaction {id} belongs to pool '{}', not '{pool_name}'",
                    lease.pool_name()
                )));
            }
            let shared = lease.shared();
            let conn = lease.conn_mut()?;
            let scope = PoisonScope::arm(Arc::clone(&shared));
            let result = execute_on_conn(conn, dialect, batch_size, ir).await;
            scope.disarm();
            if let Err(err) = &result {
                if err.is_connection_error() {
                    shared.poison();
                    if let Ok(conn) = lease.conn_mut() {
                        conn.mark_broken();
                    }
                }
            }
            result
        }
    }
}

/// Compile and run the EXPLAIN form of an IR.
///
/// # Errors
///
/// Same surface as [`execute_ir`] without the transaction modes.
pub async fn explain_ir(
    pool_name: &str,
    ir: &QueryIR,
    analyze: bool,
) -> Result<Response, EngineError> {
    ir.validate()?;
    let entry = registry::lookup(pool_name).await?;
    let (sql, params) = builder::build_explain(ir, entry.dialect, analyze)?;
    let mut conn = entry.pool.acquire(&entry.name).await?;
    let payload = match run_query(&mut conn, &sql, &params).await {
        Ok(payload) => payload,
        Err(err) => {
            if err.is_connection_error() {
                conn.mark_broken();
            }
            return Err(err);
        }
    };
    Ok(Response::Plan {
        plan: format_plan(entry.dialect, &payload),
    })
}

/// SELECT-then-INSERT with the documented race recovery: an INSERT losing a
/// uniqueness race surfaces as `INTEGRITY` and is retried as the SELECT.
/// Returns the response plus whether the row was created by this call.
///
/// # Errors
///
/// Same surface as [`execute_ir`]; non-integrity INSERT errors propagate.
pub async fn get_or_create(
    pool_name: &str,
    lookup: &QueryIR,
    create: &QueryIR,
    tx_id: Option<u64>,
) -> Result<(Response, bool), EngineError> {
    let found = execute_ir(pool_name, lookup, tx_id).await?;
    if let Response::Rows { rows, .. } = &found {
        if !rows.is_empty() {
            return Ok((found, false));
        }
    }
    match execute_ir(pool_name, create, tx_id).await {
        Ok(created) => Ok((created, true)),
        Err(EngineError::Integrity { .. }) => {
            let retried = execute_ir(pool_name, lookup, tx_id).await?;
            Ok((retried, false))
        }
        Err(err) => Err(err),
    }
}

async fn execute_on_conn(
    conn: &mut PoolConnection,
    dialect: Dialect,
    batch_size: usize,
    ir: &QueryIR,
) -> Result<Response, EngineError> {
    match ir.op {
        Operation::Select => execute_select(conn, dialect, ir).await,
        Operation::Raw => {
            let (sql, params) = builder::build(ir, dialect)?;
            let payload = run_query(conn, &sql, &params).await?;
            Ok(Response::Rows {
                columns: payload.columns,
                rows: payload.rows,
                prefetched: Vec::new(),
            })
        }
        Operation::Insert => execute_insert(conn, dialect, batch_size, ir).await,
        Operation::Update | Operation::Delete => execute_mutation(conn, dialect, ir).await,
        Operation::Explain => {
            let (sql, params) = builder::build_explain(ir, dialect, false)?;
            let payload = run_query(conn, &sql, &params).await?;
            Ok(Response::Plan {
                plan: format_plan(dialect, &payload),
            })
        }
    }
}

async fn execute_select(
    conn: &mut PoolConnection,
    dialect: Dialect,
    ir: &QueryIR,
) -> Result<Response, EngineError> {
    let (sql, params) = builder::build(ir, dialect)?;
    let payload = run_query(conn, &sql, &params).await?;
    if ir.expect_one {
        match payload.rows.len() {
            0 => return Err(EngineError::NotFound),
            1 => {}
            count => return Err(EngineError::MultipleFound { count }),
        }
    }
    let mut prefetched = Vec::with_capacity(ir.prefetches.len());
    for spec in &ir.prefetches {
        prefetched.push(run_prefetch(conn, dialect, spec, &payload).await?);
    }
    Ok(Response::Rows {
        columns: payload.columns,
        rows: payload.rows,
        prefetched,
    })
}

/// Second-stage fan-out: collect the parent keys from the primary result
/// and select the children with one IN query on the same connection.
async fn run_prefetch(
    conn: &mut PoolConnection,
    dialect: Dialect,
    spec: &PrefetchSpec,
    parent: &RowsPayload,
) -> Result<PrefetchResult, EngineError> {
    let key_idx = parent
        .columns
        .iter()
        .position(|column| column == &spec.parent_key)
        .ok_or_else(|| {
            EngineError::Usage(format!(
                "prefetch '{}' parent key '{}' is not in the projection",
                spec.name, spec.parent_key
            ))
        })?;

    let mut keys: Vec<Value> = Vec::new();
    for row in &parent.rows {
        let key = &row[key_idx];
        if !key.is_null() && !keys.contains(key) {
            keys.push(key.clone());
        }
    }

    let mut child = QueryIR::new(Operation::Select, spec.table.clone());
    child.columns = spec.columns.clone();
    child.filter = Some(FilterNode::cond(
        spec.child_key.clone(),
        FilterOp::In,
        Operand::List(keys),
    ));
    let (sql, params) = builder::build(&child, dialect)?;
    let payload = run_query(conn, &sql, &params).await?;
    Ok(PrefetchResult {
        name: spec.name.clone(),
        columns: payload.columns,
        rows: payload.rows,
    })
}

async fn execute_insert(
    conn: &mut PoolConnection,
    dialect: Dialect,
    batch_size: usize,
    ir: &QueryIR,
) -> Result<Response, EngineError> {
    let use_returning = !ir.returning.is_empty() && dialect.supports_returning();
    let mut rowcount = 0u64;
    let mut returning: Option<RowsPayload> = None;
    let mut inserted_ids: Vec<Value> = Vec::new();
    let mut ids_exact = true;

    for chunk in ir.insert_rows.chunks(batch_size) {
        let mut chunk_ir = ir.clone();
        chunk_ir.insert_rows = chunk.to_vec();
        let (sql, params) = builder::build(&chunk_ir, dialect)?;

        if use_returning {
            let payload = run_query(conn, &sql, &params).await?;
            rowcount += payload.rows.len() as u64;
            for row in &payload.rows {
                if let Some(first) = row.first() {
                    inserted_ids.push(first.clone());
                }
            }
            match &mut returning {
                Some(acc) => acc.rows.extend(payload.rows),
                None => returning = Some(payload),
            }
        } else {
            let outcome = run_execute(conn, &sql, &params).await?;
            rowcount += outcome.affected;
            let n = chunk.len() as i64;
            if let Some(last) = outcome.last_insert_id {
                match dialect {
                    // SQLite reports the LAST rowid of the statement; ids
                    // within one INSERT are allocated sequentially.
                    Dialect::Sqlite => {
                        for id in (last - n + 1)..=last {
                            inserted_ids.push(Value::Int(id));
                        }
                    }
                    // MySQL reports the FIRST id of the batch; under
                    // concurrent writers the synthesised range is only
                    // approximate, which `ids_exact` surfaces to callers.
                    Dialect::MySql => {
                        for id in last..last + n {
                            inserted_ids.push(Value::Int(id));
                        }
                        if n > 1 {
                            ids_exact = false;
                        }
                    }
                    Dialect::Postgres => {}
                }
            }
        }
    }

    Ok(Response::Mutation {
        rowcount,
        returning,
        inserted_ids,
        ids_exact,
    })
}

async fn execute_mutation(
    conn: &mut PoolConnection,
    dialect: Dialect,
    ir: &QueryIR,
) -> Result<Response, EngineError> {
    let (sql, params) = builder::build(ir, dialect)?;
    if !ir.returning.is_empty() && dialect.supports_returning() {
        let payload = run_query(conn, &sql, &params).await?;
        Ok(Response::Mutation {
            rowcount: payload.rows.len() as u64,
            returning: Some(payload),
            inserted_ids: Vec::new(),
            ids_exact: true,
        })
    } else {
        let outcome = run_execute(conn, &sql, &params).await?;
        Ok(Response::Mutation {
            rowcount: outcome.affected,
            returning: None,
            inserted_ids: Vec::new(),
            ids_exact: true,
        })
    }
}

/// Shape backend EXPLAIN rows into the plan payload: text plans join to a
/// single string, tabular plans become a JSON array of row objects.
fn format_plan(dialect: Dialect, payload: &RowsPayload) -> JsonValue {
    match dialect {
        Dialect::Postgres => {
            let lines: Vec<String> = payload
                .rows
                .iter()
                .filter_map(|row| row.first())
                .map(render_plan_cell)
                .collect();
            JsonValue::String(lines.join("\n"))
        }
        Dialect::Sqlite => {
            let detail_idx = payload
                .columns
                .iter()
                .position(|c| c == "detail")
                .unwrap_or(payload.columns.len().saturating_sub(1));
            let lines: Vec<String> = payload
                .rows
                .iter()
                .filter_map(|row| row.get(detail_idx))
                .map(render_plan_cell)
                .collect();
            JsonValue::String(lines.join("\n"))
        }
        Dialect::MySql => {
            let rows: Vec<JsonValue> = payload
                .rows
                .iter()
                .map(|row| {
                    let object: serde_json::Map<String, JsonValue> = payload
                        .columns
                        .iter()
                        .zip(row)
                        .map(|(name, value)| (name.clone(), value_to_json(value)))
                        .collect();
                    JsonValue::Object(object)
                })
                .collect();
            JsonValue::Array(rows)
        }
    }
}

fn render_plan_cell(value: &Value) -> String {
    match value {
        Value::Text(s) => s.clone(),
        other => match value_to_json(other) {
            JsonValue::String(s) => s,
            json => json.to_string(),
        },
    }
}

/// JSON rendering of a scalar, used for plan payloads.
pub(crate) fn value_to_json(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Int(i) => JsonValue::Number((*i).into()),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Value::Decimal(s) => JsonValue::String(s.clone()),
        Value::Text(s) => JsonValue::String(s.clone()),
        Value::Bytes(b) => JsonValue::String(BASE64_STANDARD.encode(b)),
        Value::Timestamp(dt) => JsonValue::String(dt.to_rfc3339()),
        Value::Date(d) => JsonValue::String(d.format("%Y-%m-%d").to_string()),
        Value::Uuid(u) => JsonValue::String(u.to_string()),
        Value::Json(j) => j.clone(),
    }
}
