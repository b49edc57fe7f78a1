use tokio::task::spawn_blocking;

use crate::codec::RowsPayload;
use crate::error::EngineError;
use crate::hydrate;
use crate::pool::sqlite::SharedSqliteConnection;
use crate::value::Value;

use super::ExecOutcome;

/// Run a closure against the shared SQLite connection on the blocking pool.
pub(crate) async fn run_blocking<F, R>(
    conn: SharedSqliteConnection,
    func: F,
) -> Result<R, EngineError>
where
    F: FnOnce(&mut rusqlite::Connection) -> Result<R, EngineError> + Send + 'static,
    R: Send + 'static,
{
    spawn_blocking(move || {
        let mut guard = conn.blocking_lock();
        func(&mut guard)
    })
    .await
    .map_err(|e| EngineError::Connection(format!("sqlite blocking join error: {e}")))?
}

pub(crate) async fn query(
    conn: SharedSqliteConnection,
    sql: &str,
    params: &[Value],
) -> Result<RowsPayload, EngineError> {
    let sql = sql.to_owned();
    let params: Vec<rusqlite::types::Value> = params.iter().map(bind_value).collect();
    run_blocking(conn, move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let columns: Vec<String> = stmt
            .column_names()
            .iter()
            .map(ToString::to_string)
            .collect();
        let decls: Vec<Option<String>> = stmt
            .columns()
            .iter()
            .map(|c| c.decl_type().map(str::to_owned))
            .collect();

        let mut rows = stmt.query(rusqlite::params_from_iter(params))?;
        let mut out = Vec::new();
        let mut row_idx = 0;
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(columns.len());
            for (i, name) in columns.iter().enumerate() {
                let cell = row.get_ref(i)?;
                values.push(hydrate::sqlite::cell(cell, decls[i].as_deref(), name, row_idx)?);
            }
            out.push(values);
            row_idx += 1;
        }
        Ok(RowsPayload {
            columns,
            rows: out,
        })
    })
    .await
}

pub(crate) async fn execute(
    conn: SharedSqliteConnection,
    sql: &str,
    params: &[Value],
) -> Result<ExecOutcome, EngineError> {
    let sql = sql.to_owned();
    let params: Vec<rusqlite::types::Value> = params.iter().map(bind_value).collect();
    run_blocking(conn, move |conn| {
        let affected = {
            let mut stmt = conn.prepare(&sql)?;
            stmt.execute(rusqlite::params_from_iter(params))?
        };
        let last = conn.last_insert_rowid();
        Ok(ExecOutcome {
            affected: affected as u64,
            last_insert_id: (last > 0).then_some(last),
        })
    })
    .await
}

pub(crate) async fn batch(conn: SharedSqliteConnection, sql: &str) -> Result<(), EngineError> {
    let sql = sql.to_owned();
    run_blocking(conn, move |conn| {
        conn.execute_batch(&sql)?;
        Ok(())
    })
    .await
}

fn bind_value(value: &Value) -> rusqlite::types::Value {
    match value {
        Value::Null => rusqlite::types::Value::Null,
        Value::Bool(b) => rusqlite::types::Value::Integer(i64::from(*b)),
        Value::Int(i) => rusqlite::types::Value::Integer(*i),
        Value::Float(f) => rusqlite::types::Value::Real(*f),
        Value::Decimal(s) => rusqlite::types::Value::Text(s.clone()),
        Value::Text(s) => rusqlite::types::Value::Text(s.clone()),
        Value::Bytes(b) => rusqlite::types::Value::Blob(b.clone()),
        Value::Timestamp(dt) => {
            rusqlite::types::Value::Text(dt.naive_utc().format("%Y-%m-%d %H:%M:%S%.f").to_string())
        }
        Value::Date(d) => rusqlite::types::Value::Text(d.format("%Y-%m-%d").to_string()),
        Value::Uuid(u) => rusqlite::types::Value::Text(u.to_string()),
        Value::Json(j) => rusqlite::types::Value::Text(j.to_string()),
    }
}
