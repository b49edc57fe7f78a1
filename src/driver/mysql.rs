use chrono::{Datelike, Timelike};
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, Params, Row, Value as MySqlValue};

use crate::codec::RowsPayload;
use crate::error::EngineError;
use crate::hydrate;
use crate::value::Value;

use super::ExecOutcome;

pub(crate) async fn query(
    conn: &mut Conn,
    sql: &str,
    params: &[Value],
) -> Result<RowsPayload, EngineError> {
    let params = to_params(params);
    let mut result = conn.exec_iter(sql, params).await.map_err(EngineError::from)?;
    let columns = result.columns();
    let rows: Vec<Row> = result.collect().await.map_err(EngineError::from)?;

    let mut names: Vec<String> = columns
        .map(|cols| cols.iter().map(|c| c.name_str().into_owned()).collect())
        .unwrap_or_default();
    if names.is_empty() {
        if let Some(first) = rows.first() {
            names = first
                .columns_ref()
                .iter()
                .map(|c| c.name_str().into_owned())
                .collect();
        }
    }
    hydrate::mysql::rows_payload(names, &rows)
}

/// Execute DML. `last_insert_id` is the FIRST id generated by a multi-row
/// insert, per the MySQL protocol; callers synthesising an id range from it
/// must flag the range as approximate.
pub(crate) async fn execute(
    conn: &mut Conn,
    sql: &str,
    params: &[Value],
) -> Result<ExecOutcome, EngineError> {
    let params = to_params(params);
    conn.exec_drop(sql, params).await.map_err(EngineError::from)?;
    let last = conn.last_insert_id().and_then(|id| i64::try_from(id).ok());
    Ok(ExecOutcome {
        affected: conn.affected_rows(),
        last_insert_id: last.filter(|id| *id > 0),
    })
}

pub(crate) async fn batch(conn: &mut Conn, sql: &str) -> Result<(), EngineError> {
    conn.query_drop(sql).await.map_err(EngineError::from)
}

fn to_params(values: &[Value]) -> Params {
    if values.is_empty() {
        Params::Empty
    } else {
        Params::Positional(values.iter().map(bind_value).collect())
    }
}

fn bind_value(value: &Value) -> MySqlValue {
    match value {
        Value::Null => MySqlValue::NULL,
        Value::Bool(b) => MySqlValue::Int(i64::from(*b)),
        Value::Int(i) => MySqlValue::Int(*i),
        Value::Float(f) => MySqlValue::Double(*f),
        Value::Decimal(s) => MySqlValue::Bytes(s.clone().into_bytes()),
        Value::Text(s) => MySqlValue::Bytes(s.clone().into_bytes()),
        Value::Bytes(b) => MySqlValue::Bytes(b.clone()),
        Value::Timestamp(dt) => {
            let naive = dt.naive_utc();
            let (date, time) = (naive.date(), naive.time());
            MySqlValue::Date(
                date_year(&date),
                date.month() as u8,
                date.day() as u8,
                time.hour() as u8,
                time.minute() as u8,
                time.second() as u8,
                time.nanosecond() / 1_000,
            )
        }
        Value::Date(d) => {
            MySqlValue::Date(date_year(d), d.month() as u8, d.day() as u8, 0, 0, 0, 0)
        }
        Value::Uuid(u) => MySqlValue::Bytes(u.to_string().into_bytes()),
        Value::Json(j) => MySqlValue::Bytes(j.to_string().into_bytes()),
    }
}

fn date_year(date: &chrono::NaiveDate) -> u16 {
    u16::try_from(date.year()).unwrap_or(0)
}
