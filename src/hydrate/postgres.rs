use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use tokio_postgres::types::Type;
use tokio_postgres::{Column, Row};
use uuid::Uuid;

use crate::codec::RowsPayload;
use crate::error::EngineError;
use crate::value::Value;

use super::hydration_error;

/// Build a row payload from a prepared statement's column list and its
/// result rows. Taking columns from the statement (not the first row) keeps
/// the column echo correct for empty results.
pub(crate) fn rows_payload(columns: &[Column], rows: &[Row]) -> Result<RowsPayload, EngineError> {
    let names: Vec<String> = columns.iter().map(|c| c.name().to_string()).collect();
    let mut out = Vec::with_capacity(rows.len());
    for (row_idx, row) in rows.iter().enumerate() {
        let mut values = Vec::with_capacity(names.len());
        for (idx, column) in columns.iter().enumerate() {
            values.push(cell(row, idx, column.type_(), column.name(), row_idx)?);
        }
        out.push(values);
    }
    Ok(RowsPayload {
        columns: names,
        rows: out,
    })
}

fn cell(
    row: &Row,
    idx: usize,
    ty: &Type,
    column: &str,
    row_idx: usize,
) -> Result<Value, EngineError> {
    let map_err = |e: tokio_postgres::Error| hydration_error(column, row_idx, e);
    match *ty {
        Type::BOOL => {
            let v: Option<bool> = row.try_get(idx).map_err(map_err)?;
            Ok(v.map_or(Value::Null, Value::Bool))
        }
        Type::INT2 => {
            let v: Option<i16> = row.try_get(idx).map_err(map_err)?;
            Ok(v.map_or(Value::Null, |v| Value::Int(i64::from(v))))
        }
        Type::INT4 => {
            let v: Option<i32> = row.try_get(idx).map_err(map_err)?;
            Ok(v.map_or(Value::Null, |v| Value::Int(i64::from(v))))
        }
        Type::INT8 => {
            let v: Option<i64> = row.try_get(idx).map_err(map_err)?;
            Ok(v.map_or(Value::Null, Value::Int))
        }
        Type::OID => {
            let v: Option<u32> = row.try_get(idx).map_err(map_err)?;
            Ok(v.map_or(Value::Null, |v| Value::Int(i64::from(v))))
        }
        Type::FLOAT4 => {
            let v: Option<f32> = row.try_get(idx).map_err(map_err)?;
            Ok(v.map_or(Value::Null, |v| Value::Float(f64::from(v))))
        }
        Type::FLOAT8 => {
            let v: Option<f64> = row.try_get(idx).map_err(map_err)?;
            Ok(v.map_or(Value::Null, Value::Float))
        }
        Type::NUMERIC => {
            let v: Option<Decimal> = row.try_get(idx).map_err(map_err)?;
            Ok(v.map_or(Value::Null, |v| Value::Decimal(v.to_string())))
        }
        Type::TIMESTAMPTZ => {
            let v: Option<DateTime<Utc>> = row.try_get(idx).map_err(map_err)?;
            Ok(v.map_or(Value::Null, Value::Timestamp))
        }
        Type::TIMESTAMP => {
            let v: Option<NaiveDateTime> = row.try_get(idx).map_err(map_err)?;
            Ok(v.map_or(Value::Null, |v| Value::Timestamp(v.and_utc())))
        }
        Type::DATE => {
            let v: Option<NaiveDate> = row.try_get(idx).map_err(map_err)?;
            Ok(v.map_or(Value::Null, Value::Date))
        }
        Type::UUID => {
            let v: Option<Uuid> = row.try_get(idx).map_err(map_err)?;
            Ok(v.map_or(Value::Null, Value::Uuid))
        }
        Type::JSON | Type::JSONB => {
            let v: Option<serde_json::Value> = row.try_get(idx).map_err(map_err)?;
            Ok(v.map_or(Value::Null, Value::Json))
        }
        Type::BYTEA => {
            let v: Option<Vec<u8>> = row.try_get(idx).map_err(map_err)?;
            Ok(v.map_or(Value::Null, Value::Bytes))
        }
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => {
            let v: Option<String> = row.try_get(idx).map_err(map_err)?;
            Ok(v.map_or(Value::Null, Value::Text))
        }
        _ => {
            // Unrecognised types are surfaced as text when the driver can
            // render them; anything else is a hydration failure.
            let v: Result<Option<String>, _> = row.try_get(idx);
            match v {
                Ok(v) => Ok(v.map_or(Value::Null, Value::Text)),
                Err(_) => Err(hydration_error(
                    column,
                    row_idx,
                    format!("unsupported postgres type {ty}"),
                )),
            }
        }
    }
}
