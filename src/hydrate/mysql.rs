use chrono::NaiveDate;
use mysql_async::consts::{ColumnFlags, ColumnType};
use mysql_async::{Row, Value as MySqlValue};

use crate::codec::RowsPayload;
use crate::error::EngineError;
use crate::value::Value;

use super::hydration_error;

/// Build a row payload from collected MySQL rows.
pub(crate) fn rows_payload(
    column_names: Vec<String>,
    rows: &[Row],
) -> Result<RowsPayload, EngineError> {
    let mut out = Vec::with_capacity(rows.len());
    for (row_idx, row) in rows.iter().enumerate() {
        out.push(row_values(row, row_idx)?);
    }
    Ok(RowsPayload {
        columns: column_names,
        rows: out,
    })
}

pub(crate) fn row_values(row: &Row, row_idx: usize) -> Result<Vec<Value>, EngineError> {
    let columns = row.columns_ref();
    let mut values = Vec::with_capacity(columns.len());
    for (idx, column) in columns.iter().enumerate() {
        let name = column.name_str().into_owned();
        let raw = row
            .as_ref(idx)
            .ok_or_else(|| hydration_error(&name, row_idx, "missing cell"))?;
        values.push(cell(
            raw,
            column.column_type(),
            column.flags(),
            column.column_length(),
            &name,
            row_idx,
        )?);
    }
    Ok(values)
}

fn cell(
    raw: &MySqlValue,
    ty: ColumnType,
    flags: ColumnFlags,
    display_width: u32,
    column: &str,
    row_idx: usize,
) -> Result<Value, EngineError> {
    if matches!(raw, MySqlValue::NULL) {
        return Ok(Value::Null);
    }
    match ty {
        ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL => {
            let text = text_of(raw, column, row_idx)?;
            Ok(Value::Decimal(text))
        }
        // TINYINT(1) is MySQL's boolean spelling.
        ColumnType::MYSQL_TYPE_TINY if display_width == 1 => match raw {
            MySqlValue::Int(v) => Ok(Value::Bool(*v != 0)),
            MySqlValue::UInt(v) => Ok(Value::Bool(*v != 0)),
            other => Err(hydration_error(
                column,
                row_idx,
                format!("boolean column holds {other:?}"),
            )),
        },
        ColumnType::MYSQL_TYPE_TINY
        | ColumnType::MYSQL_TYPE_SHORT
        | ColumnType::MYSQL_TYPE_INT24
        | ColumnType::MYSQL_TYPE_LONG
        | ColumnType::MYSQL_TYPE_LONGLONG
        | ColumnType::MYSQL_TYPE_YEAR => int_of(raw, column, row_idx),
        ColumnType::MYSQL_TYPE_FLOAT | ColumnType::MYSQL_TYPE_DOUBLE => match raw {
            MySqlValue::Float(v) => Ok(Value::Float(f64::from(*v))),
            MySqlValue::Double(v) => Ok(Value::Float(*v)),
            MySqlValue::Int(v) => Ok(Value::Float(*v as f64)),
            other => Err(hydration_error(
                column,
                row_idx,
                format!("float column holds {other:?}"),
            )),
        },
        ColumnType::MYSQL_TYPE_TIMESTAMP | ColumnType::MYSQL_TYPE_DATETIME => {
            timestamp_of(raw, column, row_idx)
        }
        ColumnType::MYSQL_TYPE_DATE | ColumnType::MYSQL_TYPE_NEWDATE => match raw {
            MySqlValue::Date(year, month, day, ..) => date_value(
                i32::from(*year),
                u32::from(*month),
                u32::from(*day),
                column,
                row_idx,
            ),
            other => Err(hydration_error(
                column,
                row_idx,
                format!("date column holds {other:?}"),
            )),
        },
        ColumnType::MYSQL_TYPE_JSON => {
            let text = text_of(raw, column, row_idx)?;
            serde_json::from_str(&text)
                .map(Value::Json)
                .map_err(|e| hydration_error(column, row_idx, e))
        }
        _ => match raw {
            MySqlValue::Bytes(bytes) => {
                if flags.contains(ColumnFlags::BINARY_FLAG) {
                    Ok(Value::Bytes(bytes.clone()))
                } else {
                    String::from_utf8(bytes.clone())
                        .map(Value::Text)
                        .map_err(|e| hydration_error(column, row_idx, e))
                }
            }
            MySqlValue::Int(v) => Ok(Value::Int(*v)),
            MySqlValue::UInt(v) => int_of(raw, column, row_idx).or(Ok(Value::Decimal(v.to_string()))),
            MySqlValue::Float(v) => Ok(Value::Float(f64::from(*v))),
            MySqlValue::Double(v) => Ok(Value::Float(*v)),
            other => Err(hydration_error(
                column,
                row_idx,
                format!("unsupported mysql value {other:?}"),
            )),
        },
    }
}

fn int_of(raw: &MySqlValue, column: &str, row_idx: usize) -> Result<Value, EngineError> {
    match raw {
        MySqlValue::Int(v) => Ok(Value::Int(*v)),
        MySqlValue::UInt(v) => i64::try_from(*v).map(Value::Int).map_err(|_| {
            hydration_error(column, row_idx, format!("unsigned value {v} overflows i64"))
        }),
        other => Err(hydration_error(
            column,
            row_idx,
            format!("integer column holds {other:?}"),
        )),
    }
}

fn text_of(raw: &MySqlValue, column: &str, row_idx: usize) -> Result<String, EngineError> {
    match raw {
        MySqlValue::Bytes(bytes) => String::from_utf8(bytes.clone())
            .map_err(|e| hydration_error(column, row_idx, e)),
        other => Err(hydration_error(
            column,
            row_idx,
            format!("expected text bytes, found {other:?}"),
        )),
    }
}

fn timestamp_of(raw: &MySqlValue, column: &str, row_idx: usize) -> Result<Value, EngineError> {
    match raw {
        MySqlValue::Date(year, month, day, hour, minute, second, micros) => {
            let date = NaiveDate::from_ymd_opt(i32::from(*year), u32::from(*month), u32::from(*day))
                .ok_or_else(|| hydration_error(column, row_idx, "invalid date components"))?;
            let naive = date
                .and_hms_micro_opt(
                    u32::from(*hour),
                    u32::from(*minute),
                    u32::from(*second),
                    *micros,
                )
                .ok_or_else(|| hydration_error(column, row_idx, "invalid time components"))?;
            Ok(Value::Timestamp(naive.and_utc()))
        }
        other => Err(hydration_error(
            column,
            row_idx,
            format!("timestamp column holds {other:?}"),
        )),
    }
}

fn date_value(
    year: i32,
    month: u32,
    day: u32,
    column: &str,
    row_idx: usize,
) -> Result<Value, EngineError> {
    NaiveDate::from_ymd_opt(year, month, day)
        .map(Value::Date)
        .ok_or_else(|| hydration_error(column, row_idx, "invalid date components"))
}
