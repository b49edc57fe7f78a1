use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rusqlite::types::ValueRef;
use uuid::Uuid;

use crate::error::EngineError;
use crate::value::Value;

use super::hydration_error;

/// Normalise one SQLite cell.
///
/// SQLite is dynamically typed, so the declared column type (when the
/// column maps to a table column) steers the interpretation of TEXT and
/// INTEGER storage: `BOOLEAN` columns holding 0/1 become booleans, declared
/// JSON/UUID/date-time columns are parsed, and NUMERIC text is carried as a
/// string decimal. Expression columns have no declared type and map by
/// storage class alone.
pub(crate) fn cell(
    value: ValueRef<'_>,
    decl: Option<&str>,
    column: &str,
    row_idx: usize,
) -> Result<Value, EngineError> {
    if matches!(value, ValueRef::Null) {
        return Ok(Value::Null);
    }
    let decl_upper = decl.map(str::to_uppercase);
    if let Some(decl) = decl_upper.as_deref() {
        if decl.contains("BOOL") {
            return match value {
                ValueRef::Integer(i) if i == 0 || i == 1 => Ok(Value::Bool(i == 1)),
                ValueRef::Integer(i) => Err(hydration_error(
                    column,
                    row_idx,
                    format!("boolean column holds {i}"),
                )),
                other => Err(hydration_error(
                    column,
                    row_idx,
                    format!("boolean column holds {}", storage_class(other)),
                )),
            };
        }
        if decl.contains("JSON") {
            let text = text_of(value, column, row_idx)?;
            return serde_json::from_str(&text)
                .map(Value::Json)
                .map_err(|e| hydration_error(column, row_idx, e));
        }
        if decl.contains("UUID") {
            let text = text_of(value, column, row_idx)?;
            return Uuid::parse_str(&text)
                .map(Value::Uuid)
                .map_err(|e| hydration_error(column, row_idx, e));
        }
        if decl.contains("DATETIME") || decl.contains("TIMESTAMP") {
            let text = text_of(value, column, row_idx)?;
            return parse_timestamp(&text)
                .ok_or_else(|| hydration_error(column, row_idx, format!("bad timestamp '{text}'")));
        }
        if decl.contains("DATE") {
            let text = text_of(value, column, row_idx)?;
            return NaiveDate::parse_from_str(&text, "%Y-%m-%d")
                .map(Value::Date)
                .map_err(|e| hydration_error(column, row_idx, e));
        }
        if decl.contains("NUMERIC") || decl.contains("DECIMAL") {
            return Ok(Value::Decimal(match value {
                ValueRef::Integer(i) => i.to_string(),
                ValueRef::Real(f) => f.to_string(),
                other => text_of(other, column, row_idx)?,
            }));
        }
    }
    match value {
        ValueRef::Integer(i) => Ok(Value::Int(i)),
        ValueRef::Real(f) => Ok(Value::Float(f)),
        ValueRef::Text(bytes) => String::from_utf8(bytes.to_vec())
            .map(Value::Text)
            .map_err(|e| hydration_error(column, row_idx, e)),
        ValueRef::Blob(bytes) => Ok(Value::Bytes(bytes.to_vec())),
        ValueRef::Null => Ok(Value::Null),
    }
}

fn text_of(value: ValueRef<'_>, column: &str, row_idx: usize) -> Result<String, EngineError> {
    match value {
        ValueRef::Text(bytes) => String::from_utf8(bytes.to_vec())
            .map_err(|e| hydration_error(column, row_idx, e)),
        other => Err(hydration_error(
            column,
            row_idx,
            format!("expected TEXT storage, found {}", storage_class(other)),
        )),
    }
}

fn storage_class(value: ValueRef<'_>) -> &'static str {
    match value {
        ValueRef::Null => "NULL",
        ValueRef::Integer(_) => "INTEGER",
        ValueRef::Real(_) => "REAL",
        ValueRef::Text(_) => "TEXT",
        ValueRef::Blob(_) => "BLOB",
    }
}

fn parse_timestamp(text: &str) -> Option<Value> {
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(Value::Timestamp(naive.and_utc()));
        }
    }
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| Value::Timestamp(dt.to_utc()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_normalisation() {
        let v = cell(ValueRef::Integer(1), Some("BOOLEAN"), "flag", 0).unwrap();
        assert_eq!(v, Value::Bool(true));
        let v = cell(ValueRef::Integer(0), Some("boolean"), "flag", 0).unwrap();
        assert_eq!(v, Value::Bool(false));
        assert!(cell(ValueRef::Integer(7), Some("BOOLEAN"), "flag", 0).is_err());
    }

    #[test]
    fn json_column_is_parsed() {
        let v = cell(ValueRef::Text(br#"{"a": 1}"#), Some("JSON"), "doc", 2).unwrap();
        assert_eq!(v, Value::Json(serde_json::json!({"a": 1})));
    }

    #[test]
    fn bad_json_is_hydration_error() {
        let err = cell(ValueRef::Text(b"{nope"), Some("JSON"), "doc", 3).unwrap_err();
        match err {
            EngineError::Hydration { column, row, .. } => {
                assert_eq!(column, "doc");
                assert_eq!(row, 3);
            }
            other => panic!("expected hydration error, got {other:?}"),
        }
    }

    #[test]
    fn datetime_formats() {
        for text in [
            "2024-01-01 08:00:01",
            "2024-01-01T08:00:01.250",
            "2024-01-01T08:00:01+00:00",
        ] {
            let v = cell(ValueRef::Text(text.as_bytes()), Some("DATETIME"), "c", 0).unwrap();
            assert!(matches!(v, Value::Timestamp(_)), "failed for {text}");
        }
    }

    #[test]
    fn decimal_declared_column_keeps_text() {
        let v = cell(ValueRef::Text(b"12.3400"), Some("DECIMAL(10,4)"), "n", 0).unwrap();
        assert_eq!(v, Value::Decimal("12.3400".into()));
    }

    #[test]
    fn dynamic_storage_classes() {
        assert_eq!(cell(ValueRef::Integer(5), None, "c", 0).unwrap(), Value::Int(5));
        assert_eq!(
            cell(ValueRef::Real(2.5), None, "c", 0).unwrap(),
            Value::Float(2.5)
        );
        assert_eq!(
            cell(ValueRef::Blob(b"ab"), None, "c", 0).unwrap(),
            Value::Bytes(b"ab".to_vec())
        );
        assert_eq!(cell(ValueRef::Null, Some("JSON"), "c", 0).unwrap(), Value::Null);
    }
}
