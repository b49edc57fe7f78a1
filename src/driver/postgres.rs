use std::error::Error;
use std::str::FromStr;

use rust_decimal::Decimal;
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use tokio_postgres::Client;
use tokio_util::bytes;
use uuid::Uuid;

use crate::codec::RowsPayload;
use crate::error::EngineError;
use crate::hydrate;
use crate::value::Value;

use super::ExecOutcome;

/// Run a statement that produces rows.
pub(crate) async fn query(
    client: &Client,
    sql: &str,
    params: &[Value],
) -> Result<RowsPayload, EngineError> {
    let stmt = client.prepare(sql).await?;
    let refs = param_refs(params);
    let rows = client.query(&stmt, &refs).await?;
    hydrate::postgres::rows_payload(stmt.columns(), &rows)
}

/// Run a statement for its affected-row count. Postgres surfaces inserted
/// ids through RETURNING, so there is no last-insert-id here.
pub(crate) async fn execute(
    client: &Client,
    sql: &str,
    params: &[Value],
) -> Result<ExecOutcome, EngineError> {
    let stmt = client.prepare(sql).await?;
    let refs = param_refs(params);
    let affected = client.execute(&stmt, &refs).await?;
    Ok(ExecOutcome {
        affected,
        last_insert_id: None,
    })
}

/// Run parameterless control statements (BEGIN, SAVEPOINT, COMMIT, ...).
pub(crate) async fn batch(client: &Client, sql: &str) -> Result<(), EngineError> {
    client.batch_execute(sql).await?;
    Ok(())
}

fn param_refs(params: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

impl ToSql for Value {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut bytes::BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(b) => b.to_sql(ty, out),
            // Integers widen or narrow to the statement's declared type.
            Value::Int(i) => match *ty {
                Type::INT2 => i16::try_from(*i)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*i)?.to_sql(ty, out),
                Type::OID => u32::try_from(*i)?.to_sql(ty, out),
                Type::FLOAT4 => (*i as f32).to_sql(ty, out),
                Type::FLOAT8 => (*i as f64).to_sql(ty, out),
                Type::NUMERIC => Decimal::from(*i).to_sql(ty, out),
                _ => i.to_sql(ty, out),
            },
            Value::Float(f) => match *ty {
                Type::FLOAT4 => (*f as f32).to_sql(ty, out),
                _ => f.to_sql(ty, out),
            },
            Value::Decimal(s) => match *ty {
                Type::NUMERIC => Decimal::from_str(s)?.to_sql(ty, out),
                _ => s.to_sql(ty, out),
            },
            Value::Text(s) => match *ty {
                Type::UUID => Uuid::parse_str(s)?.to_sql(ty, out),
                _ => s.to_sql(ty, out),
            },
            Value::Bytes(b) => b.to_sql(ty, out),
            Value::Timestamp(dt) => match *ty {
                Type::TIMESTAMP => dt.naive_utc().to_sql(ty, out),
                Type::DATE => dt.date_naive().to_sql(ty, out),
                _ => dt.to_sql(ty, out),
            },
            Value::Date(d) => d.to_sql(ty, out),
            Value::Uuid(u) => match *ty {
                Type::TEXT | Type::VARCHAR => u.to_string().to_sql(ty, out),
                _ => u.to_sql(ty, out),
            },
            Value::Json(j) => j.to_sql(ty, out),
        }
    }

    fn accepts(ty: &Type) -> bool {
        matches!(
            *ty,
            Type::BOOL
                | Type::INT2
                | Type::INT4
                | Type::INT8
                | Type::OID
                | Type::FLOAT4
                | Type::FLOAT8
                | Type::NUMERIC
                | Type::TEXT
                | Type::VARCHAR
                | Type::BPCHAR
                | Type::NAME
                | Type::UNKNOWN
                | Type::BYTEA
                | Type::TIMESTAMP
                | Type::TIMESTAMPTZ
                | Type::DATE
                | Type::UUID
                | Type::JSON
                | Type::JSONB
        )
    }

    to_sql_checked!();
}
