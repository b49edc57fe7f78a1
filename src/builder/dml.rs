use crate::error::EngineError;
use crate::ir::QueryIR;

use super::{write_expr, write_filter, SqlWriter};

/// Write a (possibly multi-row) INSERT.
///
/// Every row must carry the same column sequence; the driver is responsible
/// for chunking oversized batches before they reach the builder.
pub(crate) fn write_insert(w: &mut SqlWriter, ir: &QueryIR) -> Result<(), EngineError> {
    let columns: Vec<&str> = ir.insert_rows[0]
        .iter()
        .map(|(col, _)| col.as_str())
        .collect();
    for (i, row) in ir.insert_rows.iter().enumerate() {
        if row.len() != columns.len()
            || row.iter().zip(&columns).any(|((col, _), expected)| col != expected)
        {
            return Err(EngineError::Build(format!(
                "bulk insert row {i} does not match the column set of row 0"
            )));
        }
    }

    w.push("INSERT INTO ");
    w.push_ident(&ir.table);
    w.push(" (");
    for (i, col) in columns.iter().enumerate() {
        if i > 0 {
            w.push(",");
        }
        w.push_ident(col);
    }
    w.push(") VALUES ");
    for (i, row) in ir.insert_rows.iter().enumerate() {
        if i > 0 {
            w.push(",");
        }
        w.push("(");
        for (j, (_, value)) in row.iter().enumerate() {
            if j > 0 {
                w.push(",");
            }
            w.push_param(value.clone());
        }
        w.push(")");
    }
    write_returning(w, ir);
    Ok(())
}

pub(crate) fn write_update(w: &mut SqlWriter, ir: &QueryIR) -> Result<(), EngineError> {
    w.push("UPDATE ");
    w.push_ident(&ir.table);
    w.push(" SET ");
    for (i, (column, expr)) in ir.update_values.iter().enumerate() {
        if i > 0 {
            w.push(", ");
        }
        w.push_ident(column);
        w.push(" = ");
        write_expr(w, expr)?;
    }
    if let Some(filter) = &ir.filter {
        w.push(" WHERE ");
        write_filter(w, filter)?;
    }
    write_returning(w, ir);
    Ok(())
}

pub(crate) fn write_delete(w: &mut SqlWriter, ir: &QueryIR) -> Result<(), EngineError> {
    w.push("DELETE FROM ");
    w.push_ident(&ir.table);
    if let Some(filter) = &ir.filter {
        w.push(" WHERE ");
        write_filter(w, filter)?;
    }
    write_returning(w, ir);
    Ok(())
}

/// MySQL has no RETURNING; the driver reads the last-insert id instead.
fn write_returning(w: &mut SqlWriter, ir: &QueryIR) {
    if ir.returning.is_empty() || !w.dialect.supports_returning() {
        return;
    }
    w.push(" RETURNING ");
    for (i, col) in ir.returning.iter().enumerate() {
        if i > 0 {
            w.push(",");
        }
        w.push_ident(col);
    }
}
