use crate::error::EngineError;
use crate::ir::{JoinSpec, LockMode, NullsOrder, OrderSpec, QueryIR};

use super::{write_expr, write_filter, Dialect, SqlWriter};

/// Write a complete SELECT statement.
///
/// `include_tail` controls ORDER BY / LIMIT / OFFSET / locking; UNION arms
/// are written without their tail so the combined statement stays valid and
/// the outer query's ordering applies to the union result.
pub(crate) fn write_select(
    w: &mut SqlWriter,
    ir: &QueryIR,
    include_tail: bool,
) -> Result<(), EngineError> {
    w.push("SELECT ");
    if ir.distinct {
        w.push("DISTINCT ");
    }
    write_projection(w, ir)?;
    w.push(" FROM ");
    w.push_ident(&ir.table);

    for join in &ir.joins {
        write_join(w, ir, join);
    }

    if let Some(filter) = &ir.filter {
        w.push(" WHERE ");
        write_filter(w, filter)?;
    }

    if !ir.group_by.is_empty() {
        w.push(" GROUP BY ");
        for (i, col) in ir.group_by.iter().enumerate() {
            if i > 0 {
                w.push(", ");
            }
            w.push_ident(col);
        }
    }

    if let Some(having) = &ir.having {
        w.push(" HAVING ");
        write_filter(w, having)?;
    }

    for union in &ir.unions {
        w.push(if union.distinct { " UNION " } else { " UNION ALL " });
        write_select(w, &union.query, false)?;
    }

    if include_tail {
        write_order_by(w, &ir.order_by);
        write_limit_offset(w, ir.limit, ir.offset);
        write_locking(w, ir.locking);
    }
    Ok(())
}

fn write_projection(w: &mut SqlWriter, ir: &QueryIR) -> Result<(), EngineError> {
    let join_columns: usize = ir.joins.iter().map(|j| j.columns.len()).sum();
    if ir.columns.is_empty() && ir.annotations.is_empty() && join_columns == 0 {
        w.push("*");
        return Ok(());
    }

    let mut first = true;
    let mut sep = |w: &mut SqlWriter| {
        if first {
            first = false;
        } else {
            w.push(", ");
        }
    };

    for col in &ir.columns {
        sep(w);
        w.push_ident(col);
    }
    for join in &ir.joins {
        for col in &join.columns {
            sep(w);
            w.push_ident(&join.alias);
            w.push(".");
            w.push_ident(&col.column);
            w.push(" AS ");
            w.push_ident(&format!("{}__{}", join.result_prefix, col.field));
        }
    }
    for (name, expr) in &ir.annotations {
        sep(w);
        write_expr(w, expr)?;
        w.push(" AS ");
        w.push_ident(name);
    }
    Ok(())
}

fn write_join(w: &mut SqlWriter, ir: &QueryIR, join: &JoinSpec) {
    let parent = join.parent_alias.as_deref().unwrap_or(&ir.table);
    w.push(" LEFT JOIN ");
    w.push_ident(&join.table);
    w.push(" AS ");
    w.push_ident(&join.alias);
    w.push(" ON ");
    w.push_ident(parent);
    w.push(".");
    w.push_ident(&join.source_column);
    w.push(" = ");
    w.push_ident(&join.alias);
    w.push(".");
    w.push_ident(&join.target_column);
}

fn write_order_by(w: &mut SqlWriter, order_by: &[OrderSpec]) {
    if order_by.is_empty() {
        return;
    }
    w.push(" ORDER BY ");
    for (i, spec) in order_by.iter().enumerate() {
        if i > 0 {
            w.push(", ");
        }
        // MySQL has no NULLS FIRST/LAST; an IS NULL sort key in front of the
        // column reproduces the placement.
        if w.dialect == Dialect::MySql {
            if let Some(nulls) = spec.nulls {
                w.push_ident(&spec.column);
                w.push(match nulls {
                    NullsOrder::First => " IS NULL DESC, ",
                    NullsOrder::Last => " IS NULL ASC, ",
                });
            }
        }
        w.push_ident(&spec.column);
        if spec.descending {
            w.push(" DESC");
        }
        if w.dialect != Dialect::MySql {
            match spec.nulls {
                Some(NullsOrder::First) => w.push(" NULLS FIRST"),
                Some(NullsOrder::Last) => w.push(" NULLS LAST"),
                None => {}
            }
        }
    }
}

fn write_limit_offset(w: &mut SqlWriter, limit: Option<i64>, offset: Option<i64>) {
    match (limit, offset) {
        (Some(limit), Some(offset)) => {
            w.push(&format!(" LIMIT {limit} OFFSET {offset}"));
        }
        (Some(limit), None) => {
            w.push(&format!(" LIMIT {limit}"));
        }
        (None, Some(offset)) => match w.dialect {
            // OFFSET alone is only valid on Postgres.
            Dialect::Postgres => w.push(&format!(" OFFSET {offset}")),
            Dialect::Sqlite => w.push(&format!(" LIMIT -1 OFFSET {offset}")),
            Dialect::MySql => w.push(&format!(" LIMIT 18446744073709551615 OFFSET {offset}")),
        },
        (None, None) => {}
    }
}

fn write_locking(w: &mut SqlWriter, locking: LockMode) {
    if !w.dialect.supports_row_locking() {
        return;
    }
    match locking {
        LockMode::None => {}
        LockMode::ForUpdate => w.push(" FOR UPDATE"),
        LockMode::ForShare => w.push(" FOR SHARE"),
    }
}
