use crate::error::EngineError;
use crate::ir::{Condition, FilterNode, FilterOp, Operand};
use crate::value::Value;

use super::{write_expr, Dialect, SqlWriter};

/// Lower a filter tree into the writer.
///
/// Composite children of AND/OR groups are parenthesised; leaf conditions
/// are not, so `And[a, Or[b, c]]` renders as `a AND (b OR c)`.
pub(crate) fn write_filter(w: &mut SqlWriter, node: &FilterNode) -> Result<(), EngineError> {
    match node {
        FilterNode::Condition(cond) => write_condition(w, cond),
        FilterNode::And(children) => write_group(w, children, " AND "),
        FilterNode::Or(children) => write_group(w, children, " OR "),
        FilterNode::Not(child) => {
            w.push("NOT (");
            write_filter(w, child)?;
            w.push(")");
            Ok(())
        }
    }
}

fn write_group(
    w: &mut SqlWriter,
    children: &[FilterNode],
    separator: &str,
) -> Result<(), EngineError> {
    if children.is_empty() {
        return Err(EngineError::Build("empty filter group".into()));
    }
    if children.len() == 1 {
        return write_filter(w, &children[0]);
    }
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            w.push(separator);
        }
        let composite = matches!(child, FilterNode::And(items) | FilterNode::Or(items) if items.len() > 1);
        if composite {
            w.push("(");
            write_filter(w, child)?;
            w.push(")");
        } else {
            write_filter(w, child)?;
        }
    }
    Ok(())
}

fn write_condition(w: &mut SqlWriter, cond: &Condition) -> Result<(), EngineError> {
    match cond.op {
        FilterOp::Eq => write_comparison(w, cond, "=", "IS NULL"),
        FilterOp::Ne => write_comparison(w, cond, "<>", "IS NOT NULL"),
        FilterOp::Gt => write_ordering(w, cond, ">"),
        FilterOp::Gte => write_ordering(w, cond, ">="),
        FilterOp::Lt => write_ordering(w, cond, "<"),
        FilterOp::Lte => write_ordering(w, cond, "<="),
        FilterOp::In => write_in(w, cond),
        FilterOp::Between => write_between(w, cond),
        FilterOp::IsNull => write_is_null(w, cond),
        FilterOp::Contains => write_pattern(w, cond, Wrap::Both, false),
        FilterOp::IContains => write_pattern(w, cond, Wrap::Both, true),
        FilterOp::StartsWith => write_pattern(w, cond, Wrap::Suffix, false),
        FilterOp::IStartsWith => write_pattern(w, cond, Wrap::Suffix, true),
        FilterOp::EndsWith => write_pattern(w, cond, Wrap::Prefix, false),
        FilterOp::IEndsWith => write_pattern(w, cond, Wrap::Prefix, true),
        FilterOp::IExact => write_iexact(w, cond),
        FilterOp::Year | FilterOp::Month | FilterOp::Day => write_date_part(w, cond),
    }
}

fn single_value<'a>(cond: &'a Condition) -> Result<&'a Value, EngineError> {
    match &cond.operand {
        Operand::Value(v) => Ok(v),
        other => Err(EngineError::Build(format!(
            "operator {:?} on '{}' expects a single value, got {other:?}",
            cond.op, cond.field
        ))),
    }
}

fn text_value(cond: &Condition) -> Result<String, EngineError> {
    match single_value(cond)? {
        Value::Text(s) => Ok(s.clone()),
        other => Err(EngineError::Build(format!(
            "string operator {:?} on '{}' expects a text value, got {other:?}",
            cond.op, cond.field
        ))),
    }
}

/// `eq` / `ne` with a NULL operand lower to IS [NOT] NULL.
fn write_comparison(
    w: &mut SqlWriter,
    cond: &Condition,
    op: &str,
    null_form: &str,
) -> Result<(), EngineError> {
    w.push_ident(&cond.field);
    match &cond.operand {
        Operand::Value(Value::Null) => {
            w.push(" ");
            w.push(null_form);
        }
        Operand::Value(v) => {
            w.push(" ");
            w.push(op);
            w.push(" ");
            w.push_param(v.clone());
        }
        Operand::Expr(expr) => {
            w.push(" ");
            w.push(op);
            w.push(" ");
            write_expr(w, expr)?;
        }
        Operand::List(_) => {
            return Err(EngineError::Build(format!(
                "operator {op} on '{}' does not accept a list",
                cond.field
            )));
        }
    }
    Ok(())
}

fn write_ordering(w: &mut SqlWriter, cond: &Condition, op: &str) -> Result<(), EngineError> {
    w.push_ident(&cond.field);
    w.push(" ");
    w.push(op);
    w.push(" ");
    match &cond.operand {
        Operand::Value(v) => {
            w.push_param(v.clone());
            Ok(())
        }
        Operand::Expr(expr) => write_expr(w, expr),
        Operand::List(_) => Err(EngineError::Build(format!(
            "operator {op} on '{}' does not accept a list",
            cond.field
        ))),
    }
}

/// Empty IN compiles to a constant-false predicate so the surrounding query
/// still returns the empty set instead of erroring.
fn write_in(w: &mut SqlWriter, cond: &Condition) -> Result<(), EngineError> {
    let values = match &cond.operand {
        Operand::List(values) => values,
        other => {
            return Err(EngineError::Build(format!(
                "IN on '{}' expects a value list, got {other:?}",
                cond.field
            )));
        }
    };
    if values.is_empty() {
        w.push("1 = 0");
        return Ok(());
    }
    w.push_ident(&cond.field);
    w.push(" IN (");
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            w.push(", ");
        }
        w.push_param(value.clone());
    }
    w.push(")");
    Ok(())
}

fn write_between(w: &mut SqlWriter, cond: &Condition) -> Result<(), EngineError> {
    let values = match &cond.operand {
        Operand::List(values) if values.len() == 2 => values,
        _ => {
            return Err(EngineError::Build(format!(
                "BETWEEN on '{}' requires exactly two values",
                cond.field
            )));
        }
    };
    w.push_ident(&cond.field);
    w.push(" BETWEEN ");
    w.push_param(values[0].clone());
    w.push(" AND ");
    w.push_param(values[1].clone());
    Ok(())
}

fn write_is_null(w: &mut SqlWriter, cond: &Condition) -> Result<(), EngineError> {
    let wanted = match &cond.operand {
        Operand::Value(Value::Bool(b)) => *b,
        Operand::Value(Value::Null) => true,
        other => {
            return Err(EngineError::Build(format!(
                "isnull on '{}' expects a boolean, got {other:?}",
                cond.field
            )));
        }
    };
    w.push_ident(&cond.field);
    w.push(if wanted { " IS NULL" } else { " IS NOT NULL" });
    Ok(())
}

enum Wrap {
    /// `%value%`
    Both,
    /// `value%`
    Suffix,
    /// `%value`
    Prefix,
}

fn write_pattern(
    w: &mut SqlWriter,
    cond: &Condition,
    wrap: Wrap,
    case_insensitive: bool,
) -> Result<(), EngineError> {
    let text = text_value(cond)?;
    let pattern = match wrap {
        Wrap::Both => format!("%{text}%"),
        Wrap::Suffix => format!("{text}%"),
        Wrap::Prefix => format!("%{text}"),
    };
    if case_insensitive {
        match w.dialect {
            Dialect::Postgres => {
                w.push_ident(&cond.field);
                w.push(" ILIKE ");
                w.push_param(Value::Text(pattern));
            }
            Dialect::Sqlite | Dialect::MySql => {
                w.push("LOWER(");
                w.push_ident(&cond.field);
                w.push(") LIKE LOWER(");
                w.push_param(Value::Text(pattern));
                w.push(")");
            }
        }
    } else {
        w.push_ident(&cond.field);
        w.push(" LIKE ");
        w.push_param(Value::Text(pattern));
    }
    Ok(())
}

fn write_iexact(w: &mut SqlWriter, cond: &Condition) -> Result<(), EngineError> {
    let text = text_value(cond)?;
    w.push("LOWER(");
    w.push_ident(&cond.field);
    w.push(") = LOWER(");
    w.push_param(Value::Text(text));
    w.push(")");
    Ok(())
}

/// Date-part sequence starting at the named part; a list operand matches
/// consecutive parts, each compared for equality and joined with AND.
const DATE_PARTS: [(&str, &str, &str); 3] = [
    // (postgres EXTRACT field, sqlite strftime token, mysql function)
    ("YEAR", "%Y", "YEAR"),
    ("MONTH", "%m", "MONTH"),
    ("DAY", "%d", "DAY"),
];

fn write_date_part(w: &mut SqlWriter, cond: &Condition) -> Result<(), EngineError> {
    let start = match cond.op {
        FilterOp::Year => 0,
        FilterOp::Month => 1,
        FilterOp::Day => 2,
        _ => unreachable!("write_date_part called for non-date operator"),
    };
    let values: Vec<Value> = match &cond.operand {
        Operand::Value(v) => vec![v.clone()],
        Operand::List(values) if !values.is_empty() => values.clone(),
        other => {
            return Err(EngineError::Build(format!(
                "date lookup {:?} on '{}' expects a value or value list, got {other:?}",
                cond.op, cond.field
            )));
        }
    };
    if start + values.len() > DATE_PARTS.len() {
        return Err(EngineError::Build(format!(
            "date lookup {:?} on '{}' given {} parts but only {} remain",
            cond.op,
            cond.field,
            values.len(),
            DATE_PARTS.len() - start
        )));
    }

    let multi = values.len() > 1;
    if multi {
        w.push("(");
    }
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            w.push(" AND ");
        }
        let (pg_field, strftime, mysql_fn) = DATE_PARTS[start + i];
        match w.dialect {
            Dialect::Postgres => {
                w.push("EXTRACT(");
                w.push(pg_field);
                w.push(" FROM ");
                w.push_ident(&cond.field);
                w.push(") = ");
                w.push_param(value.clone());
            }
            Dialect::Sqlite => {
                w.push("CAST(STRFTIME('");
                w.push(strftime);
                w.push("', ");
                w.push_ident(&cond.field);
                w.push(") AS INTEGER) = ");
                w.push_param(value.clone());
            }
            Dialect::MySql => {
                w.push(mysql_fn);
                w.push("(");
                w.push_ident(&cond.field);
                w.push(") = ");
                w.push_param(value.clone());
            }
        }
    }
    if multi {
        w.push(")");
    }
    Ok(())
}
