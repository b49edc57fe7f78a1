use crate::error::EngineError;
use crate::ir::{AggregateKind, ArithOp, Expression, ScalarFn};

use super::{Dialect, SqlWriter};

/// Lower an expression tree into the writer.
///
/// Binary operands that are themselves binary operations are parenthesised
/// so the emitted SQL preserves the tree shape regardless of operator
/// precedence.
pub(crate) fn write_expr(w: &mut SqlWriter, expr: &Expression) -> Result<(), EngineError> {
    match expr {
        Expression::Column(name) => {
            w.push_ident(name);
            Ok(())
        }
        Expression::Literal(value) => {
            w.push_param(value.clone());
            Ok(())
        }
        Expression::BinOp { op, left, right } => {
            write_operand(w, left)?;
            w.push(match op {
                ArithOp::Add => " + ",
                ArithOp::Sub => " - ",
                ArithOp::Mul => " * ",
                ArithOp::Div => " / ",
            });
            write_operand(w, right)
        }
        Expression::Aggregate {
            kind,
            column,
            distinct,
        } => write_aggregate(w, *kind, column.as_deref(), *distinct),
        Expression::Func { kind, args } => write_func(w, *kind, args),
        Expression::RawFragment(text) => {
            w.push(text);
            Ok(())
        }
    }
}

fn write_operand(w: &mut SqlWriter, expr: &Expression) -> Result<(), EngineError> {
    if matches!(expr, Expression::BinOp { .. }) {
        w.push("(");
        write_expr(w, expr)?;
        w.push(")");
        Ok(())
    } else {
        write_expr(w, expr)
    }
}

fn write_aggregate(
    w: &mut SqlWriter,
    kind: AggregateKind,
    column: Option<&str>,
    distinct: bool,
) -> Result<(), EngineError> {
    let name = match kind {
        AggregateKind::Count => "COUNT",
        AggregateKind::Sum => "SUM",
        AggregateKind::Avg => "AVG",
        AggregateKind::Max => "MAX",
        AggregateKind::Min => "MIN",
    };
    w.push(name);
    w.push("(");
    match column {
        Some(col) => {
            if distinct {
                w.push("DISTINCT ");
            }
            w.push_ident(col);
        }
        None if kind == AggregateKind::Count => w.push("*"),
        None => {
            return Err(EngineError::Build(format!(
                "{name} aggregate requires a column"
            )));
        }
    }
    w.push(")");
    Ok(())
}

fn write_func(w: &mut SqlWriter, kind: ScalarFn, args: &[Expression]) -> Result<(), EngineError> {
    if args.is_empty() {
        return Err(EngineError::Build(format!(
            "{kind:?} requires at least one argument"
        )));
    }
    match kind {
        // SQLite spells concatenation with the || operator.
        ScalarFn::Concat if w.dialect == Dialect::Sqlite => {
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    w.push(" || ");
                }
                write_operand(w, arg)?;
            }
            Ok(())
        }
        ScalarFn::Concat | ScalarFn::Coalesce => {
            w.push(match kind {
                ScalarFn::Concat => "CONCAT(",
                ScalarFn::Coalesce => "COALESCE(",
            });
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    w.push(", ");
                }
                write_expr(w, arg)?;
            }
            w.push(")");
            Ok(())
        }
    }
}
