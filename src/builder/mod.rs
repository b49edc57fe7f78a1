//! IR-to-SQL compilation.
//!
//! [`build`] is a pure function from `(QueryIR, Dialect)` to parameterised
//! SQL plus an ordered parameter vector. It performs no I/O, holds no state,
//! and is safe to call from any thread. Values never appear in the SQL text
//! (except `RawFragment`, which is a trusted splice by contract); everything
//! else is bound through the dialect's placeholder convention.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::ir::{Operation, QueryIR};
use crate::placeholder::scan_placeholders;
use crate::value::Value;

mod dml;
mod expr;
mod filter;
mod select;

pub(crate) use expr::write_expr;
pub(crate) use filter::write_filter;

/// Target SQL dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    Postgres,
    Sqlite,
    MySql,
}

impl Dialect {
    /// Whether the dialect supports `RETURNING` on DML statements.
    #[must_use]
    pub fn supports_returning(self) -> bool {
        matches!(self, Dialect::Postgres | Dialect::Sqlite)
    }

    /// Whether `FOR UPDATE` / `FOR SHARE` clauses apply. SQLite locks at
    /// database granularity, so the clauses are no-ops there.
    #[must_use]
    pub fn supports_row_locking(self) -> bool {
        matches!(self, Dialect::Postgres | Dialect::MySql)
    }

    fn quote_char(self) -> char {
        match self {
            Dialect::MySql => '`',
            Dialect::Postgres | Dialect::Sqlite => '"',
        }
    }
}

/// Accumulates SQL text and bound parameters while walking the IR.
///
/// Placeholders are emitted in parameter order, so Postgres indices are
/// strictly ascending and `?` markers match the parameter vector by
/// position.
pub(crate) struct SqlWriter {
    pub(crate) dialect: Dialect,
    sql: String,
    params: Vec<Value>,
}

impl SqlWriter {
    fn new(dialect: Dialect) -> Self {
        SqlWriter {
            dialect,
            sql: String::new(),
            params: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, text: &str) {
        self.sql.push_str(text);
    }

    /// Quote an identifier, quoting each dot-separated segment.
    pub(crate) fn push_ident(&mut self, ident: &str) {
        let quote = self.dialect.quote_char();
        for (i, part) in ident.split('.').enumerate() {
            if i > 0 {
                self.sql.push('.');
            }
            self.sql.push(quote);
            for ch in part.chars() {
                if ch == quote {
                    self.sql.push(quote);
                }
                self.sql.push(ch);
            }
            self.sql.push(quote);
        }
    }

    /// Bind a value and write its placeholder.
    pub(crate) fn push_param(&mut self, value: Value) {
        self.params.push(value);
        match self.dialect {
            Dialect::Postgres => {
                self.sql.push('$');
                self.sql.push_str(&self.params.len().to_string());
            }
            Dialect::Sqlite | Dialect::MySql => self.sql.push('?'),
        }
    }

    fn finish(self) -> (String, Vec<Value>) {
        (self.sql, self.params)
    }
}

/// Compile an IR into `(sql, params)` for the given dialect.
///
/// # Errors
///
/// Returns `EngineError::Usage` for IR shapes rejected by
/// [`QueryIR::validate`] and `EngineError::Build` for combinations the
/// dialect cannot express (bad expression arity, inconsistent bulk-insert
/// rows, mixed raw placeholder styles).
pub fn build(ir: &QueryIR, dialect: Dialect) -> Result<(String, Vec<Value>), EngineError> {
    ir.validate()?;
    let mut writer = SqlWriter::new(dialect);
    match ir.op {
        Operation::Select => select::write_select(&mut writer, ir, true)?,
        Operation::Insert => dml::write_insert(&mut writer, ir)?,
        Operation::Update => dml::write_update(&mut writer, ir)?,
        Operation::Delete => dml::write_delete(&mut writer, ir)?,
        Operation::Raw => return build_raw(ir, dialect),
        Operation::Explain => return build_explain(ir, dialect, false),
    }
    Ok(writer.finish())
}

/// Compile the EXPLAIN form of an IR, optionally with row execution
/// (`EXPLAIN (ANALYZE)` / `EXPLAIN ANALYZE`; SQLite always uses
/// `EXPLAIN QUERY PLAN`).
///
/// # Errors
///
/// Same failure modes as [`build`] for the underlying statement.
pub fn build_explain(
    ir: &QueryIR,
    dialect: Dialect,
    analyze: bool,
) -> Result<(String, Vec<Value>), EngineError> {
    ir.validate()?;
    let (sql, params) = if let Some(raw) = &ir.raw {
        validate_raw(&raw.sql, raw.params.len(), dialect)?;
        (raw.sql.clone(), raw.params.clone())
    } else {
        let mut writer = SqlWriter::new(dialect);
        select::write_select(&mut writer, ir, true)?;
        writer.finish()
    };
    let prefix = match (dialect, analyze) {
        (Dialect::Postgres, true) => "EXPLAIN (ANALYZE) ",
        (Dialect::Postgres, false) => "EXPLAIN ",
        (Dialect::Sqlite, _) => "EXPLAIN QUERY PLAN ",
        (Dialect::MySql, true) => "EXPLAIN ANALYZE ",
        (Dialect::MySql, false) => "EXPLAIN ",
    };
    Ok((format!("{prefix}{sql}"), params))
}

fn build_raw(ir: &QueryIR, dialect: Dialect) -> Result<(String, Vec<Value>), EngineError> {
    let raw = ir
        .raw
        .as_ref()
        .ok_or_else(|| EngineError::Usage("raw operation requires a raw payload".into()))?;
    validate_raw(&raw.sql, raw.params.len(), dialect)?;
    Ok((raw.sql.clone(), raw.params.clone()))
}

fn validate_raw(sql: &str, param_count: usize, dialect: Dialect) -> Result<(), EngineError> {
    let scan = scan_placeholders(sql);
    if scan.is_mixed() {
        return Err(EngineError::Build(
            "raw SQL mixes $n and ? placeholder styles".into(),
        ));
    }
    match dialect {
        Dialect::Postgres if scan.question > 0 => {
            return Err(EngineError::Build(
                "raw SQL uses ? placeholders against a Postgres pool".into(),
            ));
        }
        Dialect::Sqlite | Dialect::MySql if scan.max_dollar > 0 => {
            return Err(EngineError::Build(format!(
                "raw SQL uses $n placeholders against a {dialect:?} pool"
            )));
        }
        _ => {}
    }
    if scan.arity() != param_count {
        return Err(EngineError::Build(format!(
            "raw SQL expects {} parameters, {} supplied",
            scan.arity(),
            param_count
        )));
    }
    Ok(())
}
