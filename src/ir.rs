//! The intermediate representation consumed by the SQL builder.
//!
//! An embedder constructs a [`QueryIR`] (usually via the wire codec), the
//! builder lowers it to dialect-specific SQL, and the driver executes it.
//! The IR is declarative and dialect-neutral; everything backend-specific
//! happens at build time.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::value::Value;

/// Query operation selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Select,
    Insert,
    Update,
    Delete,
    Raw,
    Explain,
}

/// Filter operators available in a [`Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Between,
    IsNull,
    Contains,
    IContains,
    StartsWith,
    IStartsWith,
    EndsWith,
    IEndsWith,
    IExact,
    Year,
    Month,
    Day,
}

/// Right-hand side of a condition: a single value, a value list
/// (`in`, `between`, date-part tuples), or a computed expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    Value(Value),
    List(Vec<Value>),
    Expr(Expression),
}

/// A single comparison against a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub op: FilterOp,
    pub operand: Operand,
}

/// Recursive boolean filter tree for WHERE and HAVING clauses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterNode {
    Condition(Condition),
    And(Vec<FilterNode>),
    Or(Vec<FilterNode>),
    Not(Box<FilterNode>),
}

impl FilterNode {
    /// Convenience constructor for a leaf condition.
    #[must_use]
    pub fn cond(field: impl Into<String>, op: FilterOp, operand: Operand) -> Self {
        FilterNode::Condition(Condition {
            field: field.into(),
            op,
            operand,
        })
    }
}

/// Arithmetic operators for [`Expression::BinOp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Aggregate function selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateKind {
    Count,
    Sum,
    Avg,
    Max,
    Min,
}

/// Scalar function selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarFn {
    Concat,
    Coalesce,
}

/// Computed expression usable in projections, annotations, UPDATE values,
/// and condition operands.
///
/// `RawFragment` text is spliced into the SQL verbatim and is therefore a
/// trusted fragment; it must never carry user input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    Column(String),
    Literal(Value),
    BinOp {
        op: ArithOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Aggregate {
        kind: AggregateKind,
        column: Option<String>,
        distinct: bool,
    },
    Func {
        kind: ScalarFn,
        args: Vec<Expression>,
    },
    RawFragment(String),
}

/// ORDER BY entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSpec {
    pub column: String,
    #[serde(default)]
    pub descending: bool,
    #[serde(default)]
    pub nulls: Option<NullsOrder>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullsOrder {
    First,
    Last,
}

/// A resolved relation join. The external model layer resolves FK paths
/// before the IR reaches the core, so a join carries concrete table and
/// column names plus the alias prefix under which joined columns surface
/// in the result (`prefix__field`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinSpec {
    pub table: String,
    pub alias: String,
    /// Alias of the parent relation; the root table when absent.
    #[serde(default)]
    pub parent_alias: Option<String>,
    /// FK column on the parent side.
    pub source_column: String,
    /// Referenced column on the joined table.
    pub target_column: String,
    pub result_prefix: String,
    pub columns: Vec<JoinColumn>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinColumn {
    pub field: String,
    pub column: String,
}

/// Reverse-relation prefetch, executed as a follow-up SELECT whose IN list
/// is the set of parent keys from the primary result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefetchSpec {
    pub name: String,
    pub table: String,
    /// Column on the parent rows whose values seed the IN list.
    pub parent_key: String,
    /// FK column on the prefetched table matched against the parent keys.
    pub child_key: String,
    pub columns: Vec<String>,
}

/// Row-locking clause selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockMode {
    #[default]
    None,
    ForUpdate,
    ForShare,
}

/// One UNION arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnionSpec {
    pub query: Box<QueryIR>,
    /// `false` keeps duplicates (UNION ALL).
    #[serde(default)]
    pub distinct: bool,
}

/// Verbatim SQL with pre-bound parameters, bypassing the builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawQuery {
    pub sql: String,
    #[serde(default)]
    pub params: Vec<Value>,
}

/// The declarative query description compiled by the SQL builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryIR {
    pub op: Operation,
    #[serde(default)]
    pub table: String,
    /// Projected columns; empty means `*`.
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub filter: Option<FilterNode>,
    #[serde(default)]
    pub order_by: Vec<OrderSpec>,
    #[serde(default)]
    pub group_by: Vec<String>,
    #[serde(default)]
    pub having: Option<FilterNode>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
    #[serde(default)]
    pub joins: Vec<JoinSpec>,
    #[serde(default)]
    pub prefetches: Vec<PrefetchSpec>,
    /// Output name → expression, in projection order.
    #[serde(default)]
    pub annotations: Vec<(String, Expression)>,
    /// INSERT rows as ordered (column, value) pairs.
    #[serde(default)]
    pub insert_rows: Vec<Vec<(String, Value)>>,
    /// UPDATE assignments as ordered (column, expression) pairs.
    #[serde(default)]
    pub update_values: Vec<(String, Expression)>,
    #[serde(default)]
    pub unions: Vec<UnionSpec>,
    #[serde(default)]
    pub locking: LockMode,
    #[serde(default)]
    pub distinct: bool,
    #[serde(default)]
    pub returning: Vec<String>,
    #[serde(default)]
    pub raw: Option<RawQuery>,
    /// SELECT must produce exactly one row (`get()` semantics).
    #[serde(default)]
    pub expect_one: bool,
}

impl QueryIR {
    /// Minimal IR for the given operation and table; callers fill in the rest.
    #[must_use]
    pub fn new(op: Operation, table: impl Into<String>) -> Self {
        QueryIR {
            op,
            table: table.into(),
            columns: Vec::new(),
            filter: None,
            order_by: Vec::new(),
            group_by: Vec::new(),
            having: None,
            limit: None,
            offset: None,
            joins: Vec::new(),
            prefetches: Vec::new(),
            annotations: Vec::new(),
            insert_rows: Vec::new(),
            update_values: Vec::new(),
            unions: Vec::new(),
            locking: LockMode::None,
            distinct: false,
            returning: Vec::new(),
            raw: None,
            expect_one: false,
        }
    }

    /// Structural validation performed before SQL generation.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Usage` for shapes that can never compile:
    /// negative limit/offset, empty bulk insert, a RAW operation without a
    /// raw payload, or a missing table on table-bound operations.
    pub fn validate(&self) -> Result<(), EngineError> {
        if let Some(limit) = self.limit {
            if limit < 0 {
                return Err(EngineError::Usage(format!("negative limit: {limit}")));
            }
        }
        if let Some(offset) = self.offset {
            if offset < 0 {
                return Err(EngineError::Usage(format!("negative offset: {offset}")));
            }
        }
        match self.op {
            Operation::Raw => {
                if self.raw.is_none() {
                    return Err(EngineError::Usage(
                        "raw operation requires a raw payload".into(),
                    ));
                }
            }
            Operation::Insert => {
                if self.table.is_empty() {
                    return Err(EngineError::Usage("insert requires a table".into()));
                }
                if self.insert_rows.is_empty() {
                    return Err(EngineError::Usage("empty bulk insert".into()));
                }
            }
            Operation::Update => {
                if self.table.is_empty() {
                    return Err(EngineError::Usage("update requires a table".into()));
                }
                if self.update_values.is_empty() {
                    return Err(EngineError::Usage("update without assignments".into()));
                }
            }
            Operation::Select | Operation::Delete | Operation::Explain => {
                if self.table.is_empty() && self.raw.is_none() {
                    return Err(EngineError::Usage(format!(
                        "{:?} requires a table",
                        self.op
                    )));
                }
            }
        }
        for union in &self.unions {
            union.query.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_limit_rejected() {
        let mut ir = QueryIR::new(Operation::Select, "users");
        ir.limit = Some(-1);
        assert!(matches!(ir.validate(), Err(EngineError::Usage(_))));
    }

    #[test]
    fn empty_bulk_insert_rejected() {
        let ir = QueryIR::new(Operation::Insert, "users");
        assert!(matches!(ir.validate(), Err(EngineError::Usage(_))));
    }

    #[test]
    fn raw_requires_payload() {
        let ir = QueryIR::new(Operation::Raw, "");
        assert!(ir.validate().is_err());

        let mut ir = QueryIR::new(Operation::Raw, "");
        ir.raw = Some(RawQuery {
            sql: "SELECT 1".into(),
            params: vec![],
        });
        assert!(ir.validate().is_ok());
    }

    #[test]
    fn union_arms_are_validated() {
        let mut inner = QueryIR::new(Operation::Select, "b");
        inner.limit = Some(-5);
        let mut outer = QueryIR::new(Operation::Select, "a");
        outer.unions.push(UnionSpec {
            query: Box::new(inner),
            distinct: true,
        });
        assert!(outer.validate().is_err());
    }
}
