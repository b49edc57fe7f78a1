/*!
 * sqlbridge - an async multi-dialect SQL execution core
 *
 * This crate is the data-access engine underneath a higher-level model
 * layer: it accepts a declarative query description (the IR), compiles it
 * to dialect-correct parameterised SQL, and executes it on pooled async
 * connections against PostgreSQL, SQLite, or MySQL, with nested
 * savepoint transactions and a background reaper for abandoned handles.
 *
 * # Features
 *
 * - Pure IR-to-SQL compiler with per-dialect placeholder, quoting, and
 *   feature handling (RETURNING, row locking, date extraction)
 * - Named connection pools (bb8) with lifecycle policy and SQLite PRAGMAs
 * - Nested transactions via savepoints, rollback-flag semantics,
 *   poisoning on cancellation, and deadline-based reaping
 * - Dialect-aware row hydration into one scalar value domain
 * - A MessagePack wire codec for embedding-language bindings
 *
 * # Example
 *
 * ```rust,no_run
 * use sqlbridge::prelude::*;
 *
 * async fn demo() -> Result<(), EngineError> {
 *     init_pool("main", "sqlite:///:memory:", &PoolSettings::default()).await?;
 *
 *     let mut ir = QueryIR::new(Operation::Select, "users");
 *     ir.columns = vec!["id".into(), "name".into()];
 *     ir.filter = Some(FilterNode::cond(
 *         "age",
 *         FilterOp::Gte,
 *         Operand::Value(Value::Int(18)),
 *     ));
 *
 *     let response = execute_ir("main", &ir, None).await?;
 *     if let Response::Rows { rows, .. } = response {
 *         for row in rows {
 *             println!("{row:?}");
 *         }
 *     }
 *
 *     close_pool("main").await;
 *     Ok(())
 * }
 * ```
 */

pub mod bridge;
pub mod builder;
pub mod codec;
pub mod driver;
pub mod error;
pub mod hydrate;
pub mod ir;
pub mod placeholder;
pub mod pool;
pub mod registry;
pub mod transaction;
pub mod value;

pub use builder::{build, build_explain, Dialect};
pub use codec::{
    decode_ir, decode_response, encode_ir, encode_response, ErrorEnvelope, PrefetchResult,
    Response, RowsPayload, WIRE_VERSION,
};
pub use driver::{execute_ir, explain_ir, get_or_create};
pub use error::{EngineError, ErrorKind};
pub use ir::{
    AggregateKind, ArithOp, Condition, Expression, FilterNode, FilterOp, JoinColumn, JoinSpec,
    LockMode, NullsOrder, Operand, Operation, OrderSpec, PrefetchSpec, QueryIR, RawQuery,
    ScalarFn, UnionSpec,
};
pub use pool::{PoolSettings, ResolvedSettings};
pub use registry::{close_all, close_pool, init_pool, init_pool_overwrite};
pub use value::Value;

/// Everything needed for typical embedder-facing use.
pub mod prelude {
    pub use crate::bridge;
    pub use crate::builder::{build, Dialect};
    pub use crate::codec::{decode_response, encode_ir, Response, RowsPayload};
    pub use crate::driver::{execute_ir, explain_ir, get_or_create};
    pub use crate::error::{EngineError, ErrorKind};
    pub use crate::ir::{
        Condition, Expression, FilterNode, FilterOp, LockMode, Operand, Operation, OrderSpec,
        QueryIR, RawQuery,
    };
    pub use crate::pool::PoolSettings;
    pub use crate::registry::{close_all, close_pool, init_pool, init_pool_overwrite};
    pub use crate::transaction::{
        begin, begin_savepoint, commit, rollback, set_rollback,
    };
    pub use crate::value::Value;
}
