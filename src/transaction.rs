//! Transaction table, nested savepoints, and the timeout reaper.
//!
//! A transaction pins one pooled connection for its whole lifetime. Depth 1
//! is the outer `BEGIN`; every nested begin creates a savepoint named after
//! the depth at which it was opened (`sp1`, `sp2`, ...). Depth only moves
//! after the corresponding statement succeeded, so a failed savepoint leaves
//! the outer transaction usable.
//!
//! A handle observed by a cancelled statement or a connection-level error is
//! poisoned: every operation except rollback fails with
//! `TRANSACTION_POISONED`, and the outermost rollback releases the pinned
//! connection via `ROLLBACK`.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, OnceLock};
use std::time::Instant;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::builder::Dialect;
use crate::driver;
use crate::error::EngineError;
use crate::pool::PoolConnection;
use crate::registry::{self, PoolEntry};

/// Flags shared between the transaction table, in-flight statements, and
/// cancellation guards.
pub(crate) struct TxShared {
    poisoned: AtomicBool,
    rollback_requested: AtomicBool,
}

impl TxShared {
    pub(crate) fn poison(&self) {
        self.poisoned.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::SeqCst)
    }

    fn rollback_requested(&self) -> bool {
        self.rollback_requested.load(Ordering::SeqCst)
    }
}

struct TxInner {
    conn: Option<PoolConnection>,
    depth: u32,
}

pub(crate) struct TxEntry {
    id: u64,
    pool_name: String,
    pub(crate) dialect: Dialect,
    #[allow(dead_code)]
    created_at: Instant,
    deadline: Option<Instant>,
    pub(crate) shared: Arc<TxShared>,
    inner: Arc<AsyncMutex<TxInner>>,
}

struct TxTable {
    entries: RwLock<HashMap<u64, Arc<TxEntry>>>,
    /// Ids recently finalised by the reaper, kept so late owner calls can be
    /// told apart from ids that never existed.
    reaped: StdMutex<VecDeque<u64>>,
    next_id: AtomicU64,
}

const REAPED_TOMBSTONES: usize = 256;

fn table() -> &'static TxTable {
    static TABLE: OnceLock<TxTable> = OnceLock::new();
    TABLE.get_or_init(|| TxTable {
        entries: RwLock::new(HashMap::new()),
        reaped: StdMutex::new(VecDeque::new()),
        next_id: AtomicU64::new(0),
    })
}

fn was_reaped(id: u64) -> bool {
    table()
        .reaped
        .lock()
        .map(|reaped| reaped.contains(&id))
        .unwrap_or(false)
}

fn record_reaped(id: u64) {
    if let Ok(mut reaped) = table().reaped.lock() {
        if reaped.len() == REAPED_TOMBSTONES {
            reaped.pop_front();
        }
        reaped.push_back(id);
    }
}

async fn get(id: u64) -> Result<Arc<TxEntry>, EngineError> {
    if let Some(entry) = table().entries.read().await.get(&id) {
        return Ok(Arc::clone(entry));
    }
    if was_reaped(id) {
        return Err(EngineError::TransactionTimeout { id });
    }
    Err(EngineError::Usage(format!("unknown transaction {id}")))
}

fn lock_inner(entry: &TxEntry) -> Result<OwnedMutexGuard<TxInner>, EngineError> {
    Arc::clone(&entry.inner).try_lock_owned().map_err(|_| {
        EngineError::Usage(format!(
            "transaction {} is already in use by another task",
            entry.id
        ))
    })
}

/// Exclusive access to a transaction's pinned connection for one statement.
pub(crate) struct TxLease {
    entry: Arc<TxEntry>,
    guard: OwnedMutexGuard<TxInner>,
}

impl TxLease {
    pub(crate) fn conn_mut(&mut self) -> Result<&mut PoolConnection, EngineError> {
        let id = self.entry.id;
        self.guard
            .conn
            .as_mut()
            .ok_or(EngineError::TransactionPoisoned { id })
    }

    pub(crate) fn shared(&self) -> Arc<TxShared> {
        Arc::clone(&self.entry.shared)
    }

    pub(crate) fn pool_name(&self) -> &str {
        &self.entry.pool_name
    }
}

/// Take the per-statement lease on a transaction, enforcing single-task use
/// and rejecting poisoned handles.
pub(crate) async fn lease(id: u64) -> Result<TxLease, EngineError> {
    let entry = get(id).await?;
    if entry.shared.is_poisoned() {
        return Err(EngineError::TransactionPoisoned { id });
    }
    let guard = lock_inner(&entry)?;
    Ok(TxLease { entry, guard })
}

/// Poisons the shared flags when dropped while armed; every awaited
/// statement inside a transaction runs under one of these so cancellation
/// mid-statement transitions the handle to POISONED.
pub(crate) struct PoisonScope {
    shared: Arc<TxShared>,
    armed: bool,
}

impl PoisonScope {
    pub(crate) fn arm(shared: Arc<TxShared>) -> Self {
        PoisonScope {
            shared,
            armed: true,
        }
    }

    pub(crate) fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PoisonScope {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!("statement cancelled mid-flight; poisoning transaction handle");
            self.shared.poison();
        }
    }
}

/// Run a control statement on the pinned connection, with cancellation and
/// connection-error poisoning. A connection-level failure also marks the
/// pinned connection broken so the pool discards it once released.
async fn control(entry: &TxEntry, inner: &mut TxInner, sql: &str) -> Result<(), EngineError> {
    let conn = inner.conn.as_mut().ok_or(EngineError::TransactionPoisoned {
        id: entry.id,
    })?;
    let scope = PoisonScope::arm(Arc::clone(&entry.shared));
    let result = driver::run_batch(conn, sql).await;
    scope.disarm();
    if let Err(err) = &result {
        if err.is_connection_error() {
            entry.shared.poison();
            if let Some(conn) = inner.conn.as_mut() {
                conn.mark_broken();
            }
        }
    }
    result
}

/// Begin a transaction on the named pool: pin a connection, `BEGIN`, and
/// register the handle.
///
/// # Errors
///
/// Propagates pool acquisition failures (`POOL_TIMEOUT`) and the `BEGIN`
/// statement error; on failure the connection goes straight back to the
/// pool.
pub async fn begin(pool_name: &str) -> Result<u64, EngineError> {
    let pool = registry::lookup(pool_name).await?;
    let mut conn = pool.pool.acquire(&pool.name).await?;
    driver::run_batch(&mut conn, "BEGIN").await?;

    let id = table().next_id.fetch_add(1, Ordering::SeqCst) + 1;
    let deadline = pool
        .settings
        .transaction_timeout
        .map(|timeout| Instant::now() + timeout);
    let entry = Arc::new(TxEntry {
        id,
        pool_name: pool.name.clone(),
        dialect: pool.dialect,
        created_at: Instant::now(),
        deadline,
        shared: Arc::new(TxShared {
            poisoned: AtomicBool::new(false),
            rollback_requested: AtomicBool::new(false),
        }),
        inner: Arc::new(AsyncMutex::new(TxInner {
            conn: Some(conn),
            depth: 1,
        })),
    });
    table().entries.write().await.insert(id, entry);
    tracing::debug!(pool = pool_name, tx = id, "transaction begun");
    Ok(id)
}

/// Open a nested scope: `SAVEPOINT sp<depth>`, then increment depth.
///
/// # Errors
///
/// Fails with `TRANSACTION_POISONED` on a poisoned handle and `USAGE` on
/// concurrent use; a savepoint statement failure leaves depth untouched.
pub async fn begin_savepoint(id: u64) -> Result<(), EngineError> {
    let entry = get(id).await?;
    if entry.shared.is_poisoned() {
        return Err(EngineError::TransactionPoisoned { id });
    }
    let mut guard = lock_inner(&entry)?;
    let name = format!("sp{}", guard.depth);
    control(&entry, &mut guard, &format!("SAVEPOINT {name}")).await?;
    guard.depth += 1;
    Ok(())
}

/// Commit the innermost scope: release the savepoint at depth > 1, or run
/// the outer `COMMIT` (or `ROLLBACK`, when the rollback flag was set) and
/// return the connection to its pool.
///
/// # Errors
///
/// `TRANSACTION_POISONED` for poisoned handles, `USAGE` for unknown ids or
/// concurrent use, and the underlying statement error otherwise. A failed
/// outer commit poisons the handle; rollback then releases the connection.
pub async fn commit(id: u64) -> Result<(), EngineError> {
    let entry = get(id).await?;
    if entry.shared.is_poisoned() {
        return Err(EngineError::TransactionPoisoned { id });
    }
    let mut guard = lock_inner(&entry)?;
    if guard.depth > 1 {
        let name = format!("sp{}", guard.depth - 1);
        control(&entry, &mut guard, &format!("RELEASE SAVEPOINT {name}")).await?;
        guard.depth -= 1;
        return Ok(());
    }

    let statement = if entry.shared.rollback_requested() {
        "ROLLBACK"
    } else {
        "COMMIT"
    };
    if let Err(err) = control(&entry, &mut guard, statement).await {
        entry.shared.poison();
        return Err(err);
    }
    guard.depth = 0;
    finalize(&entry, &mut guard).await;
    tracing::debug!(tx = id, statement, "transaction finalised");
    Ok(())
}

/// Roll back the innermost scope, or the whole transaction at depth 1.
///
/// On a poisoned handle, nested rollbacks only unwind depth; the outermost
/// rollback issues a best-effort `ROLLBACK` and releases the connection.
/// Rolling back a handle the reaper already finalised is a no-op.
///
/// # Errors
///
/// `USAGE` for unknown ids or concurrent use; statement errors from
/// `ROLLBACK TO SAVEPOINT` on a healthy handle.
pub async fn rollback(id: u64) -> Result<(), EngineError> {
    let entry = match get(id).await {
        Ok(entry) => entry,
        // The reaper got here first; owner-driven finalisation is a no-op.
        Err(EngineError::TransactionTimeout { .. }) => return Ok(()),
        Err(err) => return Err(err),
    };
    let mut guard = lock_inner(&entry)?;
    if guard.depth > 1 {
        if entry.shared.is_poisoned() {
            guard.depth -= 1;
            return Ok(());
        }
        let name = format!("sp{}", guard.depth - 1);
        control(&entry, &mut guard, &format!("ROLLBACK TO SAVEPOINT {name}")).await?;
        guard.depth -= 1;
        return Ok(());
    }

    if let Err(err) = control(&entry, &mut guard, "ROLLBACK").await {
        tracing::warn!(tx = id, "rollback failed; discarding pinned connection: {err}");
    }
    guard.depth = 0;
    finalize(&entry, &mut guard).await;
    tracing::debug!(tx = id, "transaction rolled back");
    Ok(())
}

/// Request that the outermost commit execute `ROLLBACK` instead. Nested
/// scopes are unaffected.
///
/// # Errors
///
/// `USAGE` when the id is unknown.
pub async fn set_rollback(id: u64) -> Result<(), EngineError> {
    let entry = get(id).await?;
    entry.shared.rollback_requested.store(true, Ordering::SeqCst);
    Ok(())
}

/// Current nesting depth, mainly for bookkeeping assertions.
///
/// # Errors
///
/// `USAGE` when the id is unknown.
pub async fn depth(id: u64) -> Result<u32, EngineError> {
    let entry = get(id).await?;
    let guard = lock_inner(&entry)?;
    Ok(guard.depth)
}

async fn finalize(entry: &TxEntry, guard: &mut TxInner) {
    table().entries.write().await.remove(&entry.id);
    // Dropping the pooled connection returns it to the pool.
    guard.conn.take();
}

/// Acquire the cross-process schema lock on the transaction's pinned
/// connection. Lock and unlock run on the same connection, which is what
/// makes Postgres advisory locks and MySQL named locks correct here.
/// SQLite locks at database level already and needs nothing.
///
/// # Errors
///
/// Usual transaction errors plus the backend's statement error.
pub async fn acquire_schema_lock(id: u64, key: i64) -> Result<(), EngineError> {
    schema_lock_statement(id, key, true).await
}

/// Release the schema lock taken by [`acquire_schema_lock`].
///
/// # Errors
///
/// Usual transaction errors plus the backend's statement error.
pub async fn release_schema_lock(id: u64, key: i64) -> Result<(), EngineError> {
    schema_lock_statement(id, key, false).await
}

async fn schema_lock_statement(id: u64, key: i64, acquire: bool) -> Result<(), EngineError> {
    let entry = get(id).await?;
    if entry.shared.is_poisoned() {
        return Err(EngineError::TransactionPoisoned { id });
    }
    // The key is an i64 from our own API, so inlining it keeps these on the
    // same parameterless control path as BEGIN/SAVEPOINT statements.
    let sql = match (entry.dialect, acquire) {
        (Dialect::Postgres, true) => format!("SELECT pg_advisory_lock({key})"),
        (Dialect::Postgres, false) => format!("SELECT pg_advisory_unlock({key})"),
        (Dialect::MySql, true) => format!("SELECT GET_LOCK('sqlbridge:{key}', -1)"),
        (Dialect::MySql, false) => format!("SELECT RELEASE_LOCK('sqlbridge:{key}')"),
        (Dialect::Sqlite, _) => return Ok(()),
    };
    let mut guard = lock_inner(&entry)?;
    control(&entry, &mut guard, &sql).await
}

/// Spawn the background reaper for a pool. It wakes every
/// `transaction_cleanup_interval` and force-rolls-back any of the pool's
/// transactions whose deadline has passed.
pub(crate) fn spawn_reaper(pool: Arc<PoolEntry>) -> JoinHandle<()> {
    let interval = pool.settings.transaction_cleanup_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so sweeps start one
        // interval after pool creation.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            sweep(&pool.name).await;
        }
    })
}

async fn sweep(pool_name: &str) {
    let now = Instant::now();
    let expired: Vec<Arc<TxEntry>> = table()
        .entries
        .read()
        .await
        .values()
        .filter(|entry| {
            entry.pool_name == pool_name && entry.deadline.is_some_and(|d| d <= now)
        })
        .cloned()
        .collect();

    for entry in expired {
        // An owner mid-statement keeps the lock; the next sweep retries.
        let Ok(mut guard) = Arc::clone(&entry.inner).try_lock_owned() else {
            continue;
        };
        if table().entries.write().await.remove(&entry.id).is_none() {
            continue; // owner finalised concurrently
        }
        record_reaped(entry.id);
        entry.shared.poison();
        if let Some(mut conn) = guard.conn.take() {
            if let Err(err) = driver::run_batch(&mut conn, "ROLLBACK").await {
                if err.is_connection_error() {
                    conn.mark_broken();
                }
                tracing::warn!(tx = entry.id, "reaper rollback failed: {err}");
            }
        }
        guard.depth = 0;
        tracing::warn!(
            tx = entry.id,
            pool = pool_name,
            "transaction exceeded its deadline and was rolled back"
        );
    }
}

/// Roll back and drop every live transaction pinned to the named pool.
/// Used by pool shutdown before connections are closed.
pub(crate) async fn rollback_all_for_pool(pool_name: &str) {
    let mine: Vec<Arc<TxEntry>> = table()
        .entries
        .read()
        .await
        .values()
        .filter(|entry| entry.pool_name == pool_name)
        .cloned()
        .collect();

    for entry in mine {
        table().entries.write().await.remove(&entry.id);
        match Arc::clone(&entry.inner).try_lock_owned() {
            Ok(mut guard) => {
                if let Some(mut conn) = guard.conn.take() {
                    let _ = driver::run_batch(&mut conn, "ROLLBACK").await;
                }
                guard.depth = 0;
            }
            Err(_) => {
                // A task is mid-statement; poisoning makes it fail fast and
                // the connection drops with the guard.
                entry.shared.poison();
            }
        }
        tracing::debug!(tx = entry.id, pool = pool_name, "transaction drained at pool close");
    }
}
