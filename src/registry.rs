//! Process-wide registry of named pools.
//!
//! Pool names are unique: registering an existing name fails unless the
//! caller explicitly overwrites. Closing a pool drains its live
//! transactions (rollback), stops its reaper, and drops the pool; closing a
//! pool that does not exist is a no-op.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, OnceLock};

use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::builder::Dialect;
use crate::error::EngineError;
use crate::pool::{url, EnginePool, PoolSettings, ResolvedSettings};
use crate::transaction;

/// A registered pool plus its resolved policy.
pub struct PoolEntry {
    pub name: String,
    pub dialect: Dialect,
    pub pool: EnginePool,
    pub settings: ResolvedSettings,
    reaper: StdMutex<Option<JoinHandle<()>>>,
}

impl PoolEntry {
    fn stop_reaper(&self) {
        if let Ok(mut slot) = self.reaper.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }
}

fn pools() -> &'static RwLock<HashMap<String, Arc<PoolEntry>>> {
    static POOLS: OnceLock<RwLock<HashMap<String, Arc<PoolEntry>>>> = OnceLock::new();
    POOLS.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Register a pool under a unique name.
///
/// # Errors
///
/// `CONFIG` for a malformed URL, invalid settings, or a name already in
/// use; `CONNECTION` if the backend pool cannot be built.
pub async fn init_pool(name: &str, url: &str, settings: &PoolSettings) -> Result<(), EngineError> {
    init_inner(name, url, settings, false).await
}

/// Register a pool, replacing (and draining) any pool with the same name.
///
/// # Errors
///
/// Same as [`init_pool`], minus the uniqueness failure.
pub async fn init_pool_overwrite(
    name: &str,
    url: &str,
    settings: &PoolSettings,
) -> Result<(), EngineError> {
    init_inner(name, url, settings, true).await
}

async fn init_inner(
    name: &str,
    url: &str,
    settings: &PoolSettings,
    overwrite: bool,
) -> Result<(), EngineError> {
    if name.is_empty() {
        return Err(EngineError::Config("pool name must not be empty".into()));
    }
    let target = url::parse_url(url)?;
    let dialect = target.dialect();
    let resolved = settings.resolve(dialect)?;

    if !overwrite && pools().read().await.contains_key(name) {
        return Err(EngineError::Config(format!(
            "pool '{name}' is already registered"
        )));
    }

    let pool = EnginePool::connect(target, &resolved).await?;
    let entry = Arc::new(PoolEntry {
        name: name.to_string(),
        dialect,
        pool,
        settings: resolved,
        reaper: StdMutex::new(None),
    });
    let reaper = transaction::spawn_reaper(Arc::clone(&entry));
    if let Ok(mut slot) = entry.reaper.lock() {
        *slot = Some(reaper);
    }

    let replaced = {
        let mut map = pools().write().await;
        if !overwrite && map.contains_key(name) {
            // Lost a registration race after the uniqueness check.
            drop(map);
            entry.stop_reaper();
            return Err(EngineError::Config(format!(
                "pool '{name}' is already registered"
            )));
        }
        map.insert(name.to_string(), entry)
    };

    if let Some(old) = replaced {
        transaction::rollback_all_for_pool(name).await;
        old.stop_reaper();
    }
    tracing::debug!(pool = name, ?dialect, "pool registered");
    Ok(())
}

/// Look up a registered pool.
///
/// # Errors
///
/// `USAGE` when no pool carries the name.
pub async fn lookup(name: &str) -> Result<Arc<PoolEntry>, EngineError> {
    pools()
        .read()
        .await
        .get(name)
        .cloned()
        .ok_or_else(|| EngineError::Usage(format!("unknown pool '{name}'")))
}

/// Close a pool: drain its transactions, stop its reaper, drop its
/// connections. Succeeds silently when the pool is absent.
pub async fn close_pool(name: &str) {
    let removed = pools().write().await.remove(name);
    let Some(entry) = removed else {
        return;
    };
    transaction::rollback_all_for_pool(name).await;
    entry.stop_reaper();
    tracing::debug!(pool = name, "pool closed");
}

/// Close every registered pool.
pub async fn close_all() {
    let names: Vec<String> = pools().read().await.keys().cloned().collect();
    for name in names {
        close_pool(&name).await;
    }
}
