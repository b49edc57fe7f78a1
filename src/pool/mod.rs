//! Connection pooling for the three supported backends.
//!
//! Each backend gets a small `bb8::ManageConnection` implementation; the
//! [`EnginePool`] enum wraps the per-backend pools behind one acquisition
//! API so the driver never branches on driver-native pool types.

pub mod mysql;
pub mod postgres;
pub mod settings;
pub mod sqlite;
pub mod url;

pub use settings::{PoolSettings, ResolvedSettings};
pub use url::BackendTarget;

use bb8::PooledConnection;

use crate::builder::Dialect;
use crate::error::EngineError;

use mysql::MySqlManager;
use postgres::PostgresManager;
use sqlite::SqliteManager;

/// A named backend pool.
pub enum EnginePool {
    Postgres(bb8::Pool<PostgresManager>),
    Sqlite(bb8::Pool<SqliteManager>),
    MySql(bb8::Pool<MySqlManager>),
}

// Manual Debug because the managed connection types do not all expose Debug.
impl std::fmt::Debug for EnginePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Postgres(_) => f.debug_tuple("Postgres").finish(),
            Self::Sqlite(_) => f.debug_tuple("Sqlite").finish(),
            Self::MySql(_) => f.debug_tuple("MySql").finish(),
        }
    }
}

/// A connection checked out of an [`EnginePool`], owned until dropped.
///
/// Dropping the wrapper returns the connection to its pool; broken
/// connections are discarded by the manager's health hooks instead of being
/// reused.
pub enum PoolConnection {
    Postgres(PooledConnection<'static, PostgresManager>),
    Sqlite(PooledConnection<'static, SqliteManager>),
    MySql(PooledConnection<'static, MySqlManager>),
}

impl std::fmt::Debug for PoolConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Postgres(_) => f.debug_tuple("Postgres").finish(),
            Self::Sqlite(_) => f.debug_tuple("Sqlite").finish(),
            Self::MySql(_) => f.debug_tuple("MySql").finish(),
        }
    }
}

impl PoolConnection {
    /// Flag the connection as broken so its manager's `has_broken` discards
    /// it on return instead of reusing it. Postgres clients already report
    /// closure through `Client::is_closed`; SQLite is in-process and never
    /// surfaces connection-level errors.
    pub(crate) fn mark_broken(&mut self) {
        match self {
            PoolConnection::MySql(conn) => conn.mark_broken(),
            PoolConnection::Postgres(_) | PoolConnection::Sqlite(_) => {}
        }
    }
}

impl EnginePool {
    #[must_use]
    pub fn dialect(&self) -> Dialect {
        match self {
            EnginePool::Postgres(_) => Dialect::Postgres,
            EnginePool::Sqlite(_) => Dialect::Sqlite,
            EnginePool::MySql(_) => Dialect::MySql,
        }
    }

    /// Connect a pool for the parsed backend target.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Connection` if the pool cannot be built or the
    /// initial connection fails.
    pub async fn connect(
        target: BackendTarget,
        settings: &ResolvedSettings,
    ) -> Result<Self, EngineError> {
        match target {
            BackendTarget::Postgres(config) => {
                let pool = configure_builder(settings)
                    .build(PostgresManager::new(config))
                    .await
                    .map_err(|e| {
                        EngineError::Connection(format!("failed to build postgres pool: {e}"))
                    })?;
                Ok(EnginePool::Postgres(pool))
            }
            BackendTarget::Sqlite(path) => {
                let pool = configure_builder(settings)
                    .build(SqliteManager::new(path, settings.sqlite.clone()))
                    .await
                    .map_err(|e| {
                        EngineError::Connection(format!("failed to build sqlite pool: {e}"))
                    })?;
                Ok(EnginePool::Sqlite(pool))
            }
            BackendTarget::MySql(opts) => {
                let pool = configure_builder(settings)
                    .build(MySqlManager::new(opts))
                    .await
                    .map_err(|e| {
                        EngineError::Connection(format!("failed to build mysql pool: {e}"))
                    })?;
                Ok(EnginePool::MySql(pool))
            }
        }
    }

    /// Check a connection out of the pool, honouring the acquire timeout.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::PoolTimeout` when `acquire_timeout` elapses and
    /// the backend's connection error otherwise.
    pub async fn acquire(&self, pool_name: &str) -> Result<PoolConnection, EngineError> {
        let result = match self {
            EnginePool::Postgres(pool) => {
                pool.get_owned().await.map(PoolConnection::Postgres).map_err(map_run_error)
            }
            EnginePool::Sqlite(pool) => {
                pool.get_owned().await.map(PoolConnection::Sqlite).map_err(map_run_error)
            }
            EnginePool::MySql(pool) => {
                pool.get_owned().await.map(PoolConnection::MySql).map_err(map_run_error)
            }
        };
        result.map_err(|err| match err {
            EngineError::PoolTimeout { .. } => EngineError::PoolTimeout {
                pool: pool_name.to_string(),
            },
            other => other,
        })
    }
}

fn map_run_error<E: Into<EngineError>>(err: bb8::RunError<E>) -> EngineError {
    err.into()
}

fn configure_builder<M: bb8::ManageConnection>(settings: &ResolvedSettings) -> bb8::Builder<M> {
    bb8::Pool::builder()
        .max_size(settings.max_connections)
        .min_idle(settings.min_connections)
        .connection_timeout(settings.acquire_timeout)
        .idle_timeout(settings.idle_timeout)
        .max_lifetime(settings.max_lifetime)
        .test_on_check_out(settings.test_before_acquire)
}
