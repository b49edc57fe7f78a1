use std::future::Future;
use std::sync::Arc;

use bb8::ManageConnection;
use tokio::task::spawn_blocking;

use crate::error::EngineError;

use super::settings::SqlitePragmas;
use super::url::SqlitePath;

/// Shared, mutex-guarded SQLite connection handle. rusqlite is synchronous,
/// so every statement runs inside `spawn_blocking` while holding the lock.
pub type SharedSqliteConnection = Arc<tokio::sync::Mutex<rusqlite::Connection>>;

/// bb8 manager for SQLite connections.
pub struct SqliteManager {
    path: SqlitePath,
    pragmas: SqlitePragmas,
}

impl SqliteManager {
    #[must_use]
    pub fn new(path: SqlitePath, pragmas: SqlitePragmas) -> Self {
        Self { path, pragmas }
    }

    fn open(&self) -> Result<rusqlite::Connection, EngineError> {
        let conn = rusqlite::Connection::open(&self.path.path).map_err(EngineError::from)?;
        let script = format!(
            "PRAGMA journal_mode = {};\n\
             PRAGMA synchronous = {};\n\
             PRAGMA cache_size = {};\n\
             PRAGMA busy_timeout = {};",
            self.pragmas.journal_mode,
            self.pragmas.synchronous,
            self.pragmas.cache_size,
            self.pragmas.busy_timeout_ms,
        );
        conn.execute_batch(&script).map_err(EngineError::from)?;
        Ok(conn)
    }
}

impl ManageConnection for SqliteManager {
    type Connection = SharedSqliteConnection;
    type Error = EngineError;

    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let opened = self.open();
        async move { opened.map(|conn| Arc::new(tokio::sync::Mutex::new(conn))) }
    }

    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        let conn = Arc::clone(conn);
        async move {
            spawn_blocking(move || {
                let guard = conn.blocking_lock();
                guard
                    .query_row("SELECT 1", [], |_row| Ok(()))
                    .map_err(EngineError::from)
            })
            .await
            .map_err(|e| {
                EngineError::Connection(format!("sqlite validation join error: {e}"))
            })?
        }
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}
