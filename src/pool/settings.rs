use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::builder::Dialect;
use crate::error::EngineError;

/// Pool configuration as supplied by the embedder. All durations are
/// seconds; everything is optional and falls back to dialect-aware defaults
/// at [`PoolSettings::resolve`] time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoolSettings {
    #[serde(default)]
    pub max_connections: Option<u32>,
    #[serde(default)]
    pub min_connections: Option<u32>,
    #[serde(default)]
    pub acquire_timeout: Option<f64>,
    #[serde(default)]
    pub idle_timeout: Option<f64>,
    #[serde(default)]
    pub max_lifetime: Option<f64>,
    #[serde(default)]
    pub test_before_acquire: Option<bool>,
    #[serde(default)]
    pub transaction_timeout: Option<f64>,
    #[serde(default)]
    pub transaction_cleanup_interval: Option<f64>,
    #[serde(default)]
    pub sqlite_journal_mode: Option<String>,
    #[serde(default)]
    pub sqlite_synchronous: Option<String>,
    #[serde(default)]
    pub sqlite_cache_size: Option<i64>,
    /// Milliseconds, matching the PRAGMA unit.
    #[serde(default)]
    pub sqlite_busy_timeout: Option<i64>,
    #[serde(default)]
    pub insert_batch_size: Option<usize>,
    #[serde(default)]
    pub max_payload_bytes: Option<usize>,
}

/// PRAGMAs applied to every new SQLite connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlitePragmas {
    pub journal_mode: String,
    pub synchronous: String,
    pub cache_size: i64,
    pub busy_timeout_ms: i64,
}

/// Validated settings with defaults applied.
#[derive(Debug, Clone)]
pub struct ResolvedSettings {
    pub max_connections: u32,
    pub min_connections: Option<u32>,
    pub acquire_timeout: Duration,
    pub idle_timeout: Option<Duration>,
    pub max_lifetime: Option<Duration>,
    pub test_before_acquire: bool,
    pub transaction_timeout: Option<Duration>,
    pub transaction_cleanup_interval: Duration,
    pub sqlite: SqlitePragmas,
    pub insert_batch_size: usize,
    pub max_payload_bytes: usize,
}

const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_INSERT_BATCH: usize = 1000;
const DEFAULT_MAX_PAYLOAD: usize = 1024 * 1024;

fn duration_setting(name: &str, value: Option<f64>) -> Result<Option<Duration>, EngineError> {
    match value {
        None => Ok(None),
        Some(seconds) if seconds.is_finite() && seconds >= 0.0 => {
            Ok(Some(Duration::from_secs_f64(seconds)))
        }
        Some(seconds) => Err(EngineError::Config(format!(
            "{name} must be a non-negative number of seconds, got {seconds}"
        ))),
    }
}

impl PoolSettings {
    /// Validate and apply defaults for the target dialect.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Config` for negative durations or sizes and for
    /// an inconsistent min/max connection pair.
    pub fn resolve(&self, dialect: Dialect) -> Result<ResolvedSettings, EngineError> {
        let max_connections = match self.max_connections {
            Some(0) => {
                return Err(EngineError::Config("max_connections must be at least 1".into()));
            }
            Some(n) => n,
            // SQLite contends on a single writer, so its default pool is small.
            None => match dialect {
                Dialect::Sqlite => 4,
                Dialect::Postgres | Dialect::MySql => 10,
            },
        };
        if let Some(min) = self.min_connections {
            if min > max_connections {
                return Err(EngineError::Config(format!(
                    "min_connections ({min}) exceeds max_connections ({max_connections})"
                )));
            }
        }
        let insert_batch_size = match self.insert_batch_size {
            Some(0) => {
                return Err(EngineError::Config("insert_batch_size must be at least 1".into()));
            }
            Some(n) => n,
            None => DEFAULT_INSERT_BATCH,
        };
        let max_payload_bytes = match self.max_payload_bytes {
            Some(0) => {
                return Err(EngineError::Config("max_payload_bytes must be at least 1".into()));
            }
            Some(n) => n,
            None => DEFAULT_MAX_PAYLOAD,
        };
        if let Some(size) = self.sqlite_cache_size {
            if size < 0 {
                return Err(EngineError::Config(format!(
                    "sqlite_cache_size must be non-negative, got {size}"
                )));
            }
        }
        if let Some(ms) = self.sqlite_busy_timeout {
            if ms < 0 {
                return Err(EngineError::Config(format!(
                    "sqlite_busy_timeout must be non-negative, got {ms}"
                )));
            }
        }

        Ok(ResolvedSettings {
            max_connections,
            min_connections: self.min_connections,
            acquire_timeout: duration_setting("acquire_timeout", self.acquire_timeout)?
                .unwrap_or(DEFAULT_ACQUIRE_TIMEOUT),
            idle_timeout: duration_setting("idle_timeout", self.idle_timeout)?,
            max_lifetime: duration_setting("max_lifetime", self.max_lifetime)?,
            test_before_acquire: self.test_before_acquire.unwrap_or(false),
            transaction_timeout: duration_setting(
                "transaction_timeout",
                self.transaction_timeout,
            )?,
            transaction_cleanup_interval: duration_setting(
                "transaction_cleanup_interval",
                self.transaction_cleanup_interval,
            )?
            .unwrap_or(DEFAULT_CLEANUP_INTERVAL),
            sqlite: SqlitePragmas {
                journal_mode: self
                    .sqlite_journal_mode
                    .clone()
                    .unwrap_or_else(|| "WAL".to_string()),
                synchronous: self
                    .sqlite_synchronous
                    .clone()
                    .unwrap_or_else(|| "NORMAL".to_string()),
                cache_size: self.sqlite_cache_size.unwrap_or(10_000),
                busy_timeout_ms: self.sqlite_busy_timeout.unwrap_or(5_000),
            },
            insert_batch_size,
            max_payload_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn defaults_resolve() {
        let resolved = PoolSettings::default().resolve(Dialect::Sqlite).unwrap();
        assert_eq!(resolved.max_connections, 4);
        assert_eq!(resolved.acquire_timeout, DEFAULT_ACQUIRE_TIMEOUT);
        assert_eq!(resolved.sqlite.journal_mode, "WAL");
        assert_eq!(resolved.sqlite.synchronous, "NORMAL");
        assert_eq!(resolved.sqlite.cache_size, 10_000);
        assert_eq!(resolved.sqlite.busy_timeout_ms, 5_000);
        assert!(resolved.transaction_timeout.is_none());
    }

    #[test]
    fn negative_duration_rejected() {
        let settings = PoolSettings {
            acquire_timeout: Some(-1.0),
            ..PoolSettings::default()
        };
        let err = settings.resolve(Dialect::Postgres).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn negative_pragma_rejected() {
        let settings = PoolSettings {
            sqlite_busy_timeout: Some(-5),
            ..PoolSettings::default()
        };
        assert!(settings.resolve(Dialect::Sqlite).is_err());
    }

    #[test]
    fn min_above_max_rejected() {
        let settings = PoolSettings {
            max_connections: Some(2),
            min_connections: Some(5),
            ..PoolSettings::default()
        };
        assert!(settings.resolve(Dialect::Postgres).is_err());
    }

    #[test]
    fn dialect_dependent_max() {
        assert_eq!(
            PoolSettings::default()
                .resolve(Dialect::Postgres)
                .unwrap()
                .max_connections,
            10
        );
    }
}
