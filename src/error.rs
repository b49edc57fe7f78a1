use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wire-facing error classification, mirrored by [`EngineError`].
///
/// This is what an embedder sees in the error envelope; the Rust API works
/// with the richer [`EngineError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Config,
    Usage,
    Protocol,
    Build,
    PoolTimeout,
    Connection,
    Integrity,
    NotFound,
    MultipleFound,
    TransactionTimeout,
    TransactionPoisoned,
    Hydration,
    Backend,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("usage error: {0}")]
    Usage(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("SQL build error: {0}")]
    Build(String),

    #[error("timed out acquiring a connection from pool '{pool}'")]
    PoolTimeout { pool: String },

    #[error("connection error: {0}")]
    Connection(String),

    #[error("integrity violation: {message}")]
    Integrity {
        message: String,
        constraint: Option<String>,
        column: Option<String>,
    },

    #[error("expected exactly one row, found none")]
    NotFound,

    #[error("expected exactly one row, found {count}")]
    MultipleFound { count: usize },

    #[error("transaction {id} rolled back after exceeding its deadline")]
    TransactionTimeout { id: u64 },

    #[error("transaction {id} is poisoned; roll it back to release the connection")]
    TransactionPoisoned { id: u64 },

    #[error("failed to decode column '{column}' in row {row}: {message}")]
    Hydration {
        column: String,
        row: usize,
        message: String,
    },

    #[error("backend error: {message}")]
    Backend {
        message: String,
        code: Option<String>,
    },
}

impl EngineError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Config(_) => ErrorKind::Config,
            EngineError::Usage(_) => ErrorKind::Usage,
            EngineError::Protocol(_) => ErrorKind::Protocol,
            EngineError::Build(_) => ErrorKind::Build,
            EngineError::PoolTimeout { .. } => ErrorKind::PoolTimeout,
            EngineError::Connection(_) => ErrorKind::Connection,
            EngineError::Integrity { .. } => ErrorKind::Integrity,
            EngineError::NotFound => ErrorKind::NotFound,
            EngineError::MultipleFound { .. } => ErrorKind::MultipleFound,
            EngineError::TransactionTimeout { .. } => ErrorKind::TransactionTimeout,
            EngineError::TransactionPoisoned { .. } => ErrorKind::TransactionPoisoned,
            EngineError::Hydration { .. } => ErrorKind::Hydration,
            EngineError::Backend { .. } => ErrorKind::Backend,
        }
    }

    /// Whether the underlying connection should be discarded rather than
    /// returned to its pool.
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(self, EngineError::Connection(_))
    }

    /// Backend-reported code (SQLSTATE, MySQL errno, SQLite result code).
    #[must_use]
    pub fn backend_code(&self) -> Option<&str> {
        match self {
            EngineError::Backend { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

impl From<tokio_postgres::Error> for EngineError {
    fn from(err: tokio_postgres::Error) -> Self {
        if let Some(db) = err.as_db_error() {
            let code = db.code().code();
            // SQLSTATE class 23: integrity constraint violations
            if code.starts_with("23") {
                return EngineError::Integrity {
                    message: db.message().to_string(),
                    constraint: db.constraint().map(str::to_owned),
                    column: db.column().map(str::to_owned),
                };
            }
            return EngineError::Backend {
                message: db.message().to_string(),
                code: Some(code.to_string()),
            };
        }
        if err.is_closed() {
            return EngineError::Connection(format!("postgres connection closed: {err}"));
        }
        EngineError::Connection(format!("postgres I/O error: {err}"))
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, message)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                let message = message
                    .clone()
                    .unwrap_or_else(|| "constraint violation".to_string());
                // rusqlite reports e.g. "UNIQUE constraint failed: users.email"
                let column = message
                    .rsplit_once(": ")
                    .map(|(_, target)| target.to_string());
                EngineError::Integrity {
                    message,
                    constraint: None,
                    column,
                }
            }
            rusqlite::Error::SqliteFailure(code, message) => EngineError::Backend {
                message: message.clone().unwrap_or_else(|| code.to_string()),
                code: Some(format!("{}", code.extended_code)),
            },
            _ => EngineError::Backend {
                message: err.to_string(),
                code: None,
            },
        }
    }
}

// MySQL errno families that signal constraint violations: duplicate key,
// NOT NULL, foreign key (parent/child), CHECK.
const MYSQL_INTEGRITY_CODES: &[u16] = &[1022, 1048, 1062, 1169, 1216, 1217, 1451, 1452, 3819];

impl From<mysql_async::Error> for EngineError {
    fn from(err: mysql_async::Error) -> Self {
        match err {
            mysql_async::Error::Server(server) => {
                if MYSQL_INTEGRITY_CODES.contains(&server.code) {
                    // "Duplicate entry 'x' for key 'users.email'"
                    let constraint = server
                        .message
                        .rsplit_once("for key '")
                        .and_then(|(_, tail)| tail.strip_suffix('\''))
                        .map(str::to_owned);
                    EngineError::Integrity {
                        message: server.message,
                        constraint,
                        column: None,
                    }
                } else {
                    EngineError::Backend {
                        message: server.message,
                        code: Some(server.code.to_string()),
                    }
                }
            }
            mysql_async::Error::Io(io) => EngineError::Connection(format!("mysql I/O error: {io}")),
            other => EngineError::Backend {
                message: other.to_string(),
                code: None,
            },
        }
    }
}

impl<E: Into<EngineError>> From<bb8::RunError<E>> for EngineError {
    fn from(err: bb8::RunError<E>) -> Self {
        match err {
            bb8::RunError::User(inner) => inner.into(),
            bb8::RunError::TimedOut => EngineError::PoolTimeout {
                pool: String::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_one_to_one() {
        assert_eq!(EngineError::NotFound.kind(), ErrorKind::NotFound);
        assert_eq!(
            EngineError::Integrity {
                message: "dup".into(),
                constraint: None,
                column: None
            }
            .kind(),
            ErrorKind::Integrity
        );
    }

    #[test]
    fn sqlite_constraint_maps_to_integrity() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: rusqlite::ErrorCode::ConstraintViolation,
                extended_code: 2067,
            },
            Some("UNIQUE constraint failed: users.email".to_string()),
        );
        let engine: EngineError = err.into();
        match engine {
            EngineError::Integrity { column, .. } => {
                assert_eq!(column.as_deref(), Some("users.email"));
            }
            other => panic!("expected integrity error, got {other:?}"),
        }
    }

    #[test]
    fn pool_timeout_classification() {
        let err: EngineError = bb8::RunError::<rusqlite::Error>::TimedOut.into();
        assert_eq!(err.kind(), ErrorKind::PoolTimeout);
        assert!(!err.is_connection_error());
    }
}
