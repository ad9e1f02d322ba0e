//! # Database Error Types
//!
//! Error types for storage and engine operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  ValidationError ──► CoreError ─┐                                      │
//! │                                 │                                       │
//! │  SQLite Error (sqlx::Error) ────┼──► DbError (this module)             │
//! │                                 │        │                              │
//! │  Config file / TOML errors ─────┘        ▼                              │
//! │                                  caller (HTTP layer, seed binary)      │
//! │                                                                         │
//! │  Any DbError returned from inside a unit of work drops the open        │
//! │  transaction, which rolls it back.                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use galley_core::{CoreError, ValidationError};
use thiserror::Error;

/// Database and engine errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Unknown id for the tenant, or a soft-deleted catalog row.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A unique, foreign-key, check or not-null constraint rejected a write.
    #[error("Constraint violated: {0}")]
    Constraint(String),

    /// Another unit of work held the write lock past `busy_timeout`.
    ///
    /// The transaction was rolled back; nothing was applied.
    #[error("Timed out waiting for the ledger write lock")]
    LockTimeout,

    /// No pooled connection became free within the acquire timeout.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Business rule or validation failure from galley-core.
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::NotFound { .. })
    }

    /// True for input that was rejected before any lock was taken.
    pub fn is_validation(&self) -> bool {
        matches!(self, DbError::Core(CoreError::Validation(_)))
    }

    /// True when retrying the whole unit of work may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DbError::LockTimeout | DbError::PoolExhausted)
    }
}

impl From<ValidationError> for DbError {
    fn from(err: ValidationError) -> Self {
        DbError::Core(CoreError::Validation(err))
    }
}

/// SQLite primary result codes for a held lock (`SQLITE_BUSY`, `SQLITE_LOCKED`).
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// ```text
/// RowNotFound                    → NotFound
/// Database, constraint kind      → Constraint
/// Database, BUSY / LOCKED code   → LockTimeout
/// Database, anything else        → QueryFailed
/// PoolTimedOut                   → PoolExhausted
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                use sqlx::error::ErrorKind;

                match db_err.kind() {
                    ErrorKind::UniqueViolation
                    | ErrorKind::ForeignKeyViolation
                    | ErrorKind::NotNullViolation
                    | ErrorKind::CheckViolation => DbError::Constraint(db_err.message().to_string()),
                    _ => {
                        // Extended codes keep the primary code in the low byte
                        let primary = db_err
                            .code()
                            .and_then(|code| code.parse::<i32>().ok())
                            .map(|code| code & 0xff);
                        match primary {
                            Some(SQLITE_BUSY) | Some(SQLITE_LOCKED) => DbError::LockTimeout,
                            _ => DbError::QueryFailed(db_err.message().to_string()),
                        }
                    }
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<std::io::Error> for DbError {
    fn from(err: std::io::Error) -> Self {
        DbError::Config(err.to_string())
    }
}

impl From<toml::de::Error> for DbError {
    fn from(err: toml::de::Error) -> Self {
        DbError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for DbError {
    fn from(err: toml::ser::Error) -> Self {
        DbError::Config(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
