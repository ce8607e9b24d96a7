//! # Engine Error Types
//!
//! The error every engine operation returns.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      LedgerError Categories                             │
//! │                                                                         │
//! │  ┌─────────────────────┐  ┌─────────────────────┐  ┌────────────────┐ │
//! │  │  Core (business)    │  │  Db (infrastructure)│  │  Config        │ │
//! │  │                     │  │                     │  │                │ │
//! │  │  Validation         │  │  Busy        ◄─ retry│  │  bad TOML      │ │
//! │  │  InsufficientStock  │  │  PoolExhausted ◄ retry│ │  bad values    │ │
//! │  │  InvalidOtp, ...    │  │  QueryFailed, ...   │  │                │ │
//! │  │  never retried      │  │                     │  │                │ │
//! │  └─────────────────────┘  └─────────────────────┘  └────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Business errors raised by a database guard (a failed stock decrement
//! inside `medledger-db`) arrive as `DbError::Domain` and are flattened
//! into `LedgerError::Core`, so callers match on one place.

use medledger_core::{CoreError, ValidationError};
use medledger_db::DbError;
use thiserror::Error;

/// Result type alias for engine operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Business rule, validation, or not-found failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Persistence failure.
    #[error(transparent)]
    Db(DbError),

    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<DbError> for LedgerError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Domain(core) => LedgerError::Core(core),
            other => LedgerError::Db(other),
        }
    }
}

impl From<ValidationError> for LedgerError {
    fn from(err: ValidationError) -> Self {
        LedgerError::Core(err.into())
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        DbError::from(err).into()
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::Config(err.to_string())
    }
}

impl From<toml::de::Error> for LedgerError {
    fn from(err: toml::de::Error) -> Self {
        LedgerError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for LedgerError {
    fn from(err: toml::ser::Error) -> Self {
        LedgerError::Config(err.to_string())
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl LedgerError {
    /// Returns true if the whole unit of work may be run again.
    ///
    /// Only lock contention and pool exhaustion qualify; nothing was
    /// committed in either case.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Db(e) if e.is_transient())
    }

    /// The business error, if this is one.
    pub fn as_core(&self) -> Option<&CoreError> {
        match self {
            LedgerError::Core(e) => Some(e),
            _ => None,
        }
    }
}
