//! Error type shared by the ledger repositories.

use sea_orm::{DbErr, RuntimeErr, SqlErr};

use ledgerline_core::ledger::{ErrorKind, LedgerError};
use ledgerline_shared::AppError;

/// Postgres SQLSTATEs that mean "retry the whole operation".
const RETRYABLE_SQLSTATES: [&str; 3] = [
    "40001", // serialization_failure
    "40P01", // deadlock_detected
    "55P03", // lock_not_available
];

/// Errors returned by repository operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Domain error: validation, state, concurrency, not-found.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Storage failure.
    #[error("Database error: {0}")]
    Database(DbErr),
}

impl From<DbErr> for StoreError {
    fn from(err: DbErr) -> Self {
        if is_retryable_conflict(&err) {
            return Self::Ledger(LedgerError::ConcurrentModification);
        }
        Self::Database(err)
    }
}

/// Returns true if the error is a lock or serialization conflict.
fn is_retryable_conflict(err: &DbErr) -> bool {
    let runtime = match err {
        DbErr::Exec(runtime) | DbErr::Query(runtime) => runtime,
        _ => return false,
    };
    let RuntimeErr::SqlxError(sqlx::Error::Database(db_err)) = runtime else {
        return false;
    };
    db_err
        .code()
        .is_some_and(|code| RETRYABLE_SQLSTATES.iter().any(|state| code == *state))
}

/// Returns true if the error is a unique constraint violation.
pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

impl StoreError {
    /// Returns the error category.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Ledger(err) => err.kind(),
            Self::Database(_) => ErrorKind::Fatal,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Ledger(err) => err.error_code(),
            Self::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::Ledger(err) => err.http_status_code(),
            Self::Database(_) => 500,
        }
    }

    /// Returns true if the caller should retry the whole operation.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Concurrency
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        let message = err.to_string();
        match err.kind() {
            ErrorKind::Validation => Self::Validation(message),
            ErrorKind::NotFound => Self::NotFound(message),
            ErrorKind::State => Self::Conflict(message),
            ErrorKind::Concurrency => Self::Retryable(message),
            ErrorKind::Drift => Self::BusinessRule(message),
            ErrorKind::Fatal => match err {
                StoreError::Database(_) => Self::Database(message),
                StoreError::Ledger(_) => Self::Internal(message),
            },
        }
    }
}
