//! Ledger error types.
//!
//! Every failure the ledger can report falls into one of the categories of
//! [`ErrorKind`]: validation, state, concurrency, drift, not-found, or fatal.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use super::types::EntryStatus;

/// Error category, used for propagation and HTTP mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or rule-breaking request; nothing was applied.
    Validation,
    /// Illegal lifecycle transition.
    State,
    /// Lock or version conflict; the whole operation may be retried.
    Concurrency,
    /// Cached balance disagrees with the ledger.
    Drift,
    /// Unknown entry or account.
    NotFound,
    /// Storage failure.
    Fatal,
}

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    // ========== Validation Errors ==========
    /// Entry must have at least one line.
    #[error("Journal entry must have at least one line")]
    NoLines,

    /// Entry is not balanced (debits != credits).
    #[error("Journal entry is not balanced. Debit: {debit}, Credit: {credit}")]
    Unbalanced {
        /// Total debit amount.
        debit: Decimal,
        /// Total credit amount.
        credit: Decimal,
    },

    /// Line amount cannot be negative.
    #[error("Line {line}: amount cannot be negative")]
    NegativeAmount {
        /// 1-based line number.
        line: i32,
    },

    /// Line must carry exactly one strictly positive side.
    #[error("Line {line}: exactly one of debit or credit must be positive")]
    InvalidLineSides {
        /// 1-based line number.
        line: i32,
    },

    /// Amount does not fit the stored precision.
    #[error("Line {line}: amount must be below 10^16 with at most 4 decimal places")]
    AmountOutOfRange {
        /// 1-based line number.
        line: i32,
    },

    /// Entry totals do not fit the stored precision.
    #[error("Journal entry totals must be below 10^16")]
    TotalOutOfRange,

    /// Line must reference an account by id or by code, not both.
    #[error("Line {line}: specify exactly one of account_id or account_code")]
    InvalidAccountReference {
        /// 1-based line number.
        line: i32,
    },

    /// Account is inactive and cannot be used.
    #[error("Account {0} is inactive")]
    AccountInactive(String),

    /// Header accounts only roll up their children.
    #[error("Account {0} is a header account and does not accept postings")]
    HeaderAccountPosting(String),

    /// Source type is required.
    #[error("Source type is required")]
    MissingSourceType,

    /// A reversal needs a reason.
    #[error("Reversal reason is required")]
    MissingReversalReason,

    /// Account code already exists.
    #[error("Account code '{0}' already exists")]
    DuplicateAccountCode(String),

    /// Account hierarchy rule broken on account creation.
    #[error("Invalid parent account: {0}")]
    InvalidParent(String),

    /// Account still carries a balance and cannot be deactivated.
    #[error("Account {code} has a non-zero balance ({balance}) and cannot be deactivated")]
    AccountHasBalance {
        /// Account code.
        code: String,
        /// Current cached balance.
        balance: Decimal,
    },

    // ========== State Errors ==========
    /// Only draft entries can be posted.
    #[error("Cannot post entry {entry_id} in status {status}")]
    CannotPost {
        /// The entry.
        entry_id: Uuid,
        /// Its current status.
        status: &'static str,
    },

    /// Only posted entries can be reversed.
    #[error("Cannot reverse entry {entry_id} in status {status}")]
    CannotReverse {
        /// The entry.
        entry_id: Uuid,
        /// Its current status.
        status: &'static str,
    },

    /// Entry was already reversed.
    #[error("Entry {0} has already been reversed")]
    AlreadyReversed(Uuid),

    /// Only draft entries can be discarded.
    #[error("Can only discard draft entries; entry {entry_id} is {status}")]
    CanOnlyDiscardDraft {
        /// The entry.
        entry_id: Uuid,
        /// Its current status.
        status: &'static str,
    },

    // ========== Concurrency Errors ==========
    /// Lock or serialization conflict.
    #[error("Concurrent modification detected, please retry")]
    ConcurrentModification,

    /// Account version changed underneath an update.
    #[error("Account version mismatch for account {account_id}: expected {expected}, got {actual}")]
    AccountVersionMismatch {
        /// The account ID.
        account_id: Uuid,
        /// The expected version.
        expected: i64,
        /// The actual version found.
        actual: i64,
    },

    // ========== Drift ==========
    /// Cached balance disagrees with the ledger-derived balance.
    #[error("Balance drift on account {account_id}: cached {cached}, derived {derived}")]
    BalanceDrift {
        /// The account ID.
        account_id: Uuid,
        /// Value stored on the account row.
        cached: Decimal,
        /// Value derived from posted lines.
        derived: Decimal,
    },

    // ========== Not Found ==========
    /// Account not found.
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Journal entry not found.
    #[error("Journal entry not found: {0}")]
    EntryNotFound(Uuid),

    // ========== Fatal ==========
    /// Storage failure.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Builds a `CannotPost` error for the given status.
    #[must_use]
    pub fn cannot_post(entry_id: Uuid, status: EntryStatus) -> Self {
        Self::CannotPost {
            entry_id,
            status: status.as_str(),
        }
    }

    /// Returns the category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoLines
            | Self::Unbalanced { .. }
            | Self::NegativeAmount { .. }
            | Self::InvalidLineSides { .. }
            | Self::AmountOutOfRange { .. }
            | Self::TotalOutOfRange
            | Self::InvalidAccountReference { .. }
            | Self::AccountInactive(_)
            | Self::HeaderAccountPosting(_)
            | Self::MissingSourceType
            | Self::MissingReversalReason
            | Self::DuplicateAccountCode(_)
            | Self::InvalidParent(_)
            | Self::AccountHasBalance { .. } => ErrorKind::Validation,

            Self::CannotPost { .. }
            | Self::CannotReverse { .. }
            | Self::AlreadyReversed(_)
            | Self::CanOnlyDiscardDraft { .. } => ErrorKind::State,

            Self::ConcurrentModification | Self::AccountVersionMismatch { .. } => {
                ErrorKind::Concurrency
            }

            Self::BalanceDrift { .. } => ErrorKind::Drift,

            Self::AccountNotFound(_) | Self::EntryNotFound(_) => ErrorKind::NotFound,

            Self::Database(_) | Self::Internal(_) => ErrorKind::Fatal,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NoLines => "NO_LINES",
            Self::Unbalanced { .. } => "UNBALANCED_ENTRY",
            Self::NegativeAmount { .. } => "NEGATIVE_AMOUNT",
            Self::InvalidLineSides { .. } => "INVALID_LINE_SIDES",
            Self::AmountOutOfRange { .. } => "AMOUNT_OUT_OF_RANGE",
            Self::TotalOutOfRange => "TOTAL_OUT_OF_RANGE",
            Self::InvalidAccountReference { .. } => "INVALID_ACCOUNT_REFERENCE",
            Self::AccountInactive(_) => "ACCOUNT_INACTIVE",
            Self::HeaderAccountPosting(_) => "HEADER_ACCOUNT_POSTING",
            Self::MissingSourceType => "MISSING_SOURCE_TYPE",
            Self::MissingReversalReason => "MISSING_REVERSAL_REASON",
            Self::DuplicateAccountCode(_) => "DUPLICATE_ACCOUNT_CODE",
            Self::InvalidParent(_) => "INVALID_PARENT",
            Self::AccountHasBalance { .. } => "ACCOUNT_HAS_BALANCE",
            Self::CannotPost { .. } => "CANNOT_POST",
            Self::CannotReverse { .. } => "CANNOT_REVERSE",
            Self::AlreadyReversed(_) => "ALREADY_REVERSED",
            Self::CanOnlyDiscardDraft { .. } => "CAN_ONLY_DISCARD_DRAFT",
            Self::ConcurrentModification => "CONCURRENT_MODIFICATION",
            Self::AccountVersionMismatch { .. } => "ACCOUNT_VERSION_MISMATCH",
            Self::BalanceDrift { .. } => "BALANCE_DRIFT",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::EntryNotFound(_) => "ENTRY_NOT_FOUND",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::State | ErrorKind::Concurrency => 409,
            ErrorKind::Drift => 422,
            ErrorKind::Fatal => 500,
        }
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Concurrency
    }
}
