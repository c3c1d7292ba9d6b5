//! Ledger domain types for journal entry creation and validation.
//!
//! This module defines the core types used for creating, posting and
//! reversing journal entries in the double-entry bookkeeping system.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Chart-of-accounts classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// Resources owned.
    Asset,
    /// Obligations owed.
    Liability,
    /// Owner's residual interest.
    Equity,
    /// Income earned.
    Revenue,
    /// Costs incurred.
    Expense,
}

impl AccountType {
    /// All account types, in chart order.
    pub const ALL: [Self; 5] = [
        Self::Asset,
        Self::Liability,
        Self::Equity,
        Self::Revenue,
        Self::Expense,
    ];

    /// Returns the side on which increases to this account type are recorded.
    ///
    /// - Asset/Expense: debit-normal
    /// - Liability/Equity/Revenue: credit-normal
    #[must_use]
    pub const fn normal_balance(self) -> NormalBalance {
        match self {
            Self::Asset | Self::Expense => NormalBalance::Debit,
            Self::Liability | Self::Equity | Self::Revenue => NormalBalance::Credit,
        }
    }

    /// Lowercase name used in storage and on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asset => "asset",
            Self::Liability => "liability",
            Self::Equity => "equity",
            Self::Revenue => "revenue",
            Self::Expense => "expense",
        }
    }
}

/// Normal balance side of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalBalance {
    /// Increases are debits.
    Debit,
    /// Increases are credits.
    Credit,
}

impl NormalBalance {
    /// Signed balance change for one line, in the account's own sign.
    ///
    /// `Debit → debit − credit`, `Credit → credit − debit`.
    #[must_use]
    pub fn balance_change(self, debit: Decimal, credit: Decimal) -> Decimal {
        match self {
            Self::Debit => debit - credit,
            Self::Credit => credit - debit,
        }
    }
}

/// Journal entry lifecycle status.
///
/// `Draft → Posted → Reversed`. No other transitions are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryStatus {
    /// Entry has been stored but has no balance effect yet.
    Draft,
    /// Entry affects balances; lines are frozen.
    Posted,
    /// Entry was posted and later cancelled by a reversal entry.
    Reversed,
}

impl EntryStatus {
    /// Uppercase name used in storage and on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Posted => "POSTED",
            Self::Reversed => "REVERSED",
        }
    }

    /// Returns true if the entry's lines count toward balances.
    ///
    /// A reversed entry still counts: its effect is cancelled by the
    /// reversal entry, not by exclusion.
    #[must_use]
    pub const fn affects_balances(self) -> bool {
        matches!(self, Self::Posted | Self::Reversed)
    }

    /// Returns true if the entry's lines may no longer change.
    #[must_use]
    pub const fn is_immutable(self) -> bool {
        !matches!(self, Self::Draft)
    }
}

/// Source type stamped on reversal entries.
pub const REVERSAL_SOURCE_TYPE: &str = "REVERSAL";

/// Account metadata needed to validate and post lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    /// The account ID.
    pub id: Uuid,
    /// Unique account code.
    pub code: String,
    /// Account classification.
    pub account_type: AccountType,
    /// Parent (header) account, if any.
    pub parent_id: Option<Uuid>,
    /// Whether the account is a non-postable rollup account.
    pub is_header: bool,
    /// Whether the account is active.
    pub is_active: bool,
}

/// Reference to an account from a journal request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountRef {
    /// Reference by primary key.
    Id(Uuid),
    /// Reference by chart-of-accounts code.
    Code(String),
}

impl AccountRef {
    /// Builds a reference from the request's optional id and code fields.
    ///
    /// Exactly one must be provided.
    #[must_use]
    pub fn from_parts(account_id: Option<Uuid>, account_code: Option<&str>) -> Option<Self> {
        let code = account_code.map(str::trim).filter(|c| !c.is_empty());
        match (account_id, code) {
            (Some(id), None) => Some(Self::Id(id)),
            (None, Some(code)) => Some(Self::Code(code.to_string())),
            _ => None,
        }
    }
}

impl std::fmt::Display for AccountRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Code(code) => write!(f, "code {code}"),
        }
    }
}

/// One requested line of a journal entry.
#[derive(Debug, Clone)]
pub struct JournalLineInput {
    /// Target account.
    pub account: AccountRef,
    /// Optional line description.
    pub description: Option<String>,
    /// Debit amount; zero when the line is a credit.
    pub debit: Decimal,
    /// Credit amount; zero when the line is a debit.
    pub credit: Decimal,
}

impl JournalLineInput {
    /// Builds a debit line.
    #[must_use]
    pub fn debit(account: AccountRef, amount: Decimal) -> Self {
        Self {
            account,
            description: None,
            debit: amount,
            credit: Decimal::ZERO,
        }
    }

    /// Builds a credit line.
    #[must_use]
    pub fn credit(account: AccountRef, amount: Decimal) -> Self {
        Self {
            account,
            description: None,
            debit: Decimal::ZERO,
            credit: amount,
        }
    }

    /// Sets the line description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Request to create a draft journal entry.
#[derive(Debug, Clone)]
pub struct CreateJournalInput {
    /// Originating business process, e.g. `SALE`, `PURCHASE`, `PAYMENT`.
    pub source_type: String,
    /// The collaborator's record reference.
    pub source_id: String,
    /// Accounting date of the entry.
    pub entry_date: NaiveDate,
    /// Entry description.
    pub description: String,
    /// Requested lines (at least one).
    pub lines: Vec<JournalLineInput>,
    /// Whether a collaborator generated the entry automatically.
    pub is_auto_generated: bool,
    /// Who created the entry.
    pub created_by: Uuid,
}

/// A line that passed validation, resolved to a concrete account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedLine {
    /// 1-based position within the entry.
    pub line_number: i32,
    /// Resolved account ID.
    pub account_id: Uuid,
    /// Line description.
    pub description: Option<String>,
    /// Debit amount.
    pub debit: Decimal,
    /// Credit amount.
    pub credit: Decimal,
}

/// A stored line as read back for posting, reversal and derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredLine {
    /// 1-based position within the entry.
    pub line_number: i32,
    /// Account ID.
    pub account_id: Uuid,
    /// Line description.
    pub description: Option<String>,
    /// Debit amount.
    pub debit: Decimal,
    /// Credit amount.
    pub credit: Decimal,
}

/// Debit/credit totals of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryTotals {
    /// Sum of debit amounts.
    pub total_debit: Decimal,
    /// Sum of credit amounts.
    pub total_credit: Decimal,
    /// Whether the totals agree within the tolerance.
    pub is_balanced: bool,
}

impl EntryTotals {
    /// Creates totals, treating differences up to `tolerance` as balanced.
    #[must_use]
    pub fn new(total_debit: Decimal, total_credit: Decimal, tolerance: Decimal) -> Self {
        Self {
            total_debit,
            total_credit,
            is_balanced: (total_debit - total_credit).abs() <= tolerance,
        }
    }

    /// Returns the difference between debits and credits.
    #[must_use]
    pub fn difference(&self) -> Decimal {
        self.total_debit - self.total_credit
    }
}
