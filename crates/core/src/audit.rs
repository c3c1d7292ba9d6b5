//! Audit records for balance-affecting operations.
//!
//! Records are append-only. The unique key `(entity_type, entity_id, action,
//! run_id)` makes re-inserting the same record within one run a no-op.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::ledger::types::EntryStatus;

/// What happened to the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SyncAction {
    /// Entity created.
    Insert,
    /// Entity changed by a journal operation.
    Update,
    /// Entity removed (draft discarded).
    Delete,
    /// Balance overwritten by synchronization.
    Reconcile,
}

impl SyncAction {
    /// Uppercase name used in storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Reconcile => "RECONCILE",
        }
    }
}

/// Kind of entity a record is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncEntityType {
    /// An account's cached balance.
    Account,
    /// A journal entry's lifecycle.
    JournalEntry,
}

impl SyncEntityType {
    /// Name used in storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Account => "ACCOUNT",
            Self::JournalEntry => "JOURNAL_ENTRY",
        }
    }
}

/// Cached balance of an account at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    /// Cached balance.
    pub balance: Decimal,
    /// Row version.
    pub version: i64,
}

impl BalanceSnapshot {
    /// JSON form stored in the log.
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({ "balance": self.balance, "version": self.version })
    }
}

/// State of a journal entry at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySnapshot {
    /// Entry number.
    pub entry_number: String,
    /// Status.
    pub status: EntryStatus,
    /// Total debit.
    pub total_debit: Decimal,
    /// Total credit.
    pub total_credit: Decimal,
}

impl EntrySnapshot {
    /// JSON form stored in the log.
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "entry_number": self.entry_number,
            "status": self.status,
            "total_debit": self.total_debit,
            "total_credit": self.total_credit,
        })
    }
}

/// A record ready to be appended to the sync log.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncLogRecord {
    /// Kind of entity.
    pub entity_type: SyncEntityType,
    /// The entity.
    pub entity_id: Uuid,
    /// What happened.
    pub action: SyncAction,
    /// Idempotency key: the entry id for journal operations, the run id for
    /// reconciliation.
    pub run_id: Uuid,
    /// State before, if any.
    pub before: Option<Value>,
    /// State after, if any.
    pub after: Option<Value>,
}

impl SyncLogRecord {
    /// Records a cached balance change on an account.
    #[must_use]
    pub fn balance_change(
        account_id: Uuid,
        action: SyncAction,
        run_id: Uuid,
        before: BalanceSnapshot,
        after: BalanceSnapshot,
    ) -> Self {
        Self {
            entity_type: SyncEntityType::Account,
            entity_id: account_id,
            action,
            run_id,
            before: Some(before.to_json()),
            after: Some(after.to_json()),
        }
    }

    /// Records a journal entry lifecycle transition.
    #[must_use]
    pub fn entry_transition(
        entry_id: Uuid,
        action: SyncAction,
        run_id: Uuid,
        before: Option<&EntrySnapshot>,
        after: Option<&EntrySnapshot>,
    ) -> Self {
        Self {
            entity_type: SyncEntityType::JournalEntry,
            entity_id: entry_id,
            action,
            run_id,
            before: before.map(EntrySnapshot::to_json),
            after: after.map(EntrySnapshot::to_json),
        }
    }
}
