//! Synchronization between the ledger and the cached account balances.
//!
//! The ledger (posted and reversed journal lines) is the only source of
//! truth. This repository derives balances from it and writes them to the
//! cache, either incrementally inside a posting transaction or as a full
//! overwrite during reconciliation.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction, EntityTrait, JoinType,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, TransactionTrait,
};
use serde::Serialize;
use uuid::Uuid;

use ledgerline_core::audit::{BalanceSnapshot, SyncAction, SyncLogRecord};
use ledgerline_core::ledger::{AccountType, BalanceDerivation, LedgerError};
use ledgerline_core::reconciliation::{HierarchyNode, HierarchyValidator};
use ledgerline_shared::types::{AccountId, ReconciliationRunId};

use crate::entities::sea_orm_active_enums::JournalStatus;
use crate::entities::{accounts, journal_entries, journal_lines};

use super::account::AccountRepository;
use super::audit::AuditRepository;
use super::error::StoreError;

/// Result of synchronizing one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    /// The account.
    pub account_id: Uuid,
    /// Cached balance before the sync.
    pub before: Decimal,
    /// Cached balance after the sync.
    pub after: Decimal,
    /// Whether the cache was rewritten.
    pub changed: bool,
}

/// Result of synchronizing every account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    /// Run key stamped on the audit records.
    pub run_id: ReconciliationRunId,
    /// Accounts visited.
    pub checked: u64,
    /// Accounts whose cache was rewritten.
    pub updated: u64,
}

/// Debit and credit sums of one account's counted lines.
type LineTotals = HashMap<Uuid, (Decimal, Decimal)>;

/// Synchronization repository.
#[derive(Debug, Clone)]
pub struct SyncRepository {
    db: DatabaseConnection,
}

impl SyncRepository {
    /// Creates a new synchronization repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Applies posting deltas to the cache inside the caller's transaction.
    ///
    /// `deltas` must already include every ancestor header. Accounts are
    /// locked in ascending id order before any of them is written, and one
    /// `UPDATE` audit record is appended per account under `run_id`.
    pub(crate) async fn apply_incremental_deltas(
        txn: &DatabaseTransaction,
        deltas: &BTreeMap<Uuid, Decimal>,
        run_id: Uuid,
    ) -> Result<(), StoreError> {
        let ids: Vec<Uuid> = deltas.keys().copied().collect();
        let locked = AccountRepository::lock_accounts(txn, &ids).await?;

        for (account_id, delta) in deltas {
            let account = locked
                .get(account_id)
                .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()))?;

            let before = BalanceSnapshot {
                balance: account.balance,
                version: account.version,
            };
            let after = AccountRepository::apply_balance_delta(txn, account, *delta).await?;

            tracing::debug!(
                account_id = %account_id,
                delta = %delta,
                balance = %after.balance,
                version = after.version,
                "Applied balance delta"
            );

            AuditRepository::append(
                txn,
                &SyncLogRecord::balance_change(
                    *account_id,
                    SyncAction::Update,
                    run_id,
                    before,
                    after,
                ),
            )
            .await?;
        }

        Ok(())
    }

    /// Grouped debit and credit sums of counted lines.
    ///
    /// Counts lines of `POSTED` and `REVERSED` entries, optionally limited to
    /// `ids` and to entries dated on or before `as_of`.
    pub(crate) async fn ledger_totals<C: ConnectionTrait>(
        conn: &C,
        ids: Option<&[Uuid]>,
        as_of: Option<NaiveDate>,
    ) -> Result<LineTotals, StoreError> {
        let mut query = journal_lines::Entity::find()
            .select_only()
            .column(journal_lines::Column::AccountId)
            .column_as(journal_lines::Column::DebitAmount.sum(), "debit_total")
            .column_as(journal_lines::Column::CreditAmount.sum(), "credit_total")
            .join(
                JoinType::InnerJoin,
                journal_lines::Relation::JournalEntries.def(),
            )
            .filter(
                journal_entries::Column::Status
                    .is_in([JournalStatus::Posted, JournalStatus::Reversed]),
            );

        if let Some(ids) = ids {
            query = query.filter(journal_lines::Column::AccountId.is_in(ids.iter().copied()));
        }
        if let Some(cutoff) = as_of {
            query = query.filter(journal_entries::Column::EntryDate.lte(cutoff));
        }

        let rows: Vec<(Uuid, Option<Decimal>, Option<Decimal>)> = query
            .group_by(journal_lines::Column::AccountId)
            .into_tuple()
            .all(conn)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(id, debit, credit)| {
                (id, (debit.unwrap_or_default(), credit.unwrap_or_default()))
            })
            .collect())
    }

    /// Derives every account's balance, ordered by code.
    ///
    /// Postable accounts are derived from their own lines. Headers are the sum
    /// of the derived balances of their active postable descendants.
    pub(crate) async fn derive_all_in<C: ConnectionTrait>(
        conn: &C,
        as_of: Option<NaiveDate>,
    ) -> Result<Vec<(accounts::Model, Decimal)>, StoreError> {
        let all = accounts::Entity::find()
            .order_by_asc(accounts::Column::Code)
            .all(conn)
            .await?;
        let totals = Self::ledger_totals(conn, None, as_of).await?;

        let nodes: Vec<HierarchyNode> = all
            .iter()
            .map(|a| HierarchyNode {
                id: a.id,
                code: a.code.clone(),
                account_type: a.account_type.into(),
                parent_id: a.parent_id,
                is_header: a.is_header,
                is_active: a.is_active,
                balance: leaf_balance(a.account_type.into(), totals.get(&a.id)),
                has_lines: totals.contains_key(&a.id),
            })
            .collect();

        Ok(all
            .into_iter()
            .zip(nodes.iter())
            .map(|(account, node)| {
                let derived = if account.is_header {
                    HierarchyValidator::descendant_leaf_sum(account.id, &nodes)
                } else {
                    node.balance
                };
                (account, derived)
            })
            .collect())
    }

    /// Derives one account's balance on the given connection.
    async fn derive_in<C: ConnectionTrait>(
        conn: &C,
        account: &accounts::Model,
        as_of: Option<NaiveDate>,
    ) -> Result<Decimal, StoreError> {
        if account.is_header {
            let derived = Self::derive_all_in(conn, as_of).await?;
            return Ok(derived
                .into_iter()
                .find(|(a, _)| a.id == account.id)
                .map(|(_, balance)| balance)
                .unwrap_or_default());
        }

        let totals = Self::ledger_totals(conn, Some(&[account.id]), as_of).await?;
        Ok(leaf_balance(account.account_type.into(), totals.get(&account.id)))
    }

    /// Derives an account's balance from the ledger without touching the cache.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` if the account does not exist.
    pub async fn derive_account_balance(
        &self,
        id: AccountId,
        as_of: Option<NaiveDate>,
    ) -> Result<Decimal, StoreError> {
        let account = accounts::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(id.to_string()))?;

        Self::derive_in(&self.db, &account, as_of).await
    }

    /// Derives every account's balance, ordered by code.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn derive_all(
        &self,
        as_of: Option<NaiveDate>,
    ) -> Result<Vec<(accounts::Model, Decimal)>, StoreError> {
        Self::derive_all_in(&self.db, as_of).await
    }

    /// Overwrites one account's cached balance with its derived balance.
    ///
    /// Runs in its own transaction and holds the account row lock while
    /// deriving, so a concurrent posting either finishes first and is counted
    /// or waits until the overwrite commits. When the cache already matches,
    /// nothing is written.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` if the account does not exist.
    pub async fn sync_account(
        &self,
        id: AccountId,
        run_id: ReconciliationRunId,
    ) -> Result<SyncOutcome, StoreError> {
        let txn = self.db.begin().await?;

        let mut locked = AccountRepository::lock_accounts(&txn, &[id.into_inner()]).await?;
        let account = locked
            .remove(&id.into_inner())
            .ok_or_else(|| LedgerError::AccountNotFound(id.to_string()))?;

        let derived = Self::derive_in(&txn, &account, None).await?;

        if derived == account.balance {
            txn.commit().await?;
            return Ok(SyncOutcome {
                account_id: account.id,
                before: account.balance,
                after: account.balance,
                changed: false,
            });
        }

        let before = BalanceSnapshot {
            balance: account.balance,
            version: account.version,
        };
        let after = AccountRepository::overwrite_balance(&txn, &account, derived).await?;

        AuditRepository::append(
            &txn,
            &SyncLogRecord::balance_change(
                account.id,
                SyncAction::Reconcile,
                run_id.into_inner(),
                before,
                after,
            ),
        )
        .await?;

        txn.commit().await?;

        tracing::info!(
            account_id = %account.id,
            code = %account.code,
            before = %before.balance,
            after = %after.balance,
            run_id = %run_id,
            "Account balance synchronized"
        );

        Ok(SyncOutcome {
            account_id: account.id,
            before: before.balance,
            after: after.balance,
            changed: true,
        })
    }

    /// Synchronizes every account, one transaction per account.
    ///
    /// Postable accounts go first, then headers from the deepest level up.
    /// Stopping part-way leaves every visited account consistent, and running
    /// again with nothing new posted changes nothing.
    ///
    /// # Errors
    ///
    /// Returns the first error; accounts synchronized before it stay committed.
    pub async fn sync_all(&self, run_id: ReconciliationRunId) -> Result<SyncSummary, StoreError> {
        let mut order: Vec<(Uuid, bool, i32, String)> = accounts::Entity::find()
            .select_only()
            .column(accounts::Column::Id)
            .column(accounts::Column::IsHeader)
            .column(accounts::Column::Level)
            .column(accounts::Column::Code)
            .into_tuple()
            .all(&self.db)
            .await?;

        order.sort_by(|a, b| {
            a.1.cmp(&b.1)
                .then_with(|| b.2.cmp(&a.2))
                .then_with(|| a.3.cmp(&b.3))
        });

        let mut summary = SyncSummary {
            run_id,
            checked: 0,
            updated: 0,
        };

        for (id, _, _, _) in order {
            let outcome = self.sync_account(AccountId::from_uuid(id), run_id).await?;
            summary.checked += 1;
            if outcome.changed {
                summary.updated += 1;
            }
        }

        tracing::info!(
            run_id = %run_id,
            checked = summary.checked,
            updated = summary.updated,
            "Full balance synchronization finished"
        );

        Ok(summary)
    }
}

/// Balance of a postable account from its grouped line sums.
fn leaf_balance(account_type: AccountType, totals: Option<&(Decimal, Decimal)>) -> Decimal {
    let (debit, credit) = totals.copied().unwrap_or_default();
    BalanceDerivation::from_totals(debit, credit, account_type.normal_balance()).balance
}
