//! Reconciliation: compares the cache with the ledger and checks integrity.

use std::collections::HashSet;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    AccessMode, ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult, IsolationLevel,
    JoinType, QueryFilter, QueryOrder, QuerySelect, RelationTrait, TransactionTrait,
};
use serde::Serialize;
use uuid::Uuid;

use ledgerline_core::ledger::LedgerError;
use ledgerline_core::reconciliation::{
    BalanceComparison, DoublePosting, DriftDetector, DriftReport, EntryTotalsRecord,
    EquationCheck, HealthInputs, HealthReport, HierarchyIssue, HierarchyNode, HierarchyValidator,
    InconsistentEntry, IntegrityChecker, SourceEntryRecord,
};
use ledgerline_shared::LedgerConfig;
use ledgerline_shared::types::{AccountId, ReconciliationRunId};

use crate::entities::sea_orm_active_enums::JournalStatus;
use crate::entities::{accounts, journal_entries, journal_lines};

use super::error::StoreError;
use super::sync::SyncRepository;

/// Every integrity check in one report.
#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    /// Posted entries whose totals disagree with their lines.
    pub inconsistent_entries: Vec<InconsistentEntry>,
    /// Source records with more than one live entry.
    pub double_postings: Vec<DoublePosting>,
    /// Chart-of-accounts problems.
    pub hierarchy_issues: Vec<HierarchyIssue>,
    /// Accounting equation over cached balances.
    pub equation: EquationCheck,
}

impl IntegrityReport {
    /// Returns true if no check found anything.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.inconsistent_entries.is_empty()
            && self.double_postings.is_empty()
            && self.hierarchy_issues.is_empty()
            && self.equation.is_balanced
    }
}

#[derive(Debug, FromQueryResult)]
struct EntryTotalsRow {
    id: Uuid,
    entry_number: String,
    status: JournalStatus,
    total_debit: Decimal,
    total_credit: Decimal,
    is_balanced: bool,
    line_debit: Option<Decimal>,
    line_credit: Option<Decimal>,
}

/// Reconciliation repository.
#[derive(Debug, Clone)]
pub struct ReconciliationRepository {
    db: DatabaseConnection,
    ledger: LedgerConfig,
}

impl ReconciliationRepository {
    /// Creates a new reconciliation repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection, ledger: LedgerConfig) -> Self {
        Self { db, ledger }
    }

    /// Compares the cached balance of every active account with its
    /// ledger-derived value. Deactivated accounts are left out.
    ///
    /// Cached and derived values are read from one repeatable-read snapshot,
    /// so postings committed during the run cannot show up as drift.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn validate_balances(&self) -> Result<DriftReport, StoreError> {
        let txn = self
            .db
            .begin_with_config(
                Some(IsolationLevel::RepeatableRead),
                Some(AccessMode::ReadOnly),
            )
            .await?;
        let derived = SyncRepository::derive_all_in(&txn, None).await?;
        txn.commit().await?;

        let comparisons = derived
            .into_iter()
            .filter(|(account, _)| account.is_active)
            .map(|(account, derived)| BalanceComparison {
                account_id: account.id,
                code: account.code,
                name: account.name,
                is_header: account.is_header,
                cached: account.balance,
                derived,
            })
            .collect();

        let report = DriftDetector::build_report(
            ReconciliationRunId::new(),
            Utc::now(),
            comparisons,
            self.ledger.balance_tolerance,
        );

        for drift in report.drifted_accounts() {
            let err = LedgerError::BalanceDrift {
                account_id: drift.account_id,
                cached: drift.cached,
                derived: drift.derived,
            };
            tracing::warn!(
                run_id = %report.run_id,
                code = %drift.code,
                drift = %drift.drift,
                "{err}"
            );
        }

        tracing::info!(
            run_id = %report.run_id,
            checked = report.checked,
            drifted = report.drifted,
            total_absolute_drift = %report.total_absolute_drift,
            "Balance validation finished"
        );

        Ok(report)
    }

    /// Re-synchronizes the drifted accounts of a report.
    ///
    /// Each fix is logged as a `RECONCILE` record under the report's run id,
    /// so applying the same report twice writes nothing new.
    ///
    /// # Errors
    ///
    /// Returns the first synchronization error.
    pub async fn auto_fix_drift(&self, report: &DriftReport) -> Result<usize, StoreError> {
        let sync = SyncRepository::new(self.db.clone());
        let mut fixed = 0;

        for drift in report.drifted_accounts() {
            let outcome = sync
                .sync_account(AccountId::from_uuid(drift.account_id), report.run_id)
                .await?;
            if outcome.changed {
                fixed += 1;
            }
        }

        tracing::info!(run_id = %report.run_id, fixed, "Drift auto-fix finished");
        Ok(fixed)
    }

    /// Checks posted and reversed entries against their lines.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn check_journal_consistency(&self) -> Result<Vec<InconsistentEntry>, StoreError> {
        let rows: Vec<EntryTotalsRow> = journal_entries::Entity::find()
            .select_only()
            .column(journal_entries::Column::Id)
            .column(journal_entries::Column::EntryNumber)
            .column(journal_entries::Column::Status)
            .column(journal_entries::Column::TotalDebit)
            .column(journal_entries::Column::TotalCredit)
            .column(journal_entries::Column::IsBalanced)
            .column_as(journal_lines::Column::DebitAmount.sum(), "line_debit")
            .column_as(journal_lines::Column::CreditAmount.sum(), "line_credit")
            .join(
                JoinType::LeftJoin,
                journal_entries::Relation::JournalLines.def(),
            )
            .filter(
                journal_entries::Column::Status
                    .is_in([JournalStatus::Posted, JournalStatus::Reversed]),
            )
            .group_by(journal_entries::Column::Id)
            .order_by_asc(journal_entries::Column::EntryNumber)
            .into_model::<EntryTotalsRow>()
            .all(&self.db)
            .await?;

        let records: Vec<EntryTotalsRecord> = rows
            .into_iter()
            .map(|row| EntryTotalsRecord {
                entry_id: row.id,
                entry_number: row.entry_number,
                status: row.status.into(),
                total_debit: row.total_debit,
                total_credit: row.total_credit,
                is_balanced: row.is_balanced,
                line_debit: row.line_debit.unwrap_or_default(),
                line_credit: row.line_credit.unwrap_or_default(),
            })
            .collect();

        let inconsistent =
            IntegrityChecker::check_journal_consistency(&records, self.ledger.balance_tolerance);
        if !inconsistent.is_empty() {
            tracing::warn!(count = inconsistent.len(), "Inconsistent journal entries found");
        }
        Ok(inconsistent)
    }

    /// Finds source records with more than one live posted entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn detect_double_posting(&self) -> Result<Vec<DoublePosting>, StoreError> {
        let rows: Vec<(Uuid, String, String, JournalStatus)> = journal_entries::Entity::find()
            .select_only()
            .column(journal_entries::Column::Id)
            .column(journal_entries::Column::SourceType)
            .column(journal_entries::Column::SourceId)
            .column(journal_entries::Column::Status)
            .filter(journal_entries::Column::Status.eq(JournalStatus::Posted))
            .order_by_asc(journal_entries::Column::CreatedAt)
            .order_by_asc(journal_entries::Column::Id)
            .into_tuple()
            .all(&self.db)
            .await?;

        let records: Vec<SourceEntryRecord> = rows
            .into_iter()
            .map(|(entry_id, source_type, source_id, status)| SourceEntryRecord {
                entry_id,
                source_type,
                source_id,
                status: status.into(),
            })
            .collect();

        let doubles = IntegrityChecker::detect_double_posting(&records);
        for double in &doubles {
            tracing::warn!(
                source_type = %double.source_type,
                source_id = %double.source_id,
                entries = double.entry_ids.len(),
                "Source record posted more than once"
            );
        }
        Ok(doubles)
    }

    /// Validates the chart-of-accounts hierarchy.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn validate_hierarchy(&self) -> Result<Vec<HierarchyIssue>, StoreError> {
        let with_lines: HashSet<Uuid> = journal_lines::Entity::find()
            .select_only()
            .column(journal_lines::Column::AccountId)
            .distinct()
            .into_tuple::<Uuid>()
            .all(&self.db)
            .await?
            .into_iter()
            .collect();

        let nodes: Vec<HierarchyNode> = accounts::Entity::find()
            .order_by_asc(accounts::Column::Code)
            .all(&self.db)
            .await?
            .into_iter()
            .map(|a| HierarchyNode {
                has_lines: with_lines.contains(&a.id),
                id: a.id,
                code: a.code,
                account_type: a.account_type.into(),
                parent_id: a.parent_id,
                is_header: a.is_header,
                is_active: a.is_active,
                balance: a.balance,
            })
            .collect();

        let issues = HierarchyValidator::validate(
            &nodes,
            self.ledger.max_hierarchy_depth,
            self.ledger.balance_tolerance,
        );
        if !issues.is_empty() {
            tracing::warn!(count = issues.len(), "Account hierarchy issues found");
        }
        Ok(issues)
    }

    /// Checks `Assets = Liabilities + Equity + (Revenue - Expense)` over
    /// cached balances of postable accounts.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn check_accounting_equation(&self) -> Result<EquationCheck, StoreError> {
        let balances: Vec<accounts::Model> = accounts::Entity::find()
            .filter(accounts::Column::IsHeader.eq(false))
            .all(&self.db)
            .await?;

        let check = EquationCheck::from_balances(
            balances
                .into_iter()
                .map(|a| (a.account_type.into(), a.balance)),
            self.ledger.balance_tolerance,
        );
        if !check.is_balanced {
            tracing::warn!(difference = %check.difference, "Accounting equation does not hold");
        }
        Ok(check)
    }

    /// Scores the ledger from drift and integrity checks.
    ///
    /// # Errors
    ///
    /// Returns an error if any check fails to run.
    pub async fn health_report(&self) -> Result<HealthReport, StoreError> {
        let drift = self.validate_balances().await?;
        let inconsistent = self.check_journal_consistency().await?;
        let doubles = self.detect_double_posting().await?;

        Ok(HealthReport::evaluate(
            HealthInputs {
                checked: drift.checked,
                drifted: drift.drifted,
                inconsistent_entries: inconsistent.len() as u64,
                double_postings: doubles.len() as u64,
            },
            Utc::now(),
        ))
    }

    /// Runs every integrity check.
    ///
    /// # Errors
    ///
    /// Returns an error if any check fails to run.
    pub async fn integrity_report(&self) -> Result<IntegrityReport, StoreError> {
        Ok(IntegrityReport {
            inconsistent_entries: self.check_journal_consistency().await?,
            double_postings: self.detect_double_posting().await?,
            hierarchy_issues: self.validate_hierarchy().await?,
            equation: self.check_accounting_equation().await?,
        })
    }
}
