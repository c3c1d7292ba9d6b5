//! Drift detection between cached and ledger-derived balances.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ledgerline_shared::types::ReconciliationRunId;

/// Cached and derived balance of one account, as loaded by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceComparison {
    /// The account ID.
    pub account_id: Uuid,
    /// Account code.
    pub code: String,
    /// Account name.
    pub name: String,
    /// Whether the account is a header.
    pub is_header: bool,
    /// Value stored on the account row.
    pub cached: Decimal,
    /// Value derived from the ledger.
    pub derived: Decimal,
}

/// Drift of a single account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountDrift {
    /// The account ID.
    pub account_id: Uuid,
    /// Account code.
    pub code: String,
    /// Account name.
    pub name: String,
    /// Whether the account is a header.
    pub is_header: bool,
    /// Cached balance.
    pub cached: Decimal,
    /// Derived balance.
    pub derived: Decimal,
    /// `cached - derived`.
    pub drift: Decimal,
    /// Whether |drift| exceeds the tolerance.
    pub is_drifted: bool,
}

/// Result of one balance validation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftReport {
    /// Run key; fixes applied from this report are logged under it.
    pub run_id: ReconciliationRunId,
    /// When the report was built.
    pub generated_at: DateTime<Utc>,
    /// Every checked account.
    pub accounts: Vec<AccountDrift>,
    /// Number of accounts checked.
    pub checked: u64,
    /// Number of drifted accounts.
    pub drifted: u64,
    /// Sum of |drift| over drifted accounts.
    pub total_absolute_drift: Decimal,
}

impl DriftReport {
    /// Iterates over the drifted accounts only.
    pub fn drifted_accounts(&self) -> impl Iterator<Item = &AccountDrift> {
        self.accounts.iter().filter(|a| a.is_drifted)
    }

    /// Returns true if no account drifted.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.drifted == 0
    }

    /// Number of accounts within tolerance.
    #[must_use]
    pub fn in_sync(&self) -> u64 {
        self.checked - self.drifted
    }
}

/// Stateless drift computation.
pub struct DriftDetector;

impl DriftDetector {
    /// Compares one account.
    #[must_use]
    pub fn compare(comparison: BalanceComparison, tolerance: Decimal) -> AccountDrift {
        let drift = comparison.cached - comparison.derived;
        AccountDrift {
            account_id: comparison.account_id,
            code: comparison.code,
            name: comparison.name,
            is_header: comparison.is_header,
            cached: comparison.cached,
            derived: comparison.derived,
            drift,
            is_drifted: drift.abs() > tolerance,
        }
    }

    /// Builds a report from every comparison, preserving input order.
    #[must_use]
    pub fn build_report(
        run_id: ReconciliationRunId,
        generated_at: DateTime<Utc>,
        comparisons: Vec<BalanceComparison>,
        tolerance: Decimal,
    ) -> DriftReport {
        let accounts: Vec<AccountDrift> = comparisons
            .into_iter()
            .map(|c| Self::compare(c, tolerance))
            .collect();

        let drifted = accounts.iter().filter(|a| a.is_drifted).count() as u64;
        let total_absolute_drift = accounts
            .iter()
            .filter(|a| a.is_drifted)
            .map(|a| a.drift.abs())
            .sum();

        DriftReport {
            run_id,
            generated_at,
            checked: accounts.len() as u64,
            drifted,
            total_absolute_drift,
            accounts,
        }
    }
}
