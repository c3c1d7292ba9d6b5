//! Ledger health scoring.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Overall ledger health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    /// Score ≥ 99 and no integrity issues.
    Healthy,
    /// Score ≥ 90.
    Warning,
    /// Anything worse.
    Critical,
}

/// Inputs to the health score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HealthInputs {
    /// Accounts checked for drift.
    pub checked: u64,
    /// Drifted accounts.
    pub drifted: u64,
    /// Posted entries failing the consistency check.
    pub inconsistent_entries: u64,
    /// Source records posted more than once.
    pub double_postings: u64,
}

/// Summary of ledger health.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Percentage of accounts in sync, two decimal places.
    pub score: Decimal,
    /// Status derived from the score and integrity issues.
    pub status: HealthStatus,
    /// Accounts checked.
    pub checked: u64,
    /// Accounts in sync.
    pub in_sync: u64,
    /// Drifted accounts.
    pub drifted: u64,
    /// Inconsistent posted entries.
    pub inconsistent_entries: u64,
    /// Double-posted source records.
    pub double_postings: u64,
    /// When the report was built.
    pub generated_at: DateTime<Utc>,
}

impl HealthReport {
    /// Scores the ledger.
    #[must_use]
    pub fn evaluate(inputs: HealthInputs, generated_at: DateTime<Utc>) -> Self {
        let in_sync = inputs.checked.saturating_sub(inputs.drifted);
        let score = if inputs.checked == 0 {
            Decimal::ONE_HUNDRED
        } else {
            (Decimal::ONE_HUNDRED * Decimal::from(in_sync) / Decimal::from(inputs.checked))
                .round_dp(2)
        };

        let integrity_issues = inputs.inconsistent_entries + inputs.double_postings;
        let status = if score >= Decimal::from(99) && integrity_issues == 0 {
            HealthStatus::Healthy
        } else if score >= Decimal::from(90) {
            HealthStatus::Warning
        } else {
            HealthStatus::Critical
        };

        Self {
            score,
            status,
            checked: inputs.checked,
            in_sync,
            drifted: inputs.drifted,
            inconsistent_entries: inputs.inconsistent_entries,
            double_postings: inputs.double_postings,
            generated_at,
        }
    }
}
