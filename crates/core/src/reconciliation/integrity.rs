//! Journal integrity checks: stored totals versus lines, and double posting.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ledger::types::{EntryStatus, REVERSAL_SOURCE_TYPE};

/// Stored header totals of an entry alongside the sums of its lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryTotalsRecord {
    /// The entry.
    pub entry_id: Uuid,
    /// Entry number.
    pub entry_number: String,
    /// Entry status.
    pub status: EntryStatus,
    /// `total_debit` column.
    pub total_debit: Decimal,
    /// `total_credit` column.
    pub total_credit: Decimal,
    /// `is_balanced` column.
    pub is_balanced: bool,
    /// Sum of line debits.
    pub line_debit: Decimal,
    /// Sum of line credits.
    pub line_credit: Decimal,
}

/// What is wrong with an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyProblem {
    /// Stored totals differ from the line sums.
    TotalsMismatch,
    /// Line debits and credits differ.
    Unbalanced,
    /// Entry is flagged unbalanced.
    FlaggedUnbalanced,
}

/// An entry that failed the consistency check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InconsistentEntry {
    /// The entry.
    pub entry_id: Uuid,
    /// Entry number.
    pub entry_number: String,
    /// Stored debit total.
    pub total_debit: Decimal,
    /// Stored credit total.
    pub total_credit: Decimal,
    /// Sum of line debits.
    pub line_debit: Decimal,
    /// Sum of line credits.
    pub line_credit: Decimal,
    /// Every problem found.
    pub problems: Vec<ConsistencyProblem>,
}

/// Source reference and status of an entry, for double-posting detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntryRecord {
    /// The entry.
    pub entry_id: Uuid,
    /// Source type.
    pub source_type: String,
    /// Source reference.
    pub source_id: String,
    /// Entry status.
    pub status: EntryStatus,
}

/// More than one live entry for the same source record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoublePosting {
    /// Source type.
    pub source_type: String,
    /// Source reference.
    pub source_id: String,
    /// The live entries, in input order.
    pub entry_ids: Vec<Uuid>,
}

/// Stateless journal integrity checks.
pub struct IntegrityChecker;

impl IntegrityChecker {
    /// Checks posted and reversed entries against their lines.
    ///
    /// Drafts are skipped; they may legitimately be unbalanced.
    #[must_use]
    pub fn check_journal_consistency(
        records: &[EntryTotalsRecord],
        tolerance: Decimal,
    ) -> Vec<InconsistentEntry> {
        records
            .iter()
            .filter(|r| r.status.affects_balances())
            .filter_map(|r| {
                let mut problems = Vec::new();
                if r.total_debit != r.line_debit || r.total_credit != r.line_credit {
                    problems.push(ConsistencyProblem::TotalsMismatch);
                }
                if (r.line_debit - r.line_credit).abs() > tolerance {
                    problems.push(ConsistencyProblem::Unbalanced);
                }
                if !r.is_balanced {
                    problems.push(ConsistencyProblem::FlaggedUnbalanced);
                }

                (!problems.is_empty()).then(|| InconsistentEntry {
                    entry_id: r.entry_id,
                    entry_number: r.entry_number.clone(),
                    total_debit: r.total_debit,
                    total_credit: r.total_credit,
                    line_debit: r.line_debit,
                    line_credit: r.line_credit,
                    problems,
                })
            })
            .collect()
    }

    /// Finds source records with more than one live posted entry.
    ///
    /// Reversed entries and reversal entries are not live.
    #[must_use]
    pub fn detect_double_posting(records: &[SourceEntryRecord]) -> Vec<DoublePosting> {
        let mut groups: BTreeMap<(&str, &str), Vec<Uuid>> = BTreeMap::new();

        for record in records {
            if record.status != EntryStatus::Posted || record.source_type == REVERSAL_SOURCE_TYPE {
                continue;
            }
            groups
                .entry((record.source_type.as_str(), record.source_id.as_str()))
                .or_default()
                .push(record.entry_id);
        }

        groups
            .into_iter()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|((source_type, source_id), entry_ids)| DoublePosting {
                source_type: source_type.to_string(),
                source_id: source_id.to_string(),
                entry_ids,
            })
            .collect()
    }
}
