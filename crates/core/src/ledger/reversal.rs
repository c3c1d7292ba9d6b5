//! Reversal service for cancelling posted journal entries.
//!
//! A posted entry is never edited. It is cancelled by a new entry whose lines
//! are the exact inverse of the original, and the original is only marked
//! `REVERSED`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::types::{REVERSAL_SOURCE_TYPE, StoredLine, ValidatedLine};

/// Input for creating a reversing entry.
#[derive(Debug, Clone)]
pub struct ReversalInput {
    /// The entry being reversed.
    pub original_entry_id: Uuid,
    /// The original entry number.
    pub original_entry_number: String,
    /// The original description.
    pub original_description: String,
    /// The original lines, in line order.
    pub original_lines: Vec<StoredLine>,
    /// Why the entry is being reversed.
    pub reason: String,
    /// When the reversal happens.
    pub reversed_at: DateTime<Utc>,
}

/// Header and lines of the reversing entry.
#[derive(Debug, Clone)]
pub struct ReversalOutput {
    /// Entry number for the reversing entry.
    pub entry_number: String,
    /// Description for the reversing entry.
    pub description: String,
    /// Source type of the reversing entry.
    pub source_type: &'static str,
    /// Source reference of the reversing entry (the original entry id).
    pub source_id: String,
    /// The inverted lines.
    pub lines: Vec<ValidatedLine>,
}

/// Stateless service for creating reversing entries.
pub struct ReversalService;

impl ReversalService {
    /// Create the reversing entry by swapping debits and credits.
    ///
    /// For each original line:
    /// - Debits become credits, credits become debits
    /// - Account and line number are preserved
    /// - Description is prefixed with "Reversal: "
    #[must_use]
    pub fn create_reversing_entry(input: &ReversalInput) -> ReversalOutput {
        let lines = input
            .original_lines
            .iter()
            .map(|line| ValidatedLine {
                line_number: line.line_number,
                account_id: line.account_id,
                description: Some(format!(
                    "Reversal: {}",
                    line.description.clone().unwrap_or_default()
                )),
                debit: line.credit,
                credit: line.debit,
            })
            .collect();

        ReversalOutput {
            entry_number: Self::reversal_entry_number(
                &input.original_entry_number,
                input.reversed_at,
            ),
            description: format!("REVERSAL: {}", input.original_description),
            source_type: REVERSAL_SOURCE_TYPE,
            source_id: input.original_entry_id.to_string(),
            lines,
        }
    }

    /// Entry number of a reversal: `REV-{original}-{YYYYMMDDHHMMSS}`.
    #[must_use]
    pub fn reversal_entry_number(original_number: &str, at: DateTime<Utc>) -> String {
        format!("REV-{original_number}-{}", at.format("%Y%m%d%H%M%S"))
    }

    /// Validate that original lines balance within `tolerance`.
    ///
    /// Holds for every entry that went through posting; a failure means the
    /// stored lines were changed afterwards.
    #[must_use]
    pub fn validate_reversal(original_lines: &[StoredLine], tolerance: Decimal) -> bool {
        let total_debit: Decimal = original_lines.iter().map(|l| l.debit).sum();
        let total_credit: Decimal = original_lines.iter().map(|l| l.credit).sum();

        (total_debit - total_credit).abs() <= tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn line(n: i32, debit: Decimal, credit: Decimal, description: Option<&str>) -> StoredLine {
        StoredLine {
            line_number: n,
            account_id: Uuid::new_v4(),
            description: description.map(str::to_string),
            debit,
            credit,
        }
    }

    fn make_input(lines: Vec<StoredLine>) -> ReversalInput {
        ReversalInput {
            original_entry_id: Uuid::new_v4(),
            original_entry_number: "JE-2026/03/000042".to_string(),
            original_description: "Sale INV-1".to_string(),
            original_lines: lines,
            reason: "Wrong customer".to_string(),
            reversed_at: Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap(),
        }
    }

    #[test]
    fn test_lines_are_swapped() {
        let input = make_input(vec![
            line(1, dec!(1000000), dec!(0), Some("AR")),
            line(2, dec!(0), dec!(1000000), None),
        ]);

        let output = ReversalService::create_reversing_entry(&input);

        assert_eq!(output.lines.len(), 2);
        assert_eq!(output.lines[0].debit, dec!(0));
        assert_eq!(output.lines[0].credit, dec!(1000000));
        assert_eq!(output.lines[0].account_id, input.original_lines[0].account_id);
        assert_eq!(output.lines[1].debit, dec!(1000000));
        assert_eq!(output.lines[1].credit, dec!(0));
        assert_eq!(output.lines[0].description.as_deref(), Some("Reversal: AR"));
        assert_eq!(output.lines[1].description.as_deref(), Some("Reversal: "));
    }

    #[test]
    fn test_header_fields() {
        let input = make_input(vec![
            line(1, dec!(5), dec!(0), None),
            line(2, dec!(0), dec!(5), None),
        ]);
        let output = ReversalService::create_reversing_entry(&input);

        assert_eq!(output.entry_number, "REV-JE-2026/03/000042-20260314092653");
        assert_eq!(output.description, "REVERSAL: Sale INV-1");
        assert_eq!(output.source_type, "REVERSAL");
        assert_eq!(output.source_id, input.original_entry_id.to_string());
    }

    #[test]
    fn test_line_numbers_preserved() {
        let input = make_input(vec![
            line(1, dec!(50), dec!(0), None),
            line(2, dec!(30), dec!(0), None),
            line(3, dec!(0), dec!(80), None),
        ]);
        let output = ReversalService::create_reversing_entry(&input);
        let numbers: Vec<i32> = output.lines.iter().map(|l| l.line_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn test_validate_reversal() {
        let balanced = vec![line(1, dec!(100), dec!(0), None), line(2, dec!(0), dec!(100), None)];
        assert!(ReversalService::validate_reversal(&balanced, Decimal::ZERO));

        let unbalanced = vec![line(1, dec!(100), dec!(0), None), line(2, dec!(0), dec!(50), None)];
        assert!(!ReversalService::validate_reversal(&unbalanced, dec!(0.01)));

        let rounded = vec![line(1, dec!(100.01), dec!(0), None), line(2, dec!(0), dec!(100), None)];
        assert!(ReversalService::validate_reversal(&rounded, dec!(0.01)));
        assert!(!ReversalService::validate_reversal(&rounded, Decimal::ZERO));
    }
}
