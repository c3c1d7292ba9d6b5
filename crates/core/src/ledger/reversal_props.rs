//! Property-based tests for `ReversalService`.
//!
//! - Property 4: Reversal Creates an Exact Inverse
//! - Property 5: Reversal Nets to Zero

use std::collections::HashMap;

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::balance::posting_deltas;
use super::reversal::{ReversalInput, ReversalService};
use super::types::{AccountInfo, AccountType, StoredLine};

/// Strategy to generate random UUIDs.
fn arb_uuid() -> impl Strategy<Value = Uuid> {
    any::<[u8; 16]>().prop_map(Uuid::from_bytes)
}

/// Strategy to generate positive amounts (0.01 to 10,000.00).
fn arb_amount() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

fn arb_account_type() -> impl Strategy<Value = AccountType> {
    prop::sample::select(AccountType::ALL.to_vec())
}

/// Strategy to generate a balanced entry: N debit lines and one closing credit.
fn arb_balanced_lines() -> impl Strategy<Value = Vec<StoredLine>> {
    (
        prop::collection::vec((arb_uuid(), arb_amount()), 1..5),
        arb_uuid(),
    )
        .prop_map(|(debits, credit_account)| {
            let total: Decimal = debits.iter().map(|(_, amount)| *amount).sum();
            let mut lines: Vec<StoredLine> = debits
                .into_iter()
                .zip(1..)
                .map(|((account_id, amount), n)| StoredLine {
                    line_number: n,
                    account_id,
                    description: Some(format!("line {n}")),
                    debit: amount,
                    credit: Decimal::ZERO,
                })
                .collect();
            let next = i32::try_from(lines.len()).unwrap_or(i32::MAX) + 1;
            lines.push(StoredLine {
                line_number: next,
                account_id: credit_account,
                description: None,
                debit: Decimal::ZERO,
                credit: total,
            });
            lines
        })
}

fn make_input(lines: Vec<StoredLine>) -> ReversalInput {
    ReversalInput {
        original_entry_id: Uuid::new_v4(),
        original_entry_number: "JE-2026/01/000001".to_string(),
        original_description: "Test entry".to_string(),
        original_lines: lines,
        reason: "Test reversal".to_string(),
        reversed_at: Utc.with_ymd_and_hms(2026, 1, 20, 12, 0, 0).unwrap(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // =========================================================================
    // Property 4: Reversal Creates an Exact Inverse
    // =========================================================================

    /// Every reversing line swaps the original's debit and credit on the same account.
    #[test]
    fn prop_reversing_lines_swap_sides(lines in arb_balanced_lines()) {
        let output = ReversalService::create_reversing_entry(&make_input(lines.clone()));

        prop_assert_eq!(output.lines.len(), lines.len());
        for (original, reversed) in lines.iter().zip(output.lines.iter()) {
            prop_assert_eq!(original.account_id, reversed.account_id);
            prop_assert_eq!(original.line_number, reversed.line_number);
            prop_assert_eq!(original.debit, reversed.credit);
            prop_assert_eq!(original.credit, reversed.debit);
        }
    }

    /// A balanced original produces a balanced reversal.
    #[test]
    fn prop_balanced_original_balanced_reversal(lines in arb_balanced_lines()) {
        prop_assert!(ReversalService::validate_reversal(&lines, Decimal::ZERO));

        let output = ReversalService::create_reversing_entry(&make_input(lines));
        let debit: Decimal = output.lines.iter().map(|l| l.debit).sum();
        let credit: Decimal = output.lines.iter().map(|l| l.credit).sum();
        prop_assert_eq!(debit, credit);
    }

    /// Descriptions are prefixed with "Reversal: ".
    #[test]
    fn prop_description_prefixed(lines in arb_balanced_lines()) {
        let output = ReversalService::create_reversing_entry(&make_input(lines));
        for line in &output.lines {
            let prefixed = line
                .description
                .as_deref()
                .is_some_and(|d| d.starts_with("Reversal: "));
            prop_assert!(prefixed);
        }
        prop_assert!(output.description.starts_with("REVERSAL: "));
    }

    // =========================================================================
    // Property 5: Reversal Nets to Zero
    // =========================================================================

    /// Posting an entry and its reversal leaves every account, and every
    /// ancestor header, with a zero net change.
    #[test]
    fn prop_reversal_nets_to_zero(
        lines in arb_balanced_lines(),
        types in prop::collection::vec(arb_account_type(), 6),
        header_id in arb_uuid(),
    ) {
        let mut accounts = HashMap::new();
        accounts.insert(header_id, AccountInfo {
            id: header_id,
            code: "1000".to_string(),
            account_type: AccountType::Asset,
            parent_id: None,
            is_header: true,
            is_active: true,
        });
        for (idx, line) in lines.iter().enumerate() {
            accounts.entry(line.account_id).or_insert_with(|| AccountInfo {
                id: line.account_id,
                code: format!("11{idx:02}"),
                account_type: types[idx % types.len()],
                parent_id: (idx % 2 == 0).then_some(header_id),
                is_header: false,
                is_active: true,
            });
        }

        let output = ReversalService::create_reversing_entry(&make_input(lines.clone()));
        let reversing: Vec<StoredLine> = output
            .lines
            .into_iter()
            .map(|l| StoredLine {
                line_number: l.line_number,
                account_id: l.account_id,
                description: l.description,
                debit: l.debit,
                credit: l.credit,
            })
            .collect();

        let forward = posting_deltas(&lines, &accounts).unwrap();
        let backward = posting_deltas(&reversing, &accounts).unwrap();

        prop_assert_eq!(forward.len(), backward.len());
        for (account_id, delta) in &forward {
            prop_assert_eq!(*delta + backward[account_id], Decimal::ZERO);
        }
    }
}
