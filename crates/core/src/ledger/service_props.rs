//! Property-based tests for `JournalService`.
//!
//! - Property 1: Entry Balance Integrity
//! - Property 2: Line Shape Validation
//! - Property 3: Lifecycle Transitions

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::error::LedgerError;
use super::service::JournalService;
use super::types::{
    AccountInfo, AccountRef, AccountType, CreateJournalInput, EntryStatus, JournalLineInput,
    StoredLine,
};

/// Strategy to generate positive decimal amounts (0.01 to 10,000.00).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

fn status_strategy() -> impl Strategy<Value = EntryStatus> {
    prop_oneof![
        Just(EntryStatus::Draft),
        Just(EntryStatus::Posted),
        Just(EntryStatus::Reversed),
    ]
}

fn tolerance() -> Decimal {
    Decimal::new(1, 2)
}

fn stored(n: i32, debit: Decimal, credit: Decimal) -> StoredLine {
    StoredLine {
        line_number: n,
        account_id: Uuid::new_v4(),
        description: None,
        debit,
        credit,
    }
}

fn make_input(lines: Vec<JournalLineInput>) -> CreateJournalInput {
    CreateJournalInput {
        source_type: "SALE".to_string(),
        source_id: "INV-1".to_string(),
        entry_date: NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
        description: "Test entry".to_string(),
        lines,
        is_auto_generated: false,
        created_by: Uuid::new_v4(),
    }
}

/// Mock account lookup that always succeeds with a postable account.
fn ok_lookup(account: &AccountRef) -> Result<AccountInfo, LedgerError> {
    let id = match account {
        AccountRef::Id(id) => *id,
        AccountRef::Code(_) => Uuid::new_v4(),
    };
    Ok(AccountInfo {
        id,
        code: account.to_string(),
        account_type: AccountType::Asset,
        parent_id: None,
        is_header: false,
        is_active: true,
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // =========================================================================
    // Property 1: Entry Balance Integrity
    // =========================================================================

    /// Property 1.1: Balanced drafts can be posted.
    ///
    /// *For any* draft whose debits equal its credits, posting validation
    /// SHALL succeed and report balanced totals.
    #[test]
    fn prop_balanced_draft_can_post(
        amount1 in positive_amount(),
        amount2 in positive_amount(),
    ) {
        let lines = vec![
            stored(1, amount1, Decimal::ZERO),
            stored(2, amount2, Decimal::ZERO),
            stored(3, Decimal::ZERO, amount1 + amount2),
        ];

        let totals = JournalService::validate_can_post(
            Uuid::new_v4(),
            EntryStatus::Draft,
            &lines,
            tolerance(),
        );

        prop_assert!(totals.is_ok());
        let totals = totals.unwrap();
        prop_assert!(totals.is_balanced);
        prop_assert_eq!(totals.total_debit, totals.total_credit);
    }

    /// Property 1.2: Drafts outside the tolerance are rejected.
    ///
    /// *For any* draft where |debit - credit| > 0.01, posting validation
    /// SHALL fail with `Unbalanced` carrying both totals.
    #[test]
    fn prop_unbalanced_draft_rejected(
        debit in positive_amount(),
        credit in positive_amount(),
    ) {
        prop_assume!((debit - credit).abs() > tolerance());

        let lines = vec![stored(1, debit, Decimal::ZERO), stored(2, Decimal::ZERO, credit)];
        let result = JournalService::validate_can_post(
            Uuid::new_v4(),
            EntryStatus::Draft,
            &lines,
            tolerance(),
        );

        match result {
            Err(LedgerError::Unbalanced { debit: d, credit: c }) => {
                prop_assert_eq!(d, debit);
                prop_assert_eq!(c, credit);
            }
            other => prop_assert!(false, "expected Unbalanced, got {:?}", other),
        }
    }

    // =========================================================================
    // Property 2: Line Shape Validation
    // =========================================================================

    /// Property 2.1: Single-sided positive lines are accepted.
    #[test]
    fn prop_single_sided_lines_accepted(
        amounts in prop::collection::vec(positive_amount(), 1..8),
    ) {
        let lines: Vec<JournalLineInput> = amounts
            .iter()
            .enumerate()
            .map(|(i, amount)| {
                let account = AccountRef::Id(Uuid::new_v4());
                if i % 2 == 0 {
                    JournalLineInput::debit(account, *amount)
                } else {
                    JournalLineInput::credit(account, *amount)
                }
            })
            .collect();
        let input = make_input(lines);

        let validated = JournalService::validate_draft(&input, ok_lookup);

        prop_assert!(validated.is_ok());
        let validated = validated.unwrap();
        prop_assert_eq!(validated.len(), amounts.len());
        for (idx, line) in validated.iter().enumerate() {
            prop_assert_eq!(line.line_number, i32::try_from(idx + 1).unwrap());
        }
    }

    /// Property 2.2: Lines with both sides positive are rejected.
    #[test]
    fn prop_two_sided_line_rejected(
        debit in positive_amount(),
        credit in positive_amount(),
    ) {
        let line = JournalLineInput {
            account: AccountRef::Id(Uuid::new_v4()),
            description: None,
            debit,
            credit,
        };
        let input = make_input(vec![line]);

        let result = JournalService::validate_draft(&input, ok_lookup);
        let is_invalid_sides = matches!(result, Err(LedgerError::InvalidLineSides { line: 1 }));
        prop_assert!(is_invalid_sides);
    }

    /// Property 2.3: Negative amounts are rejected whatever the other side.
    #[test]
    fn prop_negative_amount_rejected(
        amount in positive_amount(),
        other in positive_amount(),
        negative_debit in any::<bool>(),
    ) {
        let (debit, credit) = if negative_debit {
            (-amount, other)
        } else {
            (other, -amount)
        };
        let result = JournalService::validate_amounts(3, debit, credit);
        let is_negative = matches!(result, Err(LedgerError::NegativeAmount { line: 3 }));
        prop_assert!(is_negative);
    }

    // =========================================================================
    // Property 3: Lifecycle Transitions
    // =========================================================================

    /// Property 3.1: Only drafts can be posted or discarded.
    #[test]
    fn prop_only_drafts_post_or_discard(
        status in status_strategy(),
        amount in positive_amount(),
    ) {
        let id = Uuid::new_v4();
        let lines = vec![stored(1, amount, Decimal::ZERO), stored(2, Decimal::ZERO, amount)];

        let post = JournalService::validate_can_post(id, status, &lines, tolerance());
        let discard = JournalService::validate_can_discard(id, status);

        prop_assert_eq!(post.is_ok(), status == EntryStatus::Draft);
        prop_assert_eq!(discard.is_ok(), status == EntryStatus::Draft);
    }

    /// Property 3.2: Only posted entries can be reversed, and only with a reason.
    #[test]
    fn prop_only_posted_reverse(
        status in status_strategy(),
        reason in "[ a-zA-Z]{0,12}",
    ) {
        let result = JournalService::validate_can_reverse(Uuid::new_v4(), status, &reason);
        let expected_ok = status == EntryStatus::Posted && !reason.trim().is_empty();
        prop_assert_eq!(result.is_ok(), expected_ok);

        if status == EntryStatus::Reversed {
            let is_already = matches!(result, Err(LedgerError::AlreadyReversed(_)));
            prop_assert!(is_already);
        }
    }
}
