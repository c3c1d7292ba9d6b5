//! Integration tests for the journal entry store.
//!
//! These tests verify that:
//! - Posting moves the cached balances of the line accounts and their headers
//! - Invalid drafts and illegal transitions are rejected without side effects
//! - Reversal nets every affected account back to zero
//! - Discarded drafts disappear

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::items_after_statements)]

mod common;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use ledgerline_core::audit::SyncEntityType;
use ledgerline_core::ledger::{
    AccountRef, AccountType, CreateJournalInput, ErrorKind, JournalLineInput, LedgerError,
};
use ledgerline_db::entities::journal_lines;
use ledgerline_db::entities::sea_orm_active_enums::{JournalStatus, SyncAction};
use ledgerline_db::repositories::{
    AccountRepository, AuditRepository, JournalRepository, StoreError,
};
use ledgerline_shared::types::{AccountId, ActorId, JournalEntryId, PageRequest};

use common::{Chart, connect, date, ledger_config, post_sale, sale_input, setup_chart};

async fn balance(db: &sea_orm::DatabaseConnection, id: Uuid) -> Decimal {
    AccountRepository::new(db.clone())
        .get_balance(AccountId::from_uuid(id))
        .await
        .expect("Failed to read balance")
}

async fn balances(db: &sea_orm::DatabaseConnection, chart: &Chart) -> [Decimal; 4] {
    [
        balance(db, chart.receivable.id).await,
        balance(db, chart.asset_header.id).await,
        balance(db, chart.sales.id).await,
        balance(db, chart.revenue_header.id).await,
    ]
}

#[tokio::test]
async fn test_post_sale_updates_accounts_and_headers() {
    let Some(db) = connect().await else { return };
    let chart = setup_chart(&db).await;
    let journal = JournalRepository::new(db.clone(), ledger_config());

    let draft = journal
        .create_draft(sale_input(&chart, dec!(1000000), "INV-A"))
        .await
        .expect("Failed to create draft");

    assert_eq!(draft.entry.status, JournalStatus::Draft);
    assert!(draft.entry.entry_number.starts_with("JE-2026/10/"));
    assert_eq!(draft.entry.source_type, "SALE");
    assert_eq!(draft.lines.len(), 2);
    assert_eq!(draft.lines[0].line_number, 1);
    assert_eq!(draft.lines[1].line_number, 2);

    // Drafts have no balance effect
    assert_eq!(balances(&db, &chart).await, [Decimal::ZERO; 4]);

    let posted = journal
        .post(JournalEntryId::from_uuid(draft.entry.id), ActorId::system())
        .await
        .expect("Failed to post");

    assert_eq!(posted.entry.status, JournalStatus::Posted);
    assert!(posted.entry.is_balanced);
    assert_eq!(posted.entry.total_debit, dec!(1000000));
    assert!(posted.entry.posted_at.is_some());

    assert_eq!(
        balances(&db, &chart).await,
        [dec!(1000000), dec!(1000000), dec!(1000000), dec!(1000000)]
    );

    // One UPDATE record per affected account, keyed by the entry id
    let audit = AuditRepository::new(db.clone());
    let records = audit
        .list_for_entity(SyncEntityType::Account, chart.asset_header.id)
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].action, SyncAction::Update);
    assert_eq!(records[0].run_id, draft.entry.id);
}

#[tokio::test]
async fn test_post_twice_is_rejected() {
    let Some(db) = connect().await else { return };
    let chart = setup_chart(&db).await;
    let journal = JournalRepository::new(db.clone(), ledger_config());

    let entry_id = post_sale(&journal, &chart, dec!(250), "INV-TWICE").await;
    let err = journal
        .post(JournalEntryId::from_uuid(entry_id), ActorId::system())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        StoreError::Ledger(LedgerError::CannotPost { .. })
    ));
    assert_eq!(balance(&db, chart.receivable.id).await, dec!(250));
}

#[tokio::test]
async fn test_unbalanced_draft_cannot_be_posted() {
    let Some(db) = connect().await else { return };
    let chart = setup_chart(&db).await;
    let journal = JournalRepository::new(db.clone(), ledger_config());

    let input = CreateJournalInput {
        lines: vec![
            JournalLineInput::debit(AccountRef::Id(chart.receivable.id), dec!(100)),
            JournalLineInput::credit(AccountRef::Id(chart.sales.id), dec!(99)),
        ],
        ..sale_input(&chart, dec!(100), "INV-UNBAL")
    };
    let draft = journal.create_draft(input).await.expect("Drafts may be unbalanced");
    assert!(!draft.entry.is_balanced);

    let err = journal
        .post(JournalEntryId::from_uuid(draft.entry.id), ActorId::system())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        StoreError::Ledger(LedgerError::Unbalanced { .. })
    ));
    assert_eq!(balances(&db, &chart).await, [Decimal::ZERO; 4]);

    let reread = journal
        .get_by_id(JournalEntryId::from_uuid(draft.entry.id))
        .await
        .unwrap();
    assert_eq!(reread.entry.status, JournalStatus::Draft);
}

#[tokio::test]
async fn test_difference_within_tolerance_posts() {
    let Some(db) = connect().await else { return };
    let chart = setup_chart(&db).await;
    let journal = JournalRepository::new(db.clone(), ledger_config());

    let input = CreateJournalInput {
        lines: vec![
            JournalLineInput::debit(AccountRef::Id(chart.receivable.id), dec!(100.01)),
            JournalLineInput::credit(AccountRef::Id(chart.sales.id), dec!(100)),
        ],
        ..sale_input(&chart, dec!(100), "INV-TOL")
    };
    let draft = journal.create_draft(input).await.unwrap();
    let posted = journal
        .post(JournalEntryId::from_uuid(draft.entry.id), ActorId::system())
        .await
        .expect("Difference of 0.01 is within tolerance");

    assert!(posted.entry.is_balanced);
    assert_eq!(balance(&db, chart.receivable.id).await, dec!(100.01));
    assert_eq!(balance(&db, chart.sales.id).await, dec!(100));

    // The same tolerance applies when the entry is reversed
    journal
        .reverse(
            JournalEntryId::from_uuid(draft.entry.id),
            "Rounding",
            ActorId::system(),
        )
        .await
        .expect("Entry within tolerance can be reversed");
    assert_eq!(balances(&db, &chart).await, [Decimal::ZERO; 4]);
}

#[tokio::test]
async fn test_draft_validation_errors() {
    let Some(db) = connect().await else { return };
    let chart = setup_chart(&db).await;
    let journal = JournalRepository::new(db.clone(), ledger_config());

    // Header accounts do not accept lines
    let input = CreateJournalInput {
        lines: vec![
            JournalLineInput::debit(AccountRef::Id(chart.asset_header.id), dec!(10)),
            JournalLineInput::credit(AccountRef::Id(chart.sales.id), dec!(10)),
        ],
        ..sale_input(&chart, dec!(10), "INV-HDR")
    };
    let err = journal.create_draft(input).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::Ledger(LedgerError::HeaderAccountPosting(_))
    ));

    // Unknown account code
    let input = CreateJournalInput {
        lines: vec![
            JournalLineInput::debit(AccountRef::Code("NOPE-000".to_string()), dec!(10)),
            JournalLineInput::credit(AccountRef::Id(chart.sales.id), dec!(10)),
        ],
        ..sale_input(&chart, dec!(10), "INV-UNKNOWN")
    };
    let err = journal.create_draft(input).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    // Both sides on one line
    let input = CreateJournalInput {
        lines: vec![JournalLineInput {
            account: AccountRef::Id(chart.cash.id),
            description: None,
            debit: dec!(5),
            credit: dec!(5),
        }],
        ..sale_input(&chart, dec!(5), "INV-SIDES")
    };
    let err = journal.create_draft(input).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::Ledger(LedgerError::InvalidLineSides { line: 1 })
    ));

    // No lines
    let input = CreateJournalInput {
        lines: vec![],
        ..sale_input(&chart, dec!(5), "INV-EMPTY")
    };
    let err = journal.create_draft(input).await.unwrap_err();
    assert!(matches!(err, StoreError::Ledger(LedgerError::NoLines)));

    // Inactive account
    let accounts = AccountRepository::new(db.clone());
    accounts
        .deactivate(AccountId::from_uuid(chart.cash.id))
        .await
        .unwrap();
    let input = CreateJournalInput {
        lines: vec![
            JournalLineInput::debit(AccountRef::Id(chart.cash.id), dec!(10)),
            JournalLineInput::credit(AccountRef::Id(chart.sales.id), dec!(10)),
        ],
        ..sale_input(&chart, dec!(10), "INV-INACTIVE")
    };
    let err = journal.create_draft(input).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::Ledger(LedgerError::AccountInactive(_))
    ));
}

#[tokio::test]
async fn test_unstorable_amounts_are_validation_errors() {
    let Some(db) = connect().await else { return };
    let chart = setup_chart(&db).await;
    let journal = JournalRepository::new(db.clone(), ledger_config());

    for (amount, source_id) in [
        (dec!(0.00001), "INV-TINY"),
        (dec!(100000000000000000), "INV-HUGE"),
    ] {
        let err = journal
            .create_draft(sale_input(&chart, amount, source_id))
            .await
            .unwrap_err();
        assert!(
            matches!(err, StoreError::Ledger(LedgerError::AmountOutOfRange { line: 1 })),
            "unexpected error for {}: {:?}",
            amount,
            err
        );
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.http_status_code(), 400);
        assert_eq!(err.error_code(), "AMOUNT_OUT_OF_RANGE");
    }

    // Nothing was written
    for source_id in ["INV-TINY", "INV-HUGE"] {
        assert!(journal.get_by_source("sale", source_id).await.unwrap().is_empty());
    }
    assert_eq!(balances(&db, &chart).await, [Decimal::ZERO; 4]);
}

#[tokio::test]
async fn test_reversal_nets_to_zero() {
    let Some(db) = connect().await else { return };
    let chart = setup_chart(&db).await;
    let journal = JournalRepository::new(db.clone(), ledger_config());

    let entry_id = post_sale(&journal, &chart, dec!(1000000), "INV-REV").await;
    let result = journal
        .reverse(
            JournalEntryId::from_uuid(entry_id),
            "Invoice cancelled",
            ActorId::system(),
        )
        .await
        .expect("Failed to reverse");

    assert_eq!(result.original.entry.status, JournalStatus::Reversed);
    assert_eq!(
        result.original.entry.reversed_by_entry_id,
        Some(result.reversal.entry.id)
    );
    assert_eq!(
        result.original.entry.reversal_reason.as_deref(),
        Some("Invoice cancelled")
    );
    assert_eq!(result.reversal.entry.status, JournalStatus::Posted);
    assert_eq!(result.reversal.entry.source_type, "REVERSAL");
    assert_eq!(result.reversal.entry.source_id, entry_id.to_string());
    assert_eq!(result.reversal.entry.reversal_of_id, Some(entry_id));
    assert!(result.reversal.entry.entry_number.starts_with("REV-JE-"));
    assert!(result.reversal.entry.description.starts_with("REVERSAL: "));

    // Lines are the exact inverse
    for (orig, rev) in result
        .original
        .lines
        .iter()
        .zip(result.reversal.lines.iter())
    {
        assert_eq!(orig.account_id, rev.account_id);
        assert_eq!(orig.debit_amount, rev.credit_amount);
        assert_eq!(orig.credit_amount, rev.debit_amount);
        assert!(rev.description.as_deref().unwrap_or("").starts_with("Reversal: "));
    }

    assert_eq!(balances(&db, &chart).await, [Decimal::ZERO; 4]);

    // Original lines were not touched
    let original = journal
        .get_by_id(JournalEntryId::from_uuid(entry_id))
        .await
        .unwrap();
    assert_eq!(original.lines, result.original.lines);

    // Second reversal is rejected
    let err = journal
        .reverse(JournalEntryId::from_uuid(entry_id), "again", ActorId::system())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Ledger(LedgerError::AlreadyReversed(_))
    ));

    // History resolves from either side
    let history = journal
        .get_reversal_history(JournalEntryId::from_uuid(result.reversal.entry.id))
        .await
        .unwrap();
    assert_eq!(history.original.entry.id, entry_id);
    assert_eq!(
        history.reversal.map(|r| r.entry.id),
        Some(result.reversal.entry.id)
    );

    let eligibility = journal
        .can_reverse(JournalEntryId::from_uuid(entry_id))
        .await
        .unwrap();
    assert!(!eligibility.can_reverse);
}

#[tokio::test]
async fn test_reverse_requires_reason_and_posted_entry() {
    let Some(db) = connect().await else { return };
    let chart = setup_chart(&db).await;
    let journal = JournalRepository::new(db.clone(), ledger_config());

    let draft = journal
        .create_draft(sale_input(&chart, dec!(40), "INV-DRAFT-REV"))
        .await
        .unwrap();
    let err = journal
        .reverse(
            JournalEntryId::from_uuid(draft.entry.id),
            "mistake",
            ActorId::system(),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Ledger(LedgerError::CannotReverse { .. })
    ));

    let entry_id = post_sale(&journal, &chart, dec!(40), "INV-NO-REASON").await;
    let err = journal
        .reverse(JournalEntryId::from_uuid(entry_id), "   ", ActorId::system())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Ledger(LedgerError::MissingReversalReason)
    ));

    let eligibility = journal
        .can_reverse(JournalEntryId::from_uuid(entry_id))
        .await
        .unwrap();
    assert!(eligibility.can_reverse);
    assert_eq!(balance(&db, chart.receivable.id).await, dec!(40));
}

#[tokio::test]
async fn test_reverse_refuses_tampered_lines() {
    let Some(db) = connect().await else { return };
    let chart = setup_chart(&db).await;
    let journal = JournalRepository::new(db.clone(), ledger_config());

    let entry_id = post_sale(&journal, &chart, dec!(70), "INV-TAMPER").await;
    journal_lines::Entity::update_many()
        .col_expr(journal_lines::Column::DebitAmount, Expr::value(dec!(75)))
        .filter(journal_lines::Column::EntryId.eq(entry_id))
        .filter(journal_lines::Column::LineNumber.eq(1))
        .exec(&db)
        .await
        .unwrap();

    let err = journal
        .reverse(JournalEntryId::from_uuid(entry_id), "Mistake", ActorId::system())
        .await
        .unwrap_err();

    journal_lines::Entity::update_many()
        .col_expr(journal_lines::Column::DebitAmount, Expr::value(dec!(70)))
        .filter(journal_lines::Column::EntryId.eq(entry_id))
        .filter(journal_lines::Column::LineNumber.eq(1))
        .exec(&db)
        .await
        .unwrap();

    assert!(matches!(err, StoreError::Ledger(LedgerError::Internal(_))));
    assert_eq!(err.http_status_code(), 500);

    let entry = journal
        .get_by_id(JournalEntryId::from_uuid(entry_id))
        .await
        .unwrap();
    assert_eq!(entry.entry.status, JournalStatus::Posted);
    assert!(
        journal
            .get_by_source("REVERSAL", &entry_id.to_string())
            .await
            .unwrap()
            .is_empty()
    );
    assert_eq!(balance(&db, chart.receivable.id).await, dec!(70));
}

#[tokio::test]
async fn test_discard_hides_draft() {
    let Some(db) = connect().await else { return };
    let chart = setup_chart(&db).await;
    let journal = JournalRepository::new(db.clone(), ledger_config());

    let draft = journal
        .create_draft(sale_input(&chart, dec!(75), "INV-DISCARD"))
        .await
        .unwrap();
    let id = JournalEntryId::from_uuid(draft.entry.id);

    journal.discard(id).await.expect("Failed to discard");

    let err = journal.get_by_id(id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let err = journal.post(id, ActorId::system()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let audit = AuditRepository::new(db.clone());
    let records = audit
        .list_for_entity(SyncEntityType::JournalEntry, draft.entry.id)
        .await
        .unwrap();
    assert!(records.iter().any(|r| r.action == SyncAction::Delete));

    // Posted entries cannot be discarded
    let posted = post_sale(&journal, &chart, dec!(75), "INV-DISCARD-POSTED").await;
    let err = journal
        .discard(JournalEntryId::from_uuid(posted))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Ledger(LedgerError::CanOnlyDiscardDraft { .. })
    ));
}

#[tokio::test]
async fn test_get_by_source_and_date_range() {
    let Some(db) = connect().await else { return };
    let chart = setup_chart(&db).await;
    let journal = JournalRepository::new(db.clone(), ledger_config());

    let source_id = format!("INV-{}", Uuid::new_v4());
    let first = post_sale(&journal, &chart, dec!(10), &source_id).await;
    let second = journal
        .create_draft(sale_input(&chart, dec!(20), &source_id))
        .await
        .unwrap();

    let entries = journal.get_by_source(" sale ", &source_id).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].entry.id, first);
    assert_eq!(entries[1].entry.id, second.entry.id);
    assert_eq!(entries[0].lines.len(), 2);

    let page = journal
        .list_by_date_range(
            date(2026, 10, 19),
            date(2026, 10, 19),
            PageRequest::from_query(Some(1), Some(5)),
        )
        .await
        .unwrap();
    assert!(page.data.len() <= 5);
    assert!(page.meta.total >= 2);
    assert!(page.data.iter().all(|e| e.entry.entry_date == date(2026, 10, 19)));
}

#[tokio::test]
async fn test_account_registry_rules() {
    let Some(db) = connect().await else { return };
    let chart = setup_chart(&db).await;
    let accounts = AccountRepository::new(db.clone());

    // Duplicate code
    let err = accounts
        .create_account(ledgerline_db::repositories::CreateAccountInput {
            code: chart.cash.code.clone(),
            name: "Cash again".to_string(),
            account_type: AccountType::Asset,
            parent_code: None,
            is_header: false,
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Ledger(LedgerError::DuplicateAccountCode(_))
    ));

    // Parent of another type
    let err = accounts
        .create_account(ledgerline_db::repositories::CreateAccountInput {
            code: format!("{}9", chart.asset_header.code),
            name: "Wrong type".to_string(),
            account_type: AccountType::Expense,
            parent_code: Some(chart.asset_header.code.clone()),
            is_header: false,
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Ledger(LedgerError::InvalidParent(_))
    ));

    // Parent that is not a header
    let err = accounts
        .create_account(ledgerline_db::repositories::CreateAccountInput {
            code: format!("{}9", chart.cash.code),
            name: "Under leaf".to_string(),
            account_type: AccountType::Asset,
            parent_code: Some(chart.cash.code.clone()),
            is_header: false,
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Ledger(LedgerError::InvalidParent(_))
    ));

    assert_eq!(chart.receivable.level, chart.asset_header.level + 1);

    // Accounts with a balance cannot be deactivated
    let journal = JournalRepository::new(db.clone(), ledger_config());
    post_sale(&journal, &chart, dec!(15), "INV-DEACT").await;
    let err = accounts
        .deactivate(AccountId::from_uuid(chart.receivable.id))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Ledger(LedgerError::AccountHasBalance { .. })
    ));

    let rollup = accounts.rollup_header(&chart.asset_header.code).await.unwrap();
    assert_eq!(rollup, dec!(15));
}
