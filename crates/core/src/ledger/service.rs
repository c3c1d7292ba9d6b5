//! Journal service for entry validation and state-transition rules.
//!
//! This module holds the pure business rules applied before anything is
//! persisted: line validation on draft creation, the balance check on
//! posting, and the legal lifecycle transitions.

use rust_decimal::Decimal;

use super::error::LedgerError;
use super::types::{
    AccountInfo, AccountRef, CreateJournalInput, EntryStatus, EntryTotals, StoredLine,
    ValidatedLine,
};

/// Decimal places kept by the amount and balance columns.
pub const AMOUNT_SCALE: u32 = 4;

/// Exclusive upper bound of a stored amount or total.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_874_919_424, 2_328_306, 0, false, 0); // 10^16

/// Journal service for entry validation.
///
/// This service contains pure business logic with no database dependencies.
/// Account lookups are supplied by the caller as a closure.
pub struct JournalService;

impl JournalService {
    /// Validate a draft request and resolve its lines.
    ///
    /// Checks performed:
    /// 1. Source type is present
    /// 2. At least one line
    /// 3. Each line: no negative amounts, stored precision, exactly one positive side
    /// 4. Each line: account exists, is active, and is not a header
    /// 5. Debit and credit totals fit the stored precision
    ///
    /// Balance is not checked here. Unbalanced drafts are rejected by `post`.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError` for the first violated rule.
    pub fn validate_draft<A>(
        input: &CreateJournalInput,
        account_lookup: A,
    ) -> Result<Vec<ValidatedLine>, LedgerError>
    where
        A: Fn(&AccountRef) -> Result<AccountInfo, LedgerError>,
    {
        if Self::normalize_source_type(&input.source_type).is_empty() {
            return Err(LedgerError::MissingSourceType);
        }

        if input.lines.is_empty() {
            return Err(LedgerError::NoLines);
        }

        let mut validated = Vec::with_capacity(input.lines.len());

        for (idx, line) in input.lines.iter().enumerate() {
            let line_number = i32::try_from(idx + 1)
                .map_err(|_| LedgerError::Internal("too many lines".to_string()))?;

            Self::validate_amounts(line_number, line.debit, line.credit)?;

            let account = account_lookup(&line.account)?;
            Self::validate_postable(&account)?;

            validated.push(ValidatedLine {
                line_number,
                account_id: account.id,
                description: line.description.clone(),
                debit: line.debit,
                credit: line.credit,
            });
        }

        let total_debit: Decimal = validated.iter().map(|l| l.debit).sum();
        let total_credit: Decimal = validated.iter().map(|l| l.credit).sum();
        if total_debit >= MAX_AMOUNT || total_credit >= MAX_AMOUNT {
            return Err(LedgerError::TotalOutOfRange);
        }

        Ok(validated)
    }

    /// Validate a single line's amounts.
    ///
    /// # Errors
    ///
    /// Returns an error if an amount is negative, does not fit the stored
    /// precision, or if the line does not have exactly one strictly positive side.
    pub fn validate_amounts(line: i32, debit: Decimal, credit: Decimal) -> Result<(), LedgerError> {
        if debit < Decimal::ZERO || credit < Decimal::ZERO {
            return Err(LedgerError::NegativeAmount { line });
        }
        if !Self::fits_storage(debit) || !Self::fits_storage(credit) {
            return Err(LedgerError::AmountOutOfRange { line });
        }

        let debit_side = debit > Decimal::ZERO;
        let credit_side = credit > Decimal::ZERO;
        if debit_side == credit_side {
            return Err(LedgerError::InvalidLineSides { line });
        }

        Ok(())
    }

    /// Returns true if the amount is stored without rounding or overflow.
    #[must_use]
    pub fn fits_storage(amount: Decimal) -> bool {
        amount.abs() < MAX_AMOUNT && amount.normalize().scale() <= AMOUNT_SCALE
    }

    /// Validate that an account can receive postings.
    ///
    /// # Errors
    ///
    /// Returns an error if the account is inactive or a header.
    pub fn validate_postable(account: &AccountInfo) -> Result<(), LedgerError> {
        if !account.is_active {
            return Err(LedgerError::AccountInactive(account.code.clone()));
        }
        if account.is_header {
            return Err(LedgerError::HeaderAccountPosting(account.code.clone()));
        }
        Ok(())
    }

    /// Trim and upper-case a source type.
    #[must_use]
    pub fn normalize_source_type(source_type: &str) -> String {
        source_type.trim().to_uppercase()
    }

    /// Calculate entry totals from stored lines.
    #[must_use]
    pub fn calculate_totals(lines: &[StoredLine], tolerance: Decimal) -> EntryTotals {
        let total_debit: Decimal = lines.iter().map(|l| l.debit).sum();
        let total_credit: Decimal = lines.iter().map(|l| l.credit).sum();

        EntryTotals::new(total_debit, total_credit, tolerance)
    }

    /// Validate that an entry can be posted and return its totals.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry is not a draft, has no lines, or is unbalanced.
    pub fn validate_can_post(
        entry_id: uuid::Uuid,
        status: EntryStatus,
        lines: &[StoredLine],
        tolerance: Decimal,
    ) -> Result<EntryTotals, LedgerError> {
        if status != EntryStatus::Draft {
            return Err(LedgerError::cannot_post(entry_id, status));
        }

        if lines.is_empty() {
            return Err(LedgerError::NoLines);
        }

        let totals = Self::calculate_totals(lines, tolerance);
        if !totals.is_balanced {
            return Err(LedgerError::Unbalanced {
                debit: totals.total_debit,
                credit: totals.total_credit,
            });
        }

        Ok(totals)
    }

    /// Validate that an entry can be reversed.
    ///
    /// # Errors
    ///
    /// Returns an error if the reason is blank, the entry was already
    /// reversed, or it was never posted.
    pub fn validate_can_reverse(
        entry_id: uuid::Uuid,
        status: EntryStatus,
        reason: &str,
    ) -> Result<(), LedgerError> {
        match status {
            EntryStatus::Posted => {}
            EntryStatus::Reversed => return Err(LedgerError::AlreadyReversed(entry_id)),
            EntryStatus::Draft => {
                return Err(LedgerError::CannotReverse {
                    entry_id,
                    status: status.as_str(),
                });
            }
        }

        if reason.trim().is_empty() {
            return Err(LedgerError::MissingReversalReason);
        }

        Ok(())
    }

    /// Validate that an entry can be discarded.
    ///
    /// Only draft entries can be discarded.
    ///
    /// # Errors
    ///
    /// Returns error if the entry is not in draft status.
    pub fn validate_can_discard(
        entry_id: uuid::Uuid,
        status: EntryStatus,
    ) -> Result<(), LedgerError> {
        if status != EntryStatus::Draft {
            return Err(LedgerError::CanOnlyDiscardDraft {
                entry_id,
                status: status.as_str(),
            });
        }
        Ok(())
    }
}
