//! Balance derivation.
//!
//! Pure functions from ledger lines to per-account balances. Used in bulk by
//! reconciliation and incrementally (as deltas) at posting time.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::{AccountInfo, EntryStatus, NormalBalance, StoredLine};

/// A ledger line as seen by the derivation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerLine {
    /// Date of the owning entry.
    pub entry_date: NaiveDate,
    /// Status of the owning entry.
    pub status: EntryStatus,
    /// Debit amount.
    pub debit: Decimal,
    /// Credit amount.
    pub credit: Decimal,
}

/// Derived balance of one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceDerivation {
    /// Sum of counted debits.
    pub debit_total: Decimal,
    /// Sum of counted credits.
    pub credit_total: Decimal,
    /// Balance in the account's own sign.
    pub balance: Decimal,
}

impl BalanceDerivation {
    /// Derives an account balance from its lines.
    ///
    /// Only lines of entries that affect balances are counted, and only up to
    /// `as_of` (inclusive) when a cutoff is given.
    #[must_use]
    pub fn derive(lines: &[LedgerLine], normal: NormalBalance, as_of: Option<NaiveDate>) -> Self {
        let (debit_total, credit_total) = lines
            .iter()
            .filter(|l| l.status.affects_balances())
            .filter(|l| as_of.is_none_or(|cutoff| l.entry_date <= cutoff))
            .fold((Decimal::ZERO, Decimal::ZERO), |(d, c), l| {
                (d + l.debit, c + l.credit)
            });

        Self::from_totals(debit_total, credit_total, normal)
    }

    /// Derives a balance from pre-aggregated debit and credit sums.
    #[must_use]
    pub fn from_totals(debit_total: Decimal, credit_total: Decimal, normal: NormalBalance) -> Self {
        Self {
            debit_total,
            credit_total,
            balance: normal.balance_change(debit_total, credit_total),
        }
    }
}

/// Computes the signed cache deltas produced by posting `lines`.
///
/// Each line moves its own account by `sign(account) * (debit − credit)`.
/// The same amount is added to every ancestor header so that a header keeps
/// equalling the sum of its descendants. The map is keyed in ascending id
/// order, which is the order accounts must be locked in.
///
/// `accounts` must contain every line account and all of their ancestors.
/// Missing accounts are returned as `Err` with the offending id.
pub fn posting_deltas(
    lines: &[StoredLine],
    accounts: &HashMap<Uuid, AccountInfo>,
) -> Result<BTreeMap<Uuid, Decimal>, Uuid> {
    let mut deltas: BTreeMap<Uuid, Decimal> = BTreeMap::new();

    for line in lines {
        let account = accounts.get(&line.account_id).ok_or(line.account_id)?;
        let delta = account
            .account_type
            .normal_balance()
            .balance_change(line.debit, line.credit);

        *deltas.entry(account.id).or_default() += delta;

        for ancestor in ancestors(account, accounts)? {
            *deltas.entry(ancestor).or_default() += delta;
        }
    }

    Ok(deltas)
}

/// Returns the ids of an account's ancestors, nearest first.
///
/// Stops at the first repeated id so a corrupted (cyclic) hierarchy cannot
/// loop forever; hierarchy validation reports such cycles separately.
pub fn ancestors(
    account: &AccountInfo,
    accounts: &HashMap<Uuid, AccountInfo>,
) -> Result<Vec<Uuid>, Uuid> {
    let mut chain = Vec::new();
    let mut current = account.parent_id;

    while let Some(parent_id) = current {
        if parent_id == account.id || chain.contains(&parent_id) {
            break;
        }
        let parent = accounts.get(&parent_id).ok_or(parent_id)?;
        chain.push(parent_id);
        current = parent.parent_id;
    }

    Ok(chain)
}
