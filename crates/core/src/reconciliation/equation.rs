//! Accounting equation check over cached balances.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ledger::types::AccountType;

/// Both sides of `Assets = Liabilities + Equity + (Revenue - Expense)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EquationCheck {
    /// Sum of asset balances.
    pub assets: Decimal,
    /// Sum of liability balances.
    pub liabilities: Decimal,
    /// Sum of equity balances.
    pub equity: Decimal,
    /// Sum of revenue balances.
    pub revenue: Decimal,
    /// Sum of expense balances.
    pub expense: Decimal,
    /// `revenue - expense`.
    pub net_income: Decimal,
    /// `liabilities + equity + net_income`.
    pub right_side: Decimal,
    /// `assets - right_side`.
    pub difference: Decimal,
    /// Whether |difference| is within the tolerance.
    pub is_balanced: bool,
}

impl EquationCheck {
    /// Sums balances per account type and checks the equation.
    ///
    /// Balances are in each account's own sign. Callers pass non-header
    /// accounts only, so headers are not counted twice.
    #[must_use]
    pub fn from_balances<I>(balances: I, tolerance: Decimal) -> Self
    where
        I: IntoIterator<Item = (AccountType, Decimal)>,
    {
        let mut check = Self::default();

        for (account_type, balance) in balances {
            match account_type {
                AccountType::Asset => check.assets += balance,
                AccountType::Liability => check.liabilities += balance,
                AccountType::Equity => check.equity += balance,
                AccountType::Revenue => check.revenue += balance,
                AccountType::Expense => check.expense += balance,
            }
        }

        check.net_income = check.revenue - check.expense;
        check.right_side = check.liabilities + check.equity + check.net_income;
        check.difference = check.assets - check.right_side;
        check.is_balanced = check.difference.abs() <= tolerance;
        check
    }
}
