//! Standard chart-of-accounts seeder for Ledgerline.
//!
//! Inserts a small trading-company chart of accounts. Accounts whose code
//! already exists are left alone, so the seeder can be re-run safely.
//!
//! Usage: cargo run --bin seeder

use anyhow::Context;
use tracing::info;

use ledgerline_core::ledger::{AccountType, LedgerError};
use ledgerline_db::repositories::{AccountRepository, CreateAccountInput, StoreError};
use ledgerline_shared::AppConfig;

/// One seeded account: code, name, type, parent code, header flag.
type SeedAccount = (
    &'static str,
    &'static str,
    AccountType,
    Option<&'static str>,
    bool,
);

/// Parents come before their children.
const CHART: &[SeedAccount] = &[
    ("1000", "Assets", AccountType::Asset, None, true),
    ("1100", "Current Assets", AccountType::Asset, Some("1000"), true),
    ("1101", "Cash", AccountType::Asset, Some("1100"), false),
    ("1102", "Bank", AccountType::Asset, Some("1100"), false),
    ("1103", "Accounts Receivable", AccountType::Asset, Some("1100"), false),
    ("1104", "Inventory", AccountType::Asset, Some("1100"), false),
    ("2000", "Liabilities", AccountType::Liability, None, true),
    ("2100", "Current Liabilities", AccountType::Liability, Some("2000"), true),
    ("2101", "Accounts Payable", AccountType::Liability, Some("2100"), false),
    ("2102", "Tax Payable", AccountType::Liability, Some("2100"), false),
    ("3000", "Equity", AccountType::Equity, None, true),
    ("3101", "Owner Capital", AccountType::Equity, Some("3000"), false),
    ("3102", "Retained Earnings", AccountType::Equity, Some("3000"), false),
    ("4000", "Revenue", AccountType::Revenue, None, true),
    ("4101", "Sales Revenue", AccountType::Revenue, Some("4000"), false),
    ("4102", "Service Revenue", AccountType::Revenue, Some("4000"), false),
    ("5000", "Expense", AccountType::Expense, None, true),
    ("5101", "Cost of Goods Sold", AccountType::Expense, Some("5000"), false),
    ("5201", "Operating Expense", AccountType::Expense, Some("5000"), false),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ledgerline=info".into()),
        )
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;
    let db = ledgerline_db::connect(&config.database)
        .await
        .context("Failed to connect to database")?;
    let repo = AccountRepository::new(db);

    let mut created = 0;
    let mut skipped = 0;

    for &(code, name, account_type, parent_code, is_header) in CHART {
        let result = repo
            .create_account(CreateAccountInput {
                code: code.to_string(),
                name: name.to_string(),
                account_type,
                parent_code: parent_code.map(str::to_string),
                is_header,
            })
            .await;

        match result {
            Ok(_) => created += 1,
            Err(StoreError::Ledger(LedgerError::DuplicateAccountCode(_))) => {
                info!(code, "Account already exists, skipping");
                skipped += 1;
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to seed account {code}")),
        }
    }

    info!(created, skipped, "Chart of accounts seeded");
    Ok(())
}
