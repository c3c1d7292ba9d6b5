//! `SeaORM` active enums mirroring the Postgres enum types.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use ledgerline_core::audit;
use ledgerline_core::ledger::types as core;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "account_type")]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    #[sea_orm(string_value = "asset")]
    Asset,
    #[sea_orm(string_value = "liability")]
    Liability,
    #[sea_orm(string_value = "equity")]
    Equity,
    #[sea_orm(string_value = "revenue")]
    Revenue,
    #[sea_orm(string_value = "expense")]
    Expense,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "journal_status")]
#[serde(rename_all = "UPPERCASE")]
pub enum JournalStatus {
    #[sea_orm(string_value = "DRAFT")]
    Draft,
    #[sea_orm(string_value = "POSTED")]
    Posted,
    #[sea_orm(string_value = "REVERSED")]
    Reversed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "sync_action")]
#[serde(rename_all = "UPPERCASE")]
pub enum SyncAction {
    #[sea_orm(string_value = "INSERT")]
    Insert,
    #[sea_orm(string_value = "UPDATE")]
    Update,
    #[sea_orm(string_value = "DELETE")]
    Delete,
    #[sea_orm(string_value = "RECONCILE")]
    Reconcile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "sync_entity_type")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncEntityType {
    #[sea_orm(string_value = "ACCOUNT")]
    Account,
    #[sea_orm(string_value = "JOURNAL_ENTRY")]
    JournalEntry,
}

impl From<AccountType> for core::AccountType {
    fn from(value: AccountType) -> Self {
        match value {
            AccountType::Asset => Self::Asset,
            AccountType::Liability => Self::Liability,
            AccountType::Equity => Self::Equity,
            AccountType::Revenue => Self::Revenue,
            AccountType::Expense => Self::Expense,
        }
    }
}

impl From<core::AccountType> for AccountType {
    fn from(value: core::AccountType) -> Self {
        match value {
            core::AccountType::Asset => Self::Asset,
            core::AccountType::Liability => Self::Liability,
            core::AccountType::Equity => Self::Equity,
            core::AccountType::Revenue => Self::Revenue,
            core::AccountType::Expense => Self::Expense,
        }
    }
}

impl From<JournalStatus> for core::EntryStatus {
    fn from(value: JournalStatus) -> Self {
        match value {
            JournalStatus::Draft => Self::Draft,
            JournalStatus::Posted => Self::Posted,
            JournalStatus::Reversed => Self::Reversed,
        }
    }
}

impl From<core::EntryStatus> for JournalStatus {
    fn from(value: core::EntryStatus) -> Self {
        match value {
            core::EntryStatus::Draft => Self::Draft,
            core::EntryStatus::Posted => Self::Posted,
            core::EntryStatus::Reversed => Self::Reversed,
        }
    }
}

impl From<audit::SyncAction> for SyncAction {
    fn from(value: audit::SyncAction) -> Self {
        match value {
            audit::SyncAction::Insert => Self::Insert,
            audit::SyncAction::Update => Self::Update,
            audit::SyncAction::Delete => Self::Delete,
            audit::SyncAction::Reconcile => Self::Reconcile,
        }
    }
}

impl From<audit::SyncEntityType> for SyncEntityType {
    fn from(value: audit::SyncEntityType) -> Self {
        match value {
            audit::SyncEntityType::Account => Self::Account,
            audit::SyncEntityType::JournalEntry => Self::JournalEntry,
        }
    }
}
