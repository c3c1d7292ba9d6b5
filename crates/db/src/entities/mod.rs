//! `SeaORM` entities for the ledger schema.

pub mod accounts;
pub mod balance_sync_log;
pub mod journal_entries;
pub mod journal_lines;
pub mod sea_orm_active_enums;
