//! Double-entry journal logic.
//!
//! This module implements the pure side of the ledger:
//! - Domain types for accounts, entries and lines
//! - Error taxonomy for ledger operations
//! - Draft validation and lifecycle rules
//! - Balance derivation and posting deltas
//! - Reversing entry construction

pub mod balance;
pub mod error;
pub mod reversal;
pub mod service;
pub mod types;

#[cfg(test)]
mod reversal_props;
#[cfg(test)]
mod service_props;

pub use balance::{BalanceDerivation, LedgerLine, ancestors, posting_deltas};
pub use error::{ErrorKind, LedgerError};
pub use reversal::{ReversalInput, ReversalOutput, ReversalService};
pub use service::JournalService;
pub use types::{
    AccountInfo, AccountRef, AccountType, CreateJournalInput, EntryStatus, EntryTotals,
    JournalLineInput, NormalBalance, REVERSAL_SOURCE_TYPE, StoredLine, ValidatedLine,
};
