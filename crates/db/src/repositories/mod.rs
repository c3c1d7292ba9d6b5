//! Repository abstractions for data access.
//!
//! Repositories provide a clean interface for database operations,
//! hiding the `SeaORM` implementation details from the rest of the application.

pub mod account;
pub mod audit;
pub mod error;
pub mod journal;
pub mod reconciliation;
pub mod sync;

pub use account::{AccountFilter, AccountRepository, CreateAccountInput};
pub use audit::AuditRepository;
pub use error::StoreError;
pub use journal::{
    EntryWithLines, JournalRepository, ReversalEligibility, ReversalHistory, ReversalResult,
};
pub use reconciliation::{IntegrityReport, ReconciliationRepository};
pub use sync::{SyncOutcome, SyncRepository, SyncSummary};
