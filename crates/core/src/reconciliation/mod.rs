//! Reconciliation: drift detection, journal integrity, hierarchy and
//! accounting equation checks, and health scoring.
//!
//! Everything here is read-only arithmetic over data the caller has loaded.
//! Repairs are performed by the synchronization path in the db layer.

pub mod drift;
pub mod equation;
pub mod health;
pub mod hierarchy;
pub mod integrity;

pub use drift::{AccountDrift, BalanceComparison, DriftDetector, DriftReport};
pub use equation::EquationCheck;
pub use health::{HealthInputs, HealthReport, HealthStatus};
pub use hierarchy::{
    HierarchyIssue, HierarchyIssueKind, HierarchyNode, HierarchyValidator, code_prefix,
    rollup_by_prefix,
};
pub use integrity::{
    ConsistencyProblem, DoublePosting, EntryTotalsRecord, InconsistentEntry, IntegrityChecker,
    SourceEntryRecord,
};

mod benchmark;
