//! Store-wide maintenance passes.
//!
//! Each pass runs under a single exclusive transaction and is report-only
//! unless called with `apply = true`.

pub mod duplicates;
pub mod future_logs;
pub mod reconcile;

pub use duplicates::{find_duplicates, repair_duplicates, DuplicateGroup, DuplicateReport};
pub use future_logs::{purge_future_logs, FuturePurgeReport};
pub use reconcile::{
    corrected_date, DateUpdate, LogReconciler, MergeDetail, ReconcileOp, ReconciliationPlan,
    ReconciliationReport, DATE_BASIS_KEY,
};
