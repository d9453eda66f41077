//! Tag assignment operations

pub mod apply;
pub mod manager;
pub mod reconcile;

pub use apply::{ApplyError, ChangeApplier, CommitProbe, NoopProbe};
pub use manager::{Snapshot, TagAssignmentManager, TagUpdateOutcome, TaggingError};
pub use reconcile::{ReconcileError, ReconcilePolicy, Rejection, SelectionDelta, SelectionReconciler};
