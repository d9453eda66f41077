//! Hierarchical tag assignment for catalog entries, with an append-only audit log.
//!
//! Tags form a forest. An entry may only carry a tag if it also carries every ancestor
//! of that tag; [`ops::tags::SelectionReconciler`] turns an editor's raw selection into
//! a delta that respects this, and [`ops::tags::ChangeApplier`] commits the delta
//! together with its audit entry.

pub mod config;
pub mod domain;
pub mod infra;
pub mod logging;
pub mod ops;

pub use config::AppConfig;
pub use infra::db::Database;
pub use ops::tags::{TagAssignmentManager, TaggingError};
