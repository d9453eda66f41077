//! Domain models
//!
//! Pure types shared by the tagging operations. Nothing in here touches storage.

pub mod audit;
pub mod entry;
pub mod graph;
pub mod scope;
pub mod tag;

pub use audit::{Actor, AuditEntry, AuditFilter, AuditPage, SequenceToken};
pub use entry::{Assignment, EntityId, EntrySummary};
pub use graph::{GraphError, HierarchyDefect, TagGraph};
pub use scope::{AccessScope, ScopeError};
pub use tag::{Tag, TagId, TagRef, TagRefError};
