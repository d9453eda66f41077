//! SeaORM entities

pub mod audit_log;
pub mod catalog_entry;
pub mod tag;

pub use audit_log::Entity as AuditLog;
pub use catalog_entry::Entity as CatalogEntry;
pub use tag::Entity as Tag;
