//! Catalog entries and the tag assignment attached to each of them

use super::tag::TagId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Identifier of a catalog entry (the entity tags are attached to).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for EntityId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for EntityId {
	fn from(id: &str) -> Self {
		Self(id.to_owned())
	}
}

impl From<String> for EntityId {
	fn from(id: String) -> Self {
		Self(id)
	}
}

/// Tags currently attached to one entity, as loaded from storage.
///
/// `revision` is the storage revision the set was read at; committing against a
/// different revision is a concurrent modification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
	pub entity_id: EntityId,
	pub entity_name: String,
	pub tag_ids: BTreeSet<TagId>,
	pub revision: i64,
}

/// Row of the scoped catalog listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySummary {
	pub id: EntityId,
	pub name: String,
	pub address: Option<String>,
	pub tag_count: usize,
}
