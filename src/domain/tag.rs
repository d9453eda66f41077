//! Tag records and the reference encodings they arrive in
//!
//! Catalog entries written by older clients store their tags in three shapes: an
//! opaque reference path (`"tags/<id>"`), a bare id string, or a handle object
//! carrying an `id` field. Everything past the storage boundary only ever sees
//! [`TagId`], so [`TagRef::decode`] is the single place those shapes are understood.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Bare identifier of a tag, the canonical internal representation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagId(String);

impl TagId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub fn into_inner(self) -> String {
		self.0
	}
}

impl fmt::Display for TagId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for TagId {
	fn from(id: &str) -> Self {
		Self(id.to_owned())
	}
}

impl From<String> for TagId {
	fn from(id: String) -> Self {
		Self(id)
	}
}

/// A node of the classification hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
	pub id: TagId,
	pub name: String,
	#[serde(default)]
	pub parent_id: Option<TagId>,
}

impl Tag {
	/// Create a tag without a parent
	pub fn root(id: impl Into<TagId>, name: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			name: name.into(),
			parent_id: None,
		}
	}

	/// Create a tag nested under `parent`
	pub fn child(
		id: impl Into<TagId>,
		name: impl Into<String>,
		parent: impl Into<TagId>,
	) -> Self {
		Self {
			id: id.into(),
			name: name.into(),
			parent_id: Some(parent.into()),
		}
	}

	pub fn is_root(&self) -> bool {
		self.parent_id.is_none()
	}
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TagRefError {
	#[error("unrecognized tag reference: {0}")]
	Unrecognized(String),
	#[error("tag reference resolves to an empty id: {0}")]
	EmptyId(String),
	#[error("tag references must be stored as a list, found: {0}")]
	NotAList(String),
}

/// One stored tag reference, in whichever encoding it was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagRef {
	/// Reference path such as `tags/abc` or `/catalog/tags/abc`
	Path(String),
	/// Plain id string
	Id(String),
	/// Object carrying the id, e.g. `{"id": "abc", "path": "tags/abc"}`
	Handle(String),
}

impl TagRef {
	/// Decode a single stored value into a reference.
	pub fn decode(value: &Value) -> Result<Self, TagRefError> {
		match value {
			Value::String(raw) if raw.contains('/') => Ok(Self::Path(raw.clone())),
			Value::String(raw) => Ok(Self::Id(raw.clone())),
			Value::Object(fields) => match (fields.get("id"), fields.get("path")) {
				(Some(Value::String(id)), _) => Ok(Self::Handle(id.clone())),
				(None, Some(Value::String(path))) => Ok(Self::Path(path.clone())),
				_ => Err(TagRefError::Unrecognized(value.to_string())),
			},
			Value::Number(number) => Ok(Self::Id(number.to_string())),
			_ => Err(TagRefError::Unrecognized(value.to_string())),
		}
	}

	/// Resolve to the bare id, taking the last segment of reference paths.
	pub fn into_id(self) -> Result<TagId, TagRefError> {
		let (raw, id) = match self {
			Self::Path(path) => {
				let id = path.rsplit('/').next().unwrap_or_default().trim().to_owned();
				(path, id)
			}
			Self::Id(id) | Self::Handle(id) => (id.clone(), id.trim().to_owned()),
		};

		if id.is_empty() {
			return Err(TagRefError::EmptyId(raw));
		}

		Ok(TagId(id))
	}
}

/// Decode the tag list stored on a catalog entry. `null` is an empty assignment.
pub fn decode_tag_refs(value: &Value) -> Result<BTreeSet<TagId>, TagRefError> {
	match value {
		Value::Null => Ok(BTreeSet::new()),
		Value::Array(items) => items
			.iter()
			.map(|item| TagRef::decode(item).and_then(TagRef::into_id))
			.collect(),
		other => Err(TagRefError::NotAList(other.to_string())),
	}
}

/// Encode an assignment for storage. Writes always use bare ids.
pub fn encode_tag_ids<'a>(ids: impl IntoIterator<Item = &'a TagId>) -> Value {
	Value::Array(
		ids.into_iter()
			.map(|id| Value::String(id.as_str().to_owned()))
			.collect(),
	)
}
