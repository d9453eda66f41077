//! Audit trail records
//!
//! Every committed tag change leaves exactly one [`AuditEntry`]. Entries are ordered
//! by their [`SequenceToken`], which doubles as the keyset pagination cursor.

use super::entry::EntityId;
use super::tag::TagId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Action kind recorded for assignment changes.
pub const TAGS_UPDATE_ACTION: &str = "tags.update";

/// The operator a change is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
	pub id: String,
	/// Human readable label, usually the operator's email
	pub label: String,
}

impl Actor {
	pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			label: label.into(),
		}
	}
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid sequence token: {0}")]
pub struct InvalidSequenceToken(pub String);

/// Commit time in microseconds plus a tiebreaker for commits landing in the same
/// microsecond. The string form is fixed width hex, so lexicographic order matches
/// numeric order and the token can be compared directly in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SequenceToken {
	micros: u64,
	tiebreak: u32,
}

impl SequenceToken {
	pub fn new(micros: u64, tiebreak: u32) -> Self {
		Self { micros, tiebreak }
	}

	/// Next token strictly after `previous`, anchored to `now` when the clock is ahead.
	pub fn next(previous: Option<&Self>, now: DateTime<Utc>) -> Self {
		let now_micros = Self::micros_of(now);

		match previous {
			Some(prev) if prev.micros >= now_micros => match prev.tiebreak.checked_add(1) {
				Some(tiebreak) => Self::new(prev.micros, tiebreak),
				None => Self::new(prev.micros + 1, 0),
			},
			_ => Self::new(now_micros, 0),
		}
	}

	/// Smallest token that can be issued at `at`
	pub fn lowest_at(at: DateTime<Utc>) -> Self {
		Self::new(Self::micros_of(at), 0)
	}

	/// Largest token that can be issued at `at`
	pub fn highest_at(at: DateTime<Utc>) -> Self {
		Self::new(Self::micros_of(at), u32::MAX)
	}

	/// Commit time the token was issued for
	pub fn timestamp(&self) -> DateTime<Utc> {
		let secs = i64::try_from(self.micros / 1_000_000).unwrap_or(i64::MAX);
		let nanos = (self.micros % 1_000_000) as u32 * 1_000;

		DateTime::from_timestamp(secs, nanos).unwrap_or_default()
	}

	fn micros_of(at: DateTime<Utc>) -> u64 {
		u64::try_from(at.timestamp_micros()).unwrap_or_default()
	}

	pub fn micros(&self) -> u64 {
		self.micros
	}

	pub fn tiebreak(&self) -> u32 {
		self.tiebreak
	}
}

impl fmt::Display for SequenceToken {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{:016x}-{:08x}", self.micros, self.tiebreak)
	}
}

impl FromStr for SequenceToken {
	type Err = InvalidSequenceToken;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		let invalid = || InvalidSequenceToken(raw.to_owned());

		let (micros, tiebreak) = raw.split_once('-').ok_or_else(invalid)?;
		if micros.len() != 16 || tiebreak.len() != 8 {
			return Err(invalid());
		}

		Ok(Self {
			micros: u64::from_str_radix(micros, 16).map_err(|_| invalid())?,
			tiebreak: u32::from_str_radix(tiebreak, 16).map_err(|_| invalid())?,
		})
	}
}

impl Serialize for SequenceToken {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.collect_str(self)
	}
}

impl<'de> Deserialize<'de> for SequenceToken {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let raw = String::deserialize(deserializer)?;
		raw.parse().map_err(serde::de::Error::custom)
	}
}

/// Immutable record of one committed assignment change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
	pub id: Uuid,
	pub entity_id: EntityId,
	pub action: String,
	/// Added tags, ancestors before descendants
	pub added_tag_ids: Vec<TagId>,
	/// Removed tags, descendants before ancestors
	pub removed_tag_ids: Vec<TagId>,
	pub actor: Actor,
	pub timestamp: DateTime<Utc>,
	pub sequence_token: SequenceToken,
	pub summary: String,
}

/// Filters for the audit read path. All bounds are optional and combine with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFilter {
	pub entity_id: Option<EntityId>,
	/// Inclusive lower bound on the entry timestamp
	pub date_from: Option<DateTime<Utc>>,
	/// Inclusive upper bound on the entry timestamp
	pub date_to: Option<DateTime<Utc>>,
	/// Case-insensitive match against the rendered summary
	pub text_contains: Option<String>,
	/// Restricts results to these entities; set from the caller's access scope
	#[serde(skip)]
	pub within: Option<Vec<EntityId>>,
}

impl AuditFilter {
	pub fn for_entity(entity_id: impl Into<EntityId>) -> Self {
		Self {
			entity_id: Some(entity_id.into()),
			..Default::default()
		}
	}

	pub fn text(mut self, needle: impl Into<String>) -> Self {
		self.text_contains = Some(needle.into());
		self
	}

	pub fn between(mut self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
		self.date_from = from;
		self.date_to = to;
		self
	}
}

/// One page of the audit log, newest entry first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditPage {
	pub entries: Vec<AuditEntry>,
	/// Cursor for the following page; `None` on the last page
	pub next_cursor: Option<SequenceToken>,
}

impl AuditPage {
	pub fn has_more(&self) -> bool {
		self.next_cursor.is_some()
	}
}

/// Render the searchable one-line summary of a change.
pub fn render_summary(
	entity_name: &str,
	entity_id: &EntityId,
	added: &[String],
	removed: &[String],
	actor: &Actor,
) -> String {
	let mut parts = Vec::with_capacity(2);
	if !added.is_empty() {
		parts.push(format!("added {}", added.join(", ")));
	}
	if !removed.is_empty() {
		parts.push(format!("removed {}", removed.join(", ")));
	}

	format!(
		"{TAGS_UPDATE_ACTION} {entity_name} ({entity_id}): {} by {} ({})",
		parts.join("; "),
		actor.label,
		actor.id
	)
}
