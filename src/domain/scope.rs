//! Operator access scope
//!
//! Authorization happens elsewhere; this is only the resolved grant: either every
//! entity or an explicit set of entity ids. Every request is filtered through it
//! before any tag or audit data is touched.

use super::entry::EntityId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScopeError {
	#[error("entity '{0}' is outside the caller's access scope")]
	OutOfScope(EntityId),
	#[error("access scope cannot be parsed from an empty string")]
	Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessScope {
	All,
	Entities(BTreeSet<EntityId>),
}

impl AccessScope {
	pub fn entities<I, E>(ids: I) -> Self
	where
		I: IntoIterator<Item = E>,
		E: Into<EntityId>,
	{
		Self::Entities(ids.into_iter().map(Into::into).collect())
	}

	pub fn permits(&self, entity_id: &EntityId) -> bool {
		match self {
			Self::All => true,
			Self::Entities(granted) => granted.contains(entity_id),
		}
	}

	pub fn check(&self, entity_id: &EntityId) -> Result<(), ScopeError> {
		if self.permits(entity_id) {
			Ok(())
		} else {
			Err(ScopeError::OutOfScope(entity_id.clone()))
		}
	}

	/// The granted set when the scope is restricted, `None` for unrestricted callers.
	pub fn restriction(&self) -> Option<&BTreeSet<EntityId>> {
		match self {
			Self::All => None,
			Self::Entities(granted) => Some(granted),
		}
	}

	/// True when the caller may not touch anything at all.
	pub fn is_empty(&self) -> bool {
		matches!(self, Self::Entities(granted) if granted.is_empty())
	}
}

/// Parses `all` / `*` or a comma separated list of entity ids.
impl FromStr for AccessScope {
	type Err = ScopeError;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		let raw = raw.trim();
		if raw.is_empty() {
			return Err(ScopeError::Empty);
		}
		if raw.eq_ignore_ascii_case("all") || raw == "*" {
			return Ok(Self::All);
		}

		Ok(Self::entities(
			raw.split(',')
				.map(str::trim)
				.filter(|id| !id.is_empty()),
		))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn restricted_scope_only_permits_granted_entities() {
		let scope = AccessScope::entities(["stadium", "pool"]);

		assert!(scope.permits(&"pool".into()));
		assert_eq!(
			scope.check(&"gym".into()),
			Err(ScopeError::OutOfScope("gym".into()))
		);
		assert!(AccessScope::All.check(&"gym".into()).is_ok());
	}

	#[test]
	fn parses_cli_scopes() {
		assert_eq!("all".parse::<AccessScope>().unwrap(), AccessScope::All);
		assert_eq!("*".parse::<AccessScope>().unwrap(), AccessScope::All);
		assert_eq!(
			" a, b ,,c".parse::<AccessScope>().unwrap(),
			AccessScope::entities(["a", "b", "c"])
		);
		assert_eq!("".parse::<AccessScope>(), Err(ScopeError::Empty));
	}

	#[test]
	fn empty_grant_is_empty() {
		assert!(AccessScope::entities(Vec::<String>::new()).is_empty());
		assert!(!AccessScope::All.is_empty());
	}
}
