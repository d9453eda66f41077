//! Selection reconciliation
//!
//! Turns the raw set of checked tags coming from an editor into the delta that has to
//! be committed, enforcing that no assigned tag is ever left without its ancestors.
//!
//! Unchecking a tag first removes every assigned tag beneath it, whether or not the
//! editor still shows those descendants as checked. The remaining checked tags are then
//! visited shallowest first, so by the time a tag is judged every one of its ancestors
//! has already been accepted or not.

use crate::domain::{TagGraph, TagId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReconcileError {
	/// `tag_id` was selected but its ancestor `missing_parent_id` is neither assigned
	/// nor selected (or does not exist in the catalog any more)
	#[error("tag '{tag_id}' requires ancestor '{missing_parent_id}' which is not selected")]
	MissingAncestor {
		tag_id: TagId,
		missing_parent_id: TagId,
	},
	/// `tag_id` is not assigned, nor selected, while its assigned descendant
	/// `blocking_child_id` stays selected
	#[error("tag '{tag_id}' is not assigned but its descendant '{blocking_child_id}' stays selected")]
	DanglingDescendant {
		tag_id: TagId,
		blocking_child_id: TagId,
	},
}

/// What to do with selections that break the hierarchy.
#[derive(
	Debug,
	Clone,
	Copy,
	Default,
	PartialEq,
	Eq,
	Serialize,
	Deserialize,
	strum::Display,
	strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReconcilePolicy {
	/// Reject the whole selection on the first violation
	#[default]
	Strict,
	/// Drop offending tags, report them, and keep going
	Lenient,
}

/// A tag dropped by the lenient policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
	pub tag_id: TagId,
	pub reason: ReconcileError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionDelta {
	pub to_add: BTreeSet<TagId>,
	pub to_remove: BTreeSet<TagId>,
	/// Only ever populated under [`ReconcilePolicy::Lenient`]
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub rejected: Vec<Rejection>,
}

impl SelectionDelta {
	/// True when committing would change nothing.
	pub fn is_empty(&self) -> bool {
		self.to_add.is_empty() && self.to_remove.is_empty()
	}

	/// `(current − to_remove) ∪ to_add`
	pub fn apply_to(&self, current: &BTreeSet<TagId>) -> BTreeSet<TagId> {
		current
			.difference(&self.to_remove)
			.chain(self.to_add.iter())
			.cloned()
			.collect()
	}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SelectionReconciler {
	policy: ReconcilePolicy,
}

impl SelectionReconciler {
	pub fn new(policy: ReconcilePolicy) -> Self {
		Self { policy }
	}

	pub fn policy(&self) -> ReconcilePolicy {
		self.policy
	}

	/// Compute the validated delta between `current` and `checked`.
	///
	/// Tags missing from `graph` are accepted only when they are already assigned;
	/// selecting one that is not yet assigned reports it as its own missing ancestor.
	pub fn reconcile(
		&self,
		graph: &TagGraph,
		current: &BTreeSet<TagId>,
		checked: &BTreeSet<TagId>,
	) -> Result<SelectionDelta, ReconcileError> {
		if current == checked {
			return Ok(SelectionDelta::default());
		}

		let removed = Self::removal_closure(graph, current, checked);
		let mut accepted: BTreeSet<TagId> = BTreeSet::new();
		let mut rejected = Vec::new();

		for tag_id in graph.sort_shallow_first(checked) {
			if removed.contains(&tag_id) {
				continue;
			}

			match Self::verdict(graph, &tag_id, current, &accepted) {
				Ok(()) => {
					accepted.insert(tag_id);
				}
				Err(reason) => match self.policy {
					ReconcilePolicy::Strict => {
						debug!(%reason, "Rejecting tag selection");
						return Err(reason);
					}
					ReconcilePolicy::Lenient => {
						warn!(%tag_id, %reason, "Dropping tag from selection");
						rejected.push(Rejection { tag_id, reason });
					}
				},
			}
		}

		let delta = SelectionDelta {
			to_add: accepted.difference(current).cloned().collect(),
			to_remove: current.difference(&accepted).cloned().collect(),
			rejected,
		};

		debug!(
			added = delta.to_add.len(),
			removed = delta.to_remove.len(),
			rejected = delta.rejected.len(),
			"Reconciled tag selection"
		);

		Ok(delta)
	}

	/// Unchecked assigned tags together with every assigned tag below them
	fn removal_closure(
		graph: &TagGraph,
		current: &BTreeSet<TagId>,
		checked: &BTreeSet<TagId>,
	) -> BTreeSet<TagId> {
		let mut removed = BTreeSet::new();

		for tag_id in current.difference(checked) {
			removed.extend(
				graph
					.descendants_of(tag_id)
					.into_iter()
					.filter(|descendant| current.contains(descendant)),
			);
			removed.insert(tag_id.clone());
		}

		removed
	}

	fn verdict(
		graph: &TagGraph,
		tag_id: &TagId,
		current: &BTreeSet<TagId>,
		accepted: &BTreeSet<TagId>,
	) -> Result<(), ReconcileError> {
		if !graph.contains(tag_id) {
			return if current.contains(tag_id) {
				Ok(())
			} else {
				Err(ReconcileError::MissingAncestor {
					tag_id: tag_id.clone(),
					missing_parent_id: tag_id.clone(),
				})
			};
		}

		for ancestor in graph.ancestors_of(tag_id) {
			if accepted.contains(&ancestor) {
				continue;
			}

			// Removed ancestors already took their assigned branch with them, so an
			// assigned tag only gets here when its ancestor was never assigned.
			return Err(if current.contains(tag_id) {
				ReconcileError::DanglingDescendant {
					tag_id: ancestor,
					blocking_child_id: tag_id.clone(),
				}
			} else {
				ReconcileError::MissingAncestor {
					tag_id: tag_id.clone(),
					missing_parent_id: ancestor,
				}
			});
		}

		Ok(())
	}
}
