//! # Tag Graph
//!
//! Read-only forest built from a snapshot of every tag in the catalog. The parent map
//! and children index are computed once in [`TagGraph::build`], so ancestor walks cost
//! O(depth) and subtree walks O(subtree size). A graph is never mutated; when the tag
//! list changes a new graph is built from the new snapshot.

use super::tag::{Tag, TagId};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HierarchyDefect {
	DuplicateTag(TagId),
	DanglingParent { tag_id: TagId, parent_id: TagId },
	Cycle { tag_id: TagId },
}

impl fmt::Display for HierarchyDefect {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::DuplicateTag(id) => write!(f, "tag '{id}' appears more than once"),
			Self::DanglingParent { tag_id, parent_id } => {
				write!(f, "tag '{tag_id}' references missing parent '{parent_id}'")
			}
			Self::Cycle { tag_id } => write!(f, "tag '{tag_id}' is part of a parent cycle"),
		}
	}
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
	#[error("malformed tag hierarchy: {0}")]
	MalformedHierarchy(HierarchyDefect),
}

#[derive(Debug, Clone)]
pub struct TagGraph {
	tags: HashMap<TagId, Tag>,
	/// Children of each tag, sorted by name then id
	children: HashMap<TagId, Vec<TagId>>,
	roots: Vec<TagId>,
}

impl TagGraph {
	/// Build the forest, rejecting duplicate ids, dangling parents and cycles.
	pub fn build(tags: impl IntoIterator<Item = Tag>) -> Result<Self, GraphError> {
		let mut by_id = HashMap::new();
		for tag in tags {
			if by_id.contains_key(&tag.id) {
				return Err(GraphError::MalformedHierarchy(HierarchyDefect::DuplicateTag(
					tag.id,
				)));
			}
			by_id.insert(tag.id.clone(), tag);
		}

		let mut children: HashMap<TagId, Vec<TagId>> = HashMap::new();
		let mut roots = Vec::new();
		for tag in by_id.values() {
			match &tag.parent_id {
				Some(parent_id) if !by_id.contains_key(parent_id) => {
					return Err(GraphError::MalformedHierarchy(
						HierarchyDefect::DanglingParent {
							tag_id: tag.id.clone(),
							parent_id: parent_id.clone(),
						},
					));
				}
				Some(parent_id) => children
					.entry(parent_id.clone())
					.or_default()
					.push(tag.id.clone()),
				None => roots.push(tag.id.clone()),
			}
		}

		Self::detect_cycles(&by_id)?;

		let order = |a: &TagId, b: &TagId| {
			let (left, right) = (&by_id[a], &by_id[b]);
			left.name.cmp(&right.name).then_with(|| left.id.cmp(&right.id))
		};
		roots.sort_by(order);
		for siblings in children.values_mut() {
			siblings.sort_by(order);
		}

		Ok(Self {
			tags: by_id,
			children,
			roots,
		})
	}

	/// Walks each parent chain once. Nodes proven to reach a root are remembered so the
	/// whole check stays linear; a single walk can never exceed the tag count.
	fn detect_cycles(tags: &HashMap<TagId, Tag>) -> Result<(), GraphError> {
		let mut settled: HashSet<&TagId> = HashSet::with_capacity(tags.len());

		for start in tags.keys() {
			let mut path: HashSet<&TagId> = HashSet::new();
			let mut cursor = Some(start);

			while let Some(id) = cursor {
				if settled.contains(id) {
					break;
				}
				if !path.insert(id) || path.len() > tags.len() {
					return Err(GraphError::MalformedHierarchy(HierarchyDefect::Cycle {
						tag_id: id.clone(),
					}));
				}
				cursor = tags[id].parent_id.as_ref();
			}

			settled.extend(path);
		}

		Ok(())
	}

	pub fn len(&self) -> usize {
		self.tags.len()
	}

	pub fn is_empty(&self) -> bool {
		self.tags.is_empty()
	}

	pub fn contains(&self, id: &TagId) -> bool {
		self.tags.contains_key(id)
	}

	pub fn get(&self, id: &TagId) -> Option<&Tag> {
		self.tags.get(id)
	}

	pub fn roots(&self) -> impl Iterator<Item = &Tag> {
		self.roots.iter().map(|id| &self.tags[id])
	}

	/// Direct children, sorted by name.
	pub fn children_of(&self, id: &TagId) -> Vec<&Tag> {
		self.children
			.get(id)
			.map(|ids| ids.iter().map(|child| &self.tags[child]).collect())
			.unwrap_or_default()
	}

	/// Ancestors ordered nearest first. Empty for roots and unknown tags.
	pub fn ancestors_of(&self, id: &TagId) -> Vec<TagId> {
		let mut ancestors = Vec::new();
		let mut cursor = self.tags.get(id).and_then(|tag| tag.parent_id.as_ref());

		while let Some(parent_id) = cursor {
			ancestors.push(parent_id.clone());
			cursor = self.tags[parent_id].parent_id.as_ref();
		}

		ancestors
	}

	/// Every tag below `id` at any depth, excluding `id` itself.
	pub fn descendants_of(&self, id: &TagId) -> BTreeSet<TagId> {
		let mut descendants = BTreeSet::new();
		let mut queue: VecDeque<&TagId> = self
			.children
			.get(id)
			.map(|ids| ids.iter().collect())
			.unwrap_or_default();

		while let Some(next) = queue.pop_front() {
			if descendants.insert(next.clone()) {
				if let Some(grandchildren) = self.children.get(next) {
					queue.extend(grandchildren.iter());
				}
			}
		}

		descendants
	}

	/// Number of ancestors above the tag; roots sit at depth 0.
	pub fn depth_of(&self, id: &TagId) -> Option<usize> {
		self.contains(id).then(|| self.ancestors_of(id).len())
	}

	/// Display name, falling back to the raw id for tags missing from this snapshot.
	pub fn name_of(&self, id: &TagId) -> String {
		self.tags
			.get(id)
			.map(|tag| tag.name.clone())
			.unwrap_or_else(|| id.to_string())
	}

	/// Display names of a selection, shallowest tags first.
	pub fn names_of<'a>(&self, ids: impl IntoIterator<Item = &'a TagId>) -> Vec<String> {
		self.sort_shallow_first(ids)
			.iter()
			.map(|id| self.name_of(id))
			.collect()
	}

	/// Orders ids by depth then id. Tags unknown to the graph sort last.
	pub fn sort_shallow_first<'a>(&self, ids: impl IntoIterator<Item = &'a TagId>) -> Vec<TagId> {
		let mut ordered: Vec<TagId> = ids.into_iter().cloned().collect();
		ordered.sort_by_cached_key(|id| (self.depth_of(id).unwrap_or(usize::MAX), id.clone()));
		ordered
	}

	/// Pre-order walk of the whole forest as `(depth, tag)` pairs.
	pub fn depth_first(&self) -> Vec<(usize, &Tag)> {
		let mut walk = Vec::with_capacity(self.tags.len());
		let mut stack: Vec<(usize, &TagId)> = self.roots.iter().rev().map(|id| (0, id)).collect();

		while let Some((depth, id)) = stack.pop() {
			walk.push((depth, &self.tags[id]));
			if let Some(children) = self.children.get(id) {
				stack.extend(children.iter().rev().map(|child| (depth + 1, child)));
			}
		}

		walk
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;

	fn sports() -> Vec<Tag> {
		vec![
			Tag::root("sport", "Sport"),
			Tag::child("ball", "Ball games", "sport"),
			Tag::child("football", "Football", "ball"),
			Tag::child("tennis", "Tennis", "ball"),
			Tag::child("water", "Water", "sport"),
			Tag::root("access", "Accessibility"),
		]
	}

	fn ids(raw: &[&str]) -> BTreeSet<TagId> {
		raw.iter().copied().map(TagId::from).collect()
	}

	#[test]
	fn ancestors_are_nearest_first() {
		let graph = TagGraph::build(sports()).unwrap();

		assert_eq!(
			graph.ancestors_of(&"football".into()),
			vec![TagId::from("ball"), TagId::from("sport")]
		);
		assert!(graph.ancestors_of(&"sport".into()).is_empty());
		assert!(graph.ancestors_of(&"unknown".into()).is_empty());
	}

	#[test]
	fn descendants_cover_the_whole_subtree() {
		let graph = TagGraph::build(sports()).unwrap();

		assert_eq!(
			graph.descendants_of(&"sport".into()),
			ids(&["ball", "football", "tennis", "water"])
		);
		assert!(graph.descendants_of(&"tennis".into()).is_empty());
	}

	#[test]
	fn children_and_roots_are_sorted_by_name() {
		let graph = TagGraph::build(sports()).unwrap();

		let roots: Vec<&str> = graph.roots().map(|tag| tag.name.as_str()).collect();
		assert_eq!(roots, vec!["Accessibility", "Sport"]);

		let children: Vec<&str> = graph
			.children_of(&"ball".into())
			.into_iter()
			.map(|tag| tag.name.as_str())
			.collect();
		assert_eq!(children, vec!["Football", "Tennis"]);
	}

	#[test]
	fn depth_first_walk_visits_parents_before_children() {
		let graph = TagGraph::build(sports()).unwrap();

		let walk: Vec<(usize, &str)> = graph
			.depth_first()
			.into_iter()
			.map(|(depth, tag)| (depth, tag.id.as_str()))
			.collect();

		assert_eq!(
			walk,
			vec![
				(0, "access"),
				(0, "sport"),
				(1, "ball"),
				(2, "football"),
				(2, "tennis"),
				(1, "water"),
			]
		);
	}

	#[test]
	fn rejects_dangling_parent() {
		let err = TagGraph::build(vec![Tag::child("orphan", "Orphan", "gone")]).unwrap_err();

		assert_eq!(
			err,
			GraphError::MalformedHierarchy(HierarchyDefect::DanglingParent {
				tag_id: "orphan".into(),
				parent_id: "gone".into(),
			})
		);
	}

	#[test]
	fn rejects_cycles() {
		let looped = vec![
			Tag::root("root", "Root"),
			Tag::child("a", "A", "c"),
			Tag::child("b", "B", "a"),
			Tag::child("c", "C", "b"),
		];
		assert!(matches!(
			TagGraph::build(looped),
			Err(GraphError::MalformedHierarchy(HierarchyDefect::Cycle { .. }))
		));

		let self_parent = vec![Tag::child("a", "A", "a")];
		assert!(matches!(
			TagGraph::build(self_parent),
			Err(GraphError::MalformedHierarchy(HierarchyDefect::Cycle { .. }))
		));
	}

	#[test]
	fn rejects_duplicate_ids() {
		let err = TagGraph::build(vec![Tag::root("a", "A"), Tag::root("a", "Again")]).unwrap_err();

		assert_eq!(
			err,
			GraphError::MalformedHierarchy(HierarchyDefect::DuplicateTag("a".into()))
		);
	}

	#[test]
	fn names_fall_back_to_ids_for_unknown_tags() {
		let graph = TagGraph::build(sports()).unwrap();

		assert_eq!(
			graph.names_of(&ids(&["football", "sport", "ghost"])),
			vec!["Sport", "Football", "ghost"]
		);
	}
}
