//! Reconcile and commit through the manager against a real database

mod helpers;

use helpers::*;
use pretty_assertions::assert_eq;
use sd_catalog_tags::domain::{AccessScope, AuditFilter, Tag, TagId};
use sd_catalog_tags::infra::db::entities::catalog_entry;
use sd_catalog_tags::infra::db::{CatalogSeed, SeedEntry};
use sd_catalog_tags::ops::tags::{
	ApplyError, ChangeApplier, ReconcileError, ReconcilePolicy, SelectionReconciler,
};
use sd_catalog_tags::TaggingError;
use sea_orm::EntityTrait;
use serde_json::json;

#[tokio::test]
async fn test_legacy_references_are_decoded_and_rewritten_as_ids() {
	let catalog = sports_catalog().await;

	let assignment = catalog
		.manager
		.get_assignment(&AccessScope::All, &entity("pool"))
		.await
		.unwrap();
	assert_eq!(assignment.tag_ids, ids(&["sport", "water"]));
	assert_eq!(assignment.revision, 0);

	catalog
		.manager
		.update_tags(
			&AccessScope::All,
			&entity("pool"),
			&ids(&["sport", "water", "swimming"]),
			&operator(),
		)
		.await
		.unwrap();

	let row = catalog_entry::Entity::find_by_id("pool")
		.one(catalog.db.conn())
		.await
		.unwrap()
		.unwrap();
	assert_eq!(row.tags, json!(["sport", "swimming", "water"]));
	assert_eq!(row.revision, 1);
}

#[tokio::test]
async fn test_update_commits_assignment_and_one_audit_entry() {
	let catalog = sports_catalog().await;

	let outcome = catalog
		.manager
		.update_tags(
			&AccessScope::All,
			&entity("gym"),
			&ids(&["indoor", "sport", "ball"]),
			&operator(),
		)
		.await
		.unwrap();

	assert!(outcome.changed());
	assert_eq!(outcome.delta.to_add, ids(&["ball", "indoor", "sport"]));

	let entry = outcome.entry.unwrap();
	assert_eq!(entry.entity_id, entity("gym"));
	assert_eq!(entry.actor, operator());
	// Ancestors are listed before their descendants
	let added: Vec<&str> = entry.added_tag_ids.iter().map(|id| id.as_str()).collect();
	assert_eq!(added, vec!["indoor", "sport", "ball"]);
	assert_eq!(
		entry.summary,
		"tags.update Gym (gym): added Indoor, Sport, Ball games by ops@example.com (u-1)"
	);

	let history = catalog
		.manager
		.history(&AccessScope::All, AuditFilter::for_entity("gym"), None, None)
		.await
		.unwrap();
	assert_eq!(history.entries, vec![entry]);

	let assignment = catalog
		.manager
		.get_assignment(&AccessScope::All, &entity("gym"))
		.await
		.unwrap();
	assert_eq!(assignment.tag_ids, ids(&["ball", "indoor", "sport"]));
	assert_eq!(assignment.revision, 1);
}

#[tokio::test]
async fn test_removing_a_branch_records_descendants_first() {
	let catalog = sports_catalog().await;

	let outcome = catalog
		.manager
		.update_tags(&AccessScope::All, &entity("stadium"), &ids(&["outdoor"]), &operator())
		.await
		.unwrap();

	let removed: Vec<String> = outcome
		.entry
		.unwrap()
		.removed_tag_ids
		.into_iter()
		.map(|id| id.into_inner())
		.collect();
	assert_eq!(removed, vec!["football", "ball", "sport"]);
}

#[tokio::test]
async fn test_unchecking_a_parent_drops_the_still_checked_branch() {
	let catalog = sports_catalog().await;

	let outcome = catalog
		.manager
		.update_tags(
			&AccessScope::All,
			&entity("stadium"),
			&ids(&["ball", "football", "outdoor"]),
			&operator(),
		)
		.await
		.unwrap();

	assert_eq!(outcome.delta.to_remove, ids(&["ball", "football", "sport"]));
	assert!(outcome.delta.to_add.is_empty());
	assert!(outcome.warnings.is_empty());

	let assignment = catalog
		.manager
		.get_assignment(&AccessScope::All, &entity("stadium"))
		.await
		.unwrap();
	assert_eq!(assignment.tag_ids, ids(&["outdoor"]));
}

#[tokio::test]
async fn test_repeating_an_update_is_a_no_op() {
	let catalog = sports_catalog().await;
	let checked = ids(&["sport", "water", "swimming"]);

	let first = catalog
		.manager
		.update_tags(&AccessScope::All, &entity("pool"), &checked, &operator())
		.await
		.unwrap();
	let second = catalog
		.manager
		.update_tags(&AccessScope::All, &entity("pool"), &checked, &operator())
		.await
		.unwrap();

	assert!(first.changed());
	assert!(!second.changed());
	assert!(second.delta.is_empty());

	let history = catalog
		.manager
		.history(&AccessScope::All, AuditFilter::for_entity("pool"), None, None)
		.await
		.unwrap();
	assert_eq!(history.entries.len(), 1);
}

#[tokio::test]
async fn test_every_committed_assignment_keeps_its_ancestors() {
	let catalog = sports_catalog().await;
	let selections = [
		ids(&["sport", "ball", "football"]),
		ids(&["sport", "water"]),
		ids(&["indoor"]),
		ids(&["sport", "ball", "water", "swimming", "outdoor"]),
		ids(&[]),
	];

	for checked in selections {
		catalog
			.manager
			.update_tags(&AccessScope::All, &entity("gym"), &checked, &operator())
			.await
			.unwrap();

		let snapshot = catalog
			.manager
			.load_snapshot(&AccessScope::All, &entity("gym"))
			.await
			.unwrap();
		assert_eq!(snapshot.assignment.tag_ids, checked);
		for tag in &snapshot.assignment.tag_ids {
			for ancestor in snapshot.graph.ancestors_of(tag) {
				assert!(snapshot.assignment.tag_ids.contains(&ancestor));
			}
		}
	}
}

#[tokio::test]
async fn test_missing_ancestor_rejects_the_whole_selection() {
	let seed = CatalogSeed {
		tags: vec![Tag::root("1", "Root"), Tag::child("2", "Child", "1")],
		entries: vec![SeedEntry {
			id: "e".into(),
			name: "Entry".into(),
			address: None,
			tags: json!([]),
		}],
	};
	let catalog = catalog_with(seed, test_config()).await;

	let err = catalog
		.manager
		.update_tags(&AccessScope::All, &entity("e"), &ids(&["2"]), &operator())
		.await
		.unwrap_err();
	assert!(matches!(
		err,
		TaggingError::Reconcile(ReconcileError::MissingAncestor { ref tag_id, ref missing_parent_id })
			if tag_id.as_str() == "2" && missing_parent_id.as_str() == "1"
	));

	let outcome = catalog
		.manager
		.update_tags(&AccessScope::All, &entity("e"), &ids(&["1", "2"]), &operator())
		.await
		.unwrap();
	assert_eq!(outcome.delta.to_add, ids(&["1", "2"]));
	assert!(outcome.delta.to_remove.is_empty());
}

#[tokio::test]
async fn test_lenient_policy_commits_what_it_can() {
	let mut config = test_config();
	config.reconcile.policy = ReconcilePolicy::Lenient;
	let catalog = catalog_with(sports_seed(), config).await;

	let outcome = catalog
		.manager
		.update_tags(
			&AccessScope::All,
			&entity("gym"),
			&ids(&["indoor", "swimming"]),
			&operator(),
		)
		.await
		.unwrap();

	assert_eq!(outcome.delta.to_add, ids(&["indoor"]));
	assert_eq!(outcome.warnings.len(), 1);
	assert!(outcome.warnings[0].starts_with("swimming:"));
	assert_eq!(outcome.entry.unwrap().added_tag_ids, vec![TagId::from("indoor")]);
}

#[tokio::test]
async fn test_stale_revision_is_a_concurrent_modification() {
	let catalog = sports_catalog().await;
	let stale = catalog
		.manager
		.load_snapshot(&AccessScope::All, &entity("gym"))
		.await
		.unwrap();

	catalog
		.manager
		.update_tags(&AccessScope::All, &entity("gym"), &ids(&["indoor"]), &operator())
		.await
		.unwrap();

	let delta = SelectionReconciler::default()
		.reconcile(&stale.graph, &stale.assignment.tag_ids, &ids(&["outdoor"]))
		.unwrap();
	let err = ChangeApplier::new(catalog.db.shared())
		.apply(&stale.graph, &stale.assignment, &delta, &operator())
		.await
		.unwrap_err();

	assert!(matches!(
		err,
		ApplyError::ConcurrentModification {
			expected: 0,
			found: 1,
			..
		}
	));

	let current = catalog
		.manager
		.get_assignment(&AccessScope::All, &entity("gym"))
		.await
		.unwrap();
	assert_eq!(current.tag_ids, ids(&["indoor"]));
}

#[tokio::test]
async fn test_unknown_entity_is_reported() {
	let catalog = sports_catalog().await;

	let err = catalog
		.manager
		.update_tags(&AccessScope::All, &entity("nowhere"), &ids(&["sport"]), &operator())
		.await
		.unwrap_err();

	assert!(matches!(err, TaggingError::EntityNotFound(ref id) if id.as_str() == "nowhere"));
	assert!(err.is_not_found());
	assert!(!err.is_conflict());
}

#[tokio::test]
async fn test_selected_tag_names_follow_the_hierarchy() {
	let catalog = sports_catalog().await;
	let snapshot = catalog
		.manager
		.load_snapshot(&AccessScope::All, &entity("stadium"))
		.await
		.unwrap();

	let names = sd_catalog_tags::TagAssignmentManager::selected_tag_names(
		&snapshot.graph,
		&snapshot.assignment.tag_ids,
	);

	assert_eq!(names, vec!["Outdoor", "Sport", "Ball games", "Football"]);
}
