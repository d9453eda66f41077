//! Restricted operators only ever see and change the entries they were granted

mod helpers;

use helpers::*;
use pretty_assertions::assert_eq;
use sd_catalog_tags::domain::{AccessScope, AuditFilter, ScopeError};
use sd_catalog_tags::TaggingError;
use std::collections::BTreeSet;
use uuid::Uuid;

fn out_of_scope(err: &TaggingError, expected: &str) -> bool {
	matches!(err, TaggingError::Scope(ScopeError::OutOfScope(id)) if id.as_str() == expected)
}

async fn tag_everything(catalog: &TestCatalog) {
	for id in ["gym", "pool"] {
		catalog
			.manager
			.update_tags(
				&AccessScope::All,
				&entity(id),
				&ids(&["sport", "water", "indoor"]),
				&operator(),
			)
			.await
			.unwrap();
	}
}

#[tokio::test]
async fn test_updates_outside_the_scope_are_rejected() {
	let catalog = sports_catalog().await;
	let scope = AccessScope::entities(["pool"]);

	let err = catalog
		.manager
		.update_tags(&scope, &entity("gym"), &ids(&["indoor"]), &operator())
		.await
		.unwrap_err();
	assert!(out_of_scope(&err, "gym"));

	let gym = catalog
		.manager
		.get_assignment(&AccessScope::All, &entity("gym"))
		.await
		.unwrap();
	assert_eq!(gym.revision, 0);

	catalog
		.manager
		.update_tags(&scope, &entity("pool"), &ids(&["indoor"]), &operator())
		.await
		.unwrap();
}

#[tokio::test]
async fn test_history_is_limited_to_granted_entities() {
	let catalog = sports_catalog().await;
	tag_everything(&catalog).await;
	let scope = AccessScope::entities(["pool"]);

	let page = catalog
		.manager
		.history(&scope, AuditFilter::default(), None, None)
		.await
		.unwrap();
	assert_eq!(page.entries.len(), 1);
	assert_eq!(page.entries[0].entity_id, entity("pool"));

	let err = catalog
		.manager
		.history(&scope, AuditFilter::for_entity("gym"), None, None)
		.await
		.unwrap_err();
	assert!(out_of_scope(&err, "gym"));

	let nothing = catalog
		.manager
		.history(&AccessScope::entities(Vec::<String>::new()), AuditFilter::default(), None, None)
		.await
		.unwrap();
	assert!(nothing.entries.is_empty());
	assert!(!nothing.has_more());
}

#[tokio::test]
async fn test_purging_someone_elses_history_deletes_nothing() {
	let catalog = sports_catalog().await;
	tag_everything(&catalog).await;

	let every: BTreeSet<Uuid> = catalog
		.manager
		.history(&AccessScope::All, AuditFilter::default(), None, None)
		.await
		.unwrap()
		.entries
		.into_iter()
		.map(|entry| entry.id)
		.collect();

	let err = catalog
		.manager
		.delete_history(&AccessScope::entities(["pool"]), &every)
		.await
		.unwrap_err();
	assert!(out_of_scope(&err, "gym"));

	let still_there = catalog
		.manager
		.history(&AccessScope::All, AuditFilter::default(), None, None)
		.await
		.unwrap();
	assert_eq!(still_there.entries.len(), 2);
}

#[tokio::test]
async fn test_entry_listing_follows_the_scope() {
	let catalog = sports_catalog().await;

	let all = catalog.manager.list_entries(&AccessScope::All).await.unwrap();
	let names: Vec<&str> = all.iter().map(|entry| entry.name.as_str()).collect();
	assert_eq!(names, vec!["Central Pool", "City Stadium", "Gym"]);
	assert_eq!(all[0].tag_count, 2);
	assert_eq!(all[0].address.as_deref(), Some("1 Harbour Road"));
	assert_eq!(all[2].tag_count, 0);

	let granted = catalog
		.manager
		.list_entries(&AccessScope::entities(["gym", "stadium", "missing"]))
		.await
		.unwrap();
	let ids: Vec<&str> = granted.iter().map(|entry| entry.id.as_str()).collect();
	assert_eq!(ids, vec!["stadium", "gym"]);
}
