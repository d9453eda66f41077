//! Shared fixtures for the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use sd_catalog_tags::config::RetryConfig;
use sd_catalog_tags::domain::{Actor, EntityId, Tag, TagId};
use sd_catalog_tags::infra::db::{CatalogSeed, SeedEntry};
use sd_catalog_tags::ops::tags::{ApplyError, CommitProbe};
use sd_catalog_tags::{AppConfig, Database, TagAssignmentManager};
use serde_json::json;
use std::collections::BTreeSet;
use std::path::PathBuf;

pub struct TestCatalog {
	pub db: Database,
	pub config: AppConfig,
	pub manager: TagAssignmentManager,
}

/// Config with retries tuned down so failing reads do not slow the suite
pub fn test_config() -> AppConfig {
	let mut config = AppConfig::default_with_dir(PathBuf::from("target/test-data"));
	config.retry = RetryConfig {
		max_attempts: 2,
		initial_interval_ms: 1,
		max_interval_ms: 5,
		request_timeout_ms: 5_000,
	};
	config
}

/// Sport
/// ├── Ball games
/// │   └── Football
/// └── Water sports
///     └── Swimming
/// Indoor
/// Outdoor
pub fn sports_seed() -> CatalogSeed {
	CatalogSeed {
		tags: vec![
			Tag::root("sport", "Sport"),
			Tag::child("ball", "Ball games", "sport"),
			Tag::child("football", "Football", "ball"),
			Tag::child("water", "Water sports", "sport"),
			Tag::child("swimming", "Swimming", "water"),
			Tag::root("indoor", "Indoor"),
			Tag::root("outdoor", "Outdoor"),
		],
		entries: vec![
			SeedEntry {
				id: "pool".into(),
				name: "Central Pool".into(),
				address: Some("1 Harbour Road".into()),
				// Written by an older client: one path reference, one handle
				tags: json!(["tags/sport", {"id": "water"}]),
			},
			SeedEntry {
				id: "stadium".into(),
				name: "City Stadium".into(),
				address: None,
				tags: json!(["sport", "ball", "football", "outdoor"]),
			},
			SeedEntry {
				id: "gym".into(),
				name: "Gym".into(),
				address: None,
				tags: serde_json::Value::Null,
			},
		],
	}
}

pub async fn catalog_with(seed: CatalogSeed, config: AppConfig) -> TestCatalog {
	let db = Database::memory().await.unwrap();
	seed.apply(db.conn()).await.unwrap();
	let manager = TagAssignmentManager::new(db.shared(), &config);

	TestCatalog {
		db,
		config,
		manager,
	}
}

pub async fn sports_catalog() -> TestCatalog {
	catalog_with(sports_seed(), test_config()).await
}

pub fn ids(raw: &[&str]) -> BTreeSet<TagId> {
	raw.iter().copied().map(TagId::from).collect()
}

pub fn entity(id: &str) -> EntityId {
	EntityId::from(id)
}

pub fn operator() -> Actor {
	Actor::new("u-1", "ops@example.com")
}

/// Fails every commit after the assignment row is written
pub struct FailingProbe;

#[async_trait]
impl CommitProbe for FailingProbe {
	async fn before_audit_append(&self, entity_id: &EntityId) -> Result<(), ApplyError> {
		Err(ApplyError::Interrupted(format!(
			"injected failure for {entity_id}"
		)))
	}
}
