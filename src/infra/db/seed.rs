//! Catalog import
//!
//! Loads tags and catalog entries from a JSON document. The merged hierarchy (stored
//! tags plus imported ones) has to form a valid forest before anything is written, and
//! the whole import lands in one transaction.

use super::entities::{catalog_entry, tag};
use crate::domain::tag::decode_tag_refs;
use crate::domain::{GraphError, Tag, TagGraph, TagRefError};
use chrono::Utc;
use sea_orm::{
	ActiveModelTrait, DatabaseConnection, DbErr, EntityTrait, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum SeedError {
	#[error("Failed to read seed file: {0}")]
	Io(#[from] std::io::Error),
	#[error("Seed file is not valid JSON: {0}")]
	Json(#[from] serde_json::Error),
	#[error("Seed would leave the tag hierarchy malformed: {0}")]
	Graph(#[from] GraphError),
	#[error("Entry '{entry_id}' carries an unreadable tag list: {source}")]
	Reference {
		entry_id: String,
		source: TagRefError,
	},
	#[error("Database error while importing the catalog: {0}")]
	Database(#[from] DbErr),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSeed {
	#[serde(default)]
	pub tags: Vec<Tag>,
	#[serde(default)]
	pub entries: Vec<SeedEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedEntry {
	pub id: String,
	pub name: String,
	#[serde(default)]
	pub address: Option<String>,
	/// Stored as given; any supported reference encoding is accepted
	#[serde(default)]
	pub tags: Value,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
	pub tags: usize,
	pub entries: usize,
}

impl CatalogSeed {
	pub fn from_path(path: &Path) -> Result<Self, SeedError> {
		let json = std::fs::read_to_string(path)?;
		Ok(serde_json::from_str(&json)?)
	}

	/// Upsert every tag and entry. Entries whose tag list changes get a new revision.
	pub async fn apply(&self, conn: &DatabaseConnection) -> Result<SeedReport, SeedError> {
		let mut merged: HashMap<String, Tag> = tag::Entity::find()
			.all(conn)
			.await?
			.into_iter()
			.map(|model| (model.id.clone(), Tag::from(model)))
			.collect();
		for tag in &self.tags {
			merged.insert(tag.id.as_str().to_owned(), tag.clone());
		}
		TagGraph::build(merged.into_values())?;

		let mut entry_tags = Vec::with_capacity(self.entries.len());
		for entry in &self.entries {
			let stored = match &entry.tags {
				Value::Null => Value::Array(Vec::new()),
				raw => {
					decode_tag_refs(raw).map_err(|source| SeedError::Reference {
						entry_id: entry.id.clone(),
						source,
					})?;
					raw.clone()
				}
			};
			entry_tags.push(stored);
		}

		let txn = conn.begin().await?;
		let now = Utc::now();

		for seed_tag in &self.tags {
			let existing = tag::Entity::find_by_id(seed_tag.id.as_str())
				.one(&txn)
				.await?;

			match existing {
				Some(model) => {
					let mut active: tag::ActiveModel = model.into();
					active.name = Set(seed_tag.name.clone());
					active.parent_id = Set(seed_tag.parent_id.as_ref().map(|p| p.as_str().to_owned()));
					active.update(&txn).await?;
				}
				None => {
					tag::ActiveModel {
						id: Set(seed_tag.id.as_str().to_owned()),
						name: Set(seed_tag.name.clone()),
						parent_id: Set(seed_tag.parent_id.as_ref().map(|p| p.as_str().to_owned())),
						created_at: Set(now),
					}
					.insert(&txn)
					.await?;
				}
			}
		}

		for (entry, tags) in self.entries.iter().zip(entry_tags) {
			let existing = catalog_entry::Entity::find_by_id(entry.id.as_str())
				.one(&txn)
				.await?;

			match existing {
				Some(model) => {
					let revision = if model.tags == tags {
						model.revision
					} else {
						model.revision + 1
					};
					let mut active: catalog_entry::ActiveModel = model.into();
					active.name = Set(entry.name.clone());
					active.address = Set(entry.address.clone());
					active.tags = Set(tags);
					active.revision = Set(revision);
					active.updated_at = Set(now);
					active.update(&txn).await?;
				}
				None => {
					catalog_entry::ActiveModel {
						id: Set(entry.id.clone()),
						name: Set(entry.name.clone()),
						address: Set(entry.address.clone()),
						tags: Set(tags),
						revision: Set(0),
						updated_at: Set(now),
					}
					.insert(&txn)
					.await?;
				}
			}
			debug!(entry_id = %entry.id, "Imported catalog entry");
		}

		txn.commit().await?;

		let report = SeedReport {
			tags: self.tags.len(),
			entries: self.entries.len(),
		};
		info!(tags = report.tags, entries = report.entries, "Catalog import complete");

		Ok(report)
	}
}
