//! Tag assignment manager
//!
//! Request level entry point: checks the caller's access scope, loads the tag and
//! assignment snapshot, reconciles the editor's selection and commits it. Every
//! operation here is scoped before any tag or audit data is read.

use super::apply::{ApplyError, ChangeApplier, CommitProbe};
use super::reconcile::{ReconcileError, SelectionDelta, SelectionReconciler};
use crate::config::{AppConfig, RetryConfig};
use crate::domain::tag::decode_tag_refs;
use crate::domain::{
	AccessScope, Actor, Assignment, AuditEntry, AuditFilter, AuditPage, EntityId, EntrySummary,
	GraphError, ScopeError, SequenceToken, Tag, TagGraph, TagId, TagRefError,
};
use crate::infra::db::entities::{catalog_entry, tag};
use crate::infra::retry::{read_with_retry, ReadError};
use crate::ops::audit::{AuditError, AuditStore};
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum TaggingError {
	#[error(transparent)]
	Scope(#[from] ScopeError),
	#[error(transparent)]
	Graph(#[from] GraphError),
	#[error(transparent)]
	Reconcile(#[from] ReconcileError),
	#[error(transparent)]
	Apply(#[from] ApplyError),
	#[error(transparent)]
	Audit(#[from] AuditError),
	#[error(transparent)]
	Read(#[from] ReadError),
	#[error("entry '{entity_id}' has unreadable tags: {source}")]
	Reference {
		entity_id: EntityId,
		source: TagRefError,
	},
	#[error("catalog entry '{0}' does not exist")]
	EntityNotFound(EntityId),
}

impl TaggingError {
	pub fn is_not_found(&self) -> bool {
		matches!(self, Self::EntityNotFound(_))
	}

	/// The entry changed under the caller; reload and reconcile again.
	pub fn is_conflict(&self) -> bool {
		matches!(
			self,
			Self::Apply(ApplyError::ConcurrentModification { .. })
		)
	}
}

/// Tag forest and one entity's assignment, read together for a single request.
#[derive(Debug, Clone)]
pub struct Snapshot {
	pub graph: TagGraph,
	pub assignment: Assignment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagUpdateOutcome {
	pub delta: SelectionDelta,
	/// `None` when the selection matched the stored assignment
	pub entry: Option<AuditEntry>,
	/// Selections dropped by the lenient policy
	pub warnings: Vec<String>,
}

impl TagUpdateOutcome {
	pub fn changed(&self) -> bool {
		self.entry.is_some()
	}
}

#[derive(Clone)]
pub struct TagAssignmentManager {
	db: Arc<DatabaseConnection>,
	applier: Arc<ChangeApplier>,
	audit: Arc<AuditStore>,
	reconciler: SelectionReconciler,
	config: AppConfig,
}

impl TagAssignmentManager {
	pub fn new(db: Arc<DatabaseConnection>, config: &AppConfig) -> Self {
		Self {
			applier: Arc::new(ChangeApplier::new(db.clone())),
			audit: Arc::new(
				AuditStore::new(db.clone()).with_delete_batch_size(config.audit.delete_batch_size),
			),
			reconciler: SelectionReconciler::new(config.reconcile.policy),
			config: config.clone(),
			db,
		}
	}

	pub fn with_commit_probe(mut self, probe: Arc<dyn CommitProbe>) -> Self {
		self.applier = Arc::new(ChangeApplier::new(self.db.clone()).with_probe(probe));
		self
	}

	pub fn audit(&self) -> &AuditStore {
		&self.audit
	}

	fn retry(&self) -> &RetryConfig {
		&self.config.retry
	}

	/// Every tag in the catalog, ordered by name
	pub async fn list_tags(&self) -> Result<Vec<Tag>, TaggingError> {
		let db = self.db.as_ref();

		let rows = read_with_retry(self.retry(), "list_tags", || {
			tag::Entity::find()
				.order_by_asc(tag::Column::Name)
				.order_by_asc(tag::Column::Id)
				.all(db)
		})
		.await?;

		Ok(rows.into_iter().map(Tag::from).collect())
	}

	pub async fn load_graph(&self) -> Result<TagGraph, TaggingError> {
		Ok(TagGraph::build(self.list_tags().await?)?)
	}

	pub async fn get_assignment(
		&self,
		scope: &AccessScope,
		entity_id: &EntityId,
	) -> Result<Assignment, TaggingError> {
		scope.check(entity_id)?;
		let db = self.db.as_ref();

		let row = read_with_retry(self.retry(), "get_assignment", || {
			catalog_entry::Entity::find_by_id(entity_id.as_str()).one(db)
		})
		.await?
		.ok_or_else(|| TaggingError::EntityNotFound(entity_id.clone()))?;

		let tag_ids = decode_tag_refs(&row.tags).map_err(|source| TaggingError::Reference {
			entity_id: entity_id.clone(),
			source,
		})?;

		Ok(Assignment {
			entity_id: entity_id.clone(),
			entity_name: row.name,
			tag_ids,
			revision: row.revision,
		})
	}

	pub async fn load_snapshot(
		&self,
		scope: &AccessScope,
		entity_id: &EntityId,
	) -> Result<Snapshot, TaggingError> {
		scope.check(entity_id)?;

		let (graph, assignment) =
			tokio::try_join!(self.load_graph(), self.get_assignment(scope, entity_id))?;

		debug!(
			%entity_id,
			tags = graph.len(),
			assigned = assignment.tag_ids.len(),
			revision = assignment.revision,
			"Loaded tag snapshot"
		);

		Ok(Snapshot { graph, assignment })
	}

	/// Replace the entity's tags with `checked`, enforcing the hierarchy.
	///
	/// A [`TaggingError::is_conflict`] error means another writer got there first;
	/// nothing was written and the call can simply be repeated.
	pub async fn update_tags(
		&self,
		scope: &AccessScope,
		entity_id: &EntityId,
		checked: &BTreeSet<TagId>,
		actor: &Actor,
	) -> Result<TagUpdateOutcome, TaggingError> {
		let Snapshot { graph, assignment } = self.load_snapshot(scope, entity_id).await?;

		let delta = self
			.reconciler
			.reconcile(&graph, &assignment.tag_ids, checked)?;

		let warnings = delta
			.rejected
			.iter()
			.map(|rejection| format!("{}: {}", rejection.tag_id, rejection.reason))
			.collect();

		let entry = self
			.applier
			.apply(&graph, &assignment, &delta, actor)
			.await
			.map_err(|e| match e {
				ApplyError::EntityNotFound(entity_id) => TaggingError::EntityNotFound(entity_id),
				other => TaggingError::Apply(other),
			})?;

		Ok(TagUpdateOutcome {
			delta,
			entry,
			warnings,
		})
	}

	/// Audit entries visible to `scope`, newest first.
	pub async fn history(
		&self,
		scope: &AccessScope,
		mut filter: AuditFilter,
		page_size: Option<u64>,
		cursor: Option<&SequenceToken>,
	) -> Result<AuditPage, TaggingError> {
		if let Some(entity_id) = &filter.entity_id {
			scope.check(entity_id)?;
		}
		if scope.is_empty() {
			return Ok(AuditPage::default());
		}

		filter.within = scope
			.restriction()
			.map(|granted| granted.iter().cloned().collect());

		Ok(self
			.audit
			.query(&filter, self.config.page_size(page_size), cursor)
			.await?)
	}

	/// Delete audit entries. Fails without deleting anything if one of them belongs to an
	/// entity outside `scope`; ids that do not exist are ignored.
	pub async fn delete_history(
		&self,
		scope: &AccessScope,
		ids: &BTreeSet<Uuid>,
	) -> Result<u64, TaggingError> {
		if scope.restriction().is_some() {
			for entity_id in self.audit.owners(ids).await?.values() {
				scope.check(entity_id)?;
			}
		}

		let deleted = self.audit.delete_many(ids).await?;
		info!(requested = ids.len(), deleted, "Purged audit history");

		Ok(deleted)
	}

	/// Catalog entries visible to `scope`, ordered by name
	pub async fn list_entries(&self, scope: &AccessScope) -> Result<Vec<EntrySummary>, TaggingError> {
		let db = self.db.as_ref();

		let rows = match scope.restriction() {
			None => {
				read_with_retry(self.retry(), "list_entries", || {
					catalog_entry::Entity::find()
						.order_by_asc(catalog_entry::Column::Name)
						.all(db)
				})
				.await?
			}
			Some(granted) => {
				let ids: Vec<String> = granted.iter().map(|id| id.as_str().to_owned()).collect();
				let ids = &ids;

				let mut rows = read_with_retry(self.retry(), "list_entries", || async move {
					let mut results = Vec::new();
					let chunk_size: usize = 900;
					for chunk in ids.chunks(chunk_size) {
						let mut batch = catalog_entry::Entity::find()
							.filter(catalog_entry::Column::Id.is_in(chunk.to_vec()))
							.all(db)
							.await?;
						results.append(&mut batch);
					}
					Ok::<_, DbErr>(results)
				})
				.await?;
				rows.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
				rows
			}
		};

		rows.into_iter()
			.map(|row| {
				let entity_id = EntityId::from(row.id);
				let tag_count = decode_tag_refs(&row.tags)
					.map_err(|source| TaggingError::Reference {
						entity_id: entity_id.clone(),
						source,
					})?
					.len();

				Ok(EntrySummary {
					id: entity_id,
					name: row.name,
					address: row.address,
					tag_count,
				})
			})
			.collect()
	}

	/// Display names of a selection, ancestors first
	pub fn selected_tag_names(graph: &TagGraph, ids: &BTreeSet<TagId>) -> Vec<String> {
		graph.names_of(ids)
	}
}
