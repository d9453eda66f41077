//! Committing a reconciled selection
//!
//! The assignment write and its audit entry share one transaction: either both are
//! visible afterwards or neither is. The write is guarded by the revision the caller
//! loaded, so a change committed in between surfaces as
//! [`ApplyError::ConcurrentModification`] instead of being overwritten.

use super::reconcile::SelectionDelta;
use crate::domain::audit::TAGS_UPDATE_ACTION;
use crate::domain::tag::{decode_tag_refs, encode_tag_ids};
use crate::domain::{Actor, Assignment, AuditEntry, EntityId, TagGraph, TagRefError};
use crate::infra::db::entities::catalog_entry;
use crate::ops::audit::{AuditDraft, AuditError, AuditStore};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
	ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, TransactionTrait,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ApplyError {
	#[error("catalog entry '{0}' does not exist")]
	EntityNotFound(EntityId),
	#[error("catalog entry '{entity_id}' changed since it was loaded (revision {expected}, now {found})")]
	ConcurrentModification {
		entity_id: EntityId,
		expected: i64,
		found: i64,
	},
	#[error("tag change interrupted before commit: {0}")]
	Interrupted(String),
	#[error("stored tags are unreadable: {0}")]
	Reference(#[from] TagRefError),
	#[error(transparent)]
	Audit(#[from] AuditError),
	#[error("database error: {0}")]
	Database(#[from] DbErr),
}

/// Hook invoked inside the commit transaction after the assignment row is written and
/// before the audit entry is appended. Returning an error rolls the whole change back.
#[async_trait]
pub trait CommitProbe: Send + Sync {
	async fn before_audit_append(&self, entity_id: &EntityId) -> Result<(), ApplyError>;
}

pub struct NoopProbe;

#[async_trait]
impl CommitProbe for NoopProbe {
	async fn before_audit_append(&self, _entity_id: &EntityId) -> Result<(), ApplyError> {
		Ok(())
	}
}

pub struct ChangeApplier {
	db: Arc<DatabaseConnection>,
	probe: Arc<dyn CommitProbe>,
}

impl ChangeApplier {
	pub fn new(db: Arc<DatabaseConnection>) -> Self {
		Self {
			db,
			probe: Arc::new(NoopProbe),
		}
	}

	pub fn with_probe(mut self, probe: Arc<dyn CommitProbe>) -> Self {
		self.probe = probe;
		self
	}

	/// Commit `delta` against the assignment it was reconciled from.
	///
	/// Returns the audit entry written for the change, or `None` for an empty delta,
	/// which touches nothing.
	pub async fn apply(
		&self,
		graph: &TagGraph,
		baseline: &Assignment,
		delta: &SelectionDelta,
		actor: &Actor,
	) -> Result<Option<AuditEntry>, ApplyError> {
		if delta.is_empty() {
			debug!(entity_id = %baseline.entity_id, "Nothing to commit");
			return Ok(None);
		}

		let entity_id = &baseline.entity_id;

		// Dropping this future before commit drops the transaction, which rolls back.
		let txn = self.db.begin().await?;

		let row = catalog_entry::Entity::find_by_id(entity_id.as_str())
			.one(&txn)
			.await?
			.ok_or_else(|| ApplyError::EntityNotFound(entity_id.clone()))?;

		if row.revision != baseline.revision {
			return Err(ApplyError::ConcurrentModification {
				entity_id: entity_id.clone(),
				expected: baseline.revision,
				found: row.revision,
			});
		}

		let stored = decode_tag_refs(&row.tags)?;
		let next = delta.apply_to(&stored);
		let revision = baseline.revision + 1;

		let updated = catalog_entry::Entity::update_many()
			.col_expr(catalog_entry::Column::Tags, Expr::value(encode_tag_ids(&next)))
			.col_expr(catalog_entry::Column::Revision, Expr::value(revision))
			.col_expr(catalog_entry::Column::UpdatedAt, Expr::value(Utc::now()))
			.filter(catalog_entry::Column::Id.eq(entity_id.as_str()))
			.filter(catalog_entry::Column::Revision.eq(baseline.revision))
			.exec(&txn)
			.await?;

		if updated.rows_affected != 1 {
			return Err(ApplyError::ConcurrentModification {
				entity_id: entity_id.clone(),
				expected: baseline.revision,
				found: row.revision,
			});
		}

		self.probe.before_audit_append(entity_id).await?;

		let added = graph.sort_shallow_first(delta.to_add.difference(&stored));
		let mut removed = graph.sort_shallow_first(delta.to_remove.intersection(&stored));
		removed.reverse();

		let draft = AuditDraft {
			entity_id: entity_id.clone(),
			entity_name: row.name.clone(),
			added_names: added.iter().map(|id| graph.name_of(id)).collect(),
			removed_names: removed.iter().map(|id| graph.name_of(id)).collect(),
			added_tag_ids: added,
			removed_tag_ids: removed,
			action: TAGS_UPDATE_ACTION.to_owned(),
			actor: actor.clone(),
		};
		let entry = AuditStore::append(&txn, draft).await?;

		txn.commit().await?;

		info!(
			%entity_id,
			revision,
			added = ?entry.added_tag_ids,
			removed = ?entry.removed_tag_ids,
			audit_entry = %entry.id,
			"Committed tag change"
		);

		Ok(Some(entry))
	}
}
