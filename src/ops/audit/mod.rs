//! Audit log store
//!
//! Append happens only inside a tag change transaction (see
//! [`crate::ops::tags::ChangeApplier`]). Reads page backwards through the log by
//! sequence token; the token of the last entry on a page is the cursor for the next.

use crate::domain::audit::render_summary;
use crate::domain::{Actor, AuditEntry, AuditFilter, AuditPage, EntityId, SequenceToken, TagId};
use crate::infra::db::entities::audit_log;
use chrono::Utc;
use sea_orm::sea_query::{Expr, LikeExpr};
use sea_orm::{
	ActiveModelBehavior, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait,
	DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set,
	TransactionTrait,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default upper bound on ids per delete statement
pub const DELETE_BATCH_SIZE: usize = 900;

#[derive(Debug, Error)]
pub enum AuditError {
	#[error("page size must be at least 1")]
	InvalidPageSize,
	/// Some batches were committed before a later one failed. `failed_ids` are the
	/// entries that are still present.
	#[error("bulk delete stopped after removing {deleted} entries; {} remain", failed_ids.len())]
	PartialFailure { failed_ids: Vec<Uuid>, deleted: u64 },
	#[error("failed to encode audit entry: {0}")]
	Encode(#[from] serde_json::Error),
	#[error("database error: {0}")]
	Database(#[from] DbErr),
}

/// Everything needed to record one change; token, id and timestamp are assigned on append.
#[derive(Debug, Clone)]
pub struct AuditDraft {
	pub entity_id: EntityId,
	pub entity_name: String,
	pub added_tag_ids: Vec<TagId>,
	pub removed_tag_ids: Vec<TagId>,
	/// Display names matching `added_tag_ids`, used for the summary only
	pub added_names: Vec<String>,
	/// Display names matching `removed_tag_ids`, used for the summary only
	pub removed_names: Vec<String>,
	pub action: String,
	pub actor: Actor,
}

pub struct AuditStore {
	db: Arc<DatabaseConnection>,
	delete_batch_size: usize,
}

impl AuditStore {
	pub fn new(db: Arc<DatabaseConnection>) -> Self {
		Self {
			db,
			delete_batch_size: DELETE_BATCH_SIZE,
		}
	}

	pub fn with_delete_batch_size(mut self, size: usize) -> Self {
		self.delete_batch_size = size.max(1);
		self
	}

	/// Record a change on `conn`, which is expected to be the caller's open transaction.
	pub async fn append<C: ConnectionTrait>(
		conn: &C,
		draft: AuditDraft,
	) -> Result<AuditEntry, AuditError> {
		let previous = audit_log::Entity::find()
			.order_by_desc(audit_log::Column::SequenceToken)
			.one(conn)
			.await?
			.map(|row| row.sequence_token.parse::<SequenceToken>())
			.transpose()
			.map_err(|e| DbErr::Custom(format!("Corrupt sequence token in audit_log: {e}")))?;

		let token = SequenceToken::next(previous.as_ref(), Utc::now());
		let summary = render_summary(
			&draft.entity_name,
			&draft.entity_id,
			&draft.added_names,
			&draft.removed_names,
			&draft.actor,
		);

		let mut active = audit_log::ActiveModel::new();
		active.entity_id = Set(draft.entity_id.as_str().to_owned());
		active.action = Set(draft.action);
		active.added_tag_ids = Set(serde_json::to_value(&draft.added_tag_ids)?);
		active.removed_tag_ids = Set(serde_json::to_value(&draft.removed_tag_ids)?);
		active.actor_id = Set(draft.actor.id);
		active.actor_label = Set(draft.actor.label);
		active.search_text = Set(summary.to_lowercase());
		active.summary = Set(summary);
		active.sequence_token = Set(token.to_string());
		active.created_at = Set(token.timestamp());

		let row = active.insert(conn).await?;
		debug!(entry = %row.uuid, token = %token, "Appended audit entry");

		Ok(AuditEntry::try_from(row)?)
	}

	/// One page of entries matching `filter`, newest first, strictly older than `cursor`.
	pub async fn query(
		&self,
		filter: &AuditFilter,
		page_size: u64,
		cursor: Option<&SequenceToken>,
	) -> Result<AuditPage, AuditError> {
		if page_size == 0 {
			return Err(AuditError::InvalidPageSize);
		}

		let rows = Self::select(filter, cursor)
			.order_by_desc(audit_log::Column::SequenceToken)
			.limit(page_size + 1)
			.all(self.db.as_ref())
			.await?;

		let more = rows.len() as u64 > page_size;
		let entries = rows
			.into_iter()
			.take(page_size as usize)
			.map(AuditEntry::try_from)
			.collect::<Result<Vec<_>, _>>()?;

		let next_cursor = if more {
			entries.last().map(|entry| entry.sequence_token)
		} else {
			None
		};

		Ok(AuditPage {
			entries,
			next_cursor,
		})
	}

	/// Whether any entry matching `filter` is older than `cursor`.
	pub async fn has_more(
		&self,
		filter: &AuditFilter,
		cursor: Option<&SequenceToken>,
	) -> Result<bool, AuditError> {
		let next = Self::select(filter, cursor)
			.order_by_desc(audit_log::Column::SequenceToken)
			.limit(1)
			.one(self.db.as_ref())
			.await?;

		Ok(next.is_some())
	}

	pub async fn get(&self, id: Uuid) -> Result<Option<AuditEntry>, AuditError> {
		let row = audit_log::Entity::find()
			.filter(audit_log::Column::Uuid.eq(id))
			.one(self.db.as_ref())
			.await?;

		Ok(row.map(AuditEntry::try_from).transpose()?)
	}

	/// Entity each of `ids` belongs to. Unknown ids are absent from the map.
	pub async fn owners(
		&self,
		ids: &BTreeSet<Uuid>,
	) -> Result<HashMap<Uuid, EntityId>, AuditError> {
		let ids: Vec<Uuid> = ids.iter().copied().collect();
		let mut owners = HashMap::with_capacity(ids.len());

		let chunk_size: usize = 900;
		for chunk in ids.chunks(chunk_size) {
			let rows = audit_log::Entity::find()
				.filter(audit_log::Column::Uuid.is_in(chunk.to_vec()))
				.all(self.db.as_ref())
				.await?;
			owners.extend(rows.into_iter().map(|row| (row.uuid, row.entity_id.into())));
		}

		Ok(owners)
	}

	/// Delete the given entries and return how many rows went away.
	///
	/// Up to the batch size this is a single transaction. Larger sets are committed one
	/// batch at a time, and a failing batch surfaces as [`AuditError::PartialFailure`].
	pub async fn delete_many(&self, ids: &BTreeSet<Uuid>) -> Result<u64, AuditError> {
		if ids.is_empty() {
			return Ok(0);
		}

		let ids: Vec<Uuid> = ids.iter().copied().collect();

		if ids.len() <= self.delete_batch_size {
			let txn = self.db.begin().await?;
			let deleted = Self::delete_batch(&txn, &ids).await?;
			txn.commit().await?;

			info!(requested = ids.len(), deleted, "Deleted audit entries");
			return Ok(deleted);
		}

		let mut deleted = 0;
		for (index, chunk) in ids.chunks(self.delete_batch_size).enumerate() {
			let committed = async {
				let txn = self.db.begin().await?;
				let removed = Self::delete_batch(&txn, chunk).await?;
				txn.commit().await?;
				Ok::<_, DbErr>(removed)
			}
			.await;

			match committed {
				Ok(removed) => deleted += removed,
				Err(e) => {
					let failed_ids = ids[index * self.delete_batch_size..].to_vec();
					warn!(
						error = %e,
						deleted,
						remaining = failed_ids.len(),
						"Bulk audit delete failed part way"
					);
					return Err(AuditError::PartialFailure {
						failed_ids,
						deleted,
					});
				}
			}
		}

		info!(requested = ids.len(), deleted, "Deleted audit entries in batches");
		Ok(deleted)
	}

	async fn delete_batch<C: ConnectionTrait>(conn: &C, ids: &[Uuid]) -> Result<u64, DbErr> {
		let result = audit_log::Entity::delete_many()
			.filter(audit_log::Column::Uuid.is_in(ids.to_vec()))
			.exec(conn)
			.await?;

		Ok(result.rows_affected)
	}

	fn select(filter: &AuditFilter, cursor: Option<&SequenceToken>) -> Select<audit_log::Entity> {
		let mut condition = Condition::all();

		if let Some(entity_id) = &filter.entity_id {
			condition = condition.add(audit_log::Column::EntityId.eq(entity_id.as_str()));
		}
		if let Some(within) = &filter.within {
			condition = condition.add(
				audit_log::Column::EntityId.is_in(within.iter().map(|id| id.as_str().to_owned())),
			);
		}
		// Tokens encode the commit time, so date bounds are token bounds.
		if let Some(from) = filter.date_from {
			condition = condition
				.add(audit_log::Column::SequenceToken.gte(SequenceToken::lowest_at(from).to_string()));
		}
		if let Some(to) = filter.date_to {
			condition = condition
				.add(audit_log::Column::SequenceToken.lte(SequenceToken::highest_at(to).to_string()));
		}
		if let Some(needle) = filter.text_contains.as_deref().map(str::trim) {
			if !needle.is_empty() {
				let pattern = format!("%{}%", escape_like(&needle.to_lowercase()));
				condition = condition.add(
					Expr::col(audit_log::Column::SearchText)
						.like(LikeExpr::new(pattern).escape(LIKE_ESCAPE)),
				);
			}
		}
		if let Some(cursor) = cursor {
			condition = condition.add(audit_log::Column::SequenceToken.lt(cursor.to_string()));
		}

		audit_log::Entity::find().filter(condition)
	}
}

const LIKE_ESCAPE: char = '\\';

/// Make `%`, `_` and the escape character itself match literally in a LIKE pattern.
fn escape_like(needle: &str) -> String {
	let mut escaped = String::with_capacity(needle.len());
	for c in needle.chars() {
		if matches!(c, '%' | '_' | LIKE_ESCAPE) {
			escaped.push(LIKE_ESCAPE);
		}
		escaped.push(c);
	}
	escaped
}
