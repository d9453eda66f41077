//! Audit log entity for tag assignment changes
//!
//! Rows are append only. Nothing updates them; they are only ever removed by an
//! explicit purge.

use crate::domain::{Actor, AuditEntry, SequenceToken, TagId};
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "audit_log")]
pub struct Model {
	#[sea_orm(primary_key)]
	pub id: i32,

	#[sea_orm(unique)]
	pub uuid: Uuid,

	#[sea_orm(indexed)]
	pub entity_id: String,

	pub action: String,

	#[sea_orm(column_type = "Json")]
	pub added_tag_ids: Json,

	#[sea_orm(column_type = "Json")]
	pub removed_tag_ids: Json,

	pub actor_id: String,
	pub actor_label: String,

	pub summary: String,
	/// Lowercased summary, matched by the text filter
	pub search_text: String,

	#[sea_orm(unique)]
	pub sequence_token: String,

	#[sea_orm(indexed)]
	pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {
	fn new() -> Self {
		Self {
			uuid: Set(Uuid::new_v4()),
			created_at: Set(chrono::Utc::now()),
			..ActiveModelTrait::default()
		}
	}
}

impl TryFrom<Model> for AuditEntry {
	type Error = DbErr;

	fn try_from(model: Model) -> Result<Self, Self::Error> {
		let corrupt = |field: &str, err: &dyn std::fmt::Display| {
			DbErr::Custom(format!(
				"Corrupt audit_log row {} ({field}): {err}",
				model.uuid
			))
		};

		let added_tag_ids: Vec<TagId> = serde_json::from_value(model.added_tag_ids.clone())
			.map_err(|e| corrupt("added_tag_ids", &e))?;
		let removed_tag_ids: Vec<TagId> = serde_json::from_value(model.removed_tag_ids.clone())
			.map_err(|e| corrupt("removed_tag_ids", &e))?;
		let sequence_token: SequenceToken = model
			.sequence_token
			.parse()
			.map_err(|e| corrupt("sequence_token", &e))?;

		Ok(Self {
			id: model.uuid,
			entity_id: model.entity_id.into(),
			action: model.action,
			added_tag_ids,
			removed_tag_ids,
			actor: Actor::new(model.actor_id, model.actor_label),
			timestamp: model.created_at,
			sequence_token,
			summary: model.summary,
		})
	}
}
