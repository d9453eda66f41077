//! Tag entity
//!
//! Flat adjacency list: each row points at its parent, roots have no parent.

use crate::domain;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tag")]
pub struct Model {
	#[sea_orm(primary_key, auto_increment = false)]
	pub id: String,
	pub name: String,
	#[sea_orm(indexed, nullable)]
	pub parent_id: Option<String>,
	pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for domain::Tag {
	fn from(model: Model) -> Self {
		Self {
			id: model.id.into(),
			name: model.name,
			parent_id: model.parent_id.map(Into::into),
		}
	}
}
