//! Catalog entry entity
//!
//! `tags` holds whatever tag references the entry was written with (plain ids,
//! slash separated paths or `{ "id": .. }` handles). They are decoded on read and
//! always rewritten as a plain id list.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "catalog_entry")]
pub struct Model {
	#[sea_orm(primary_key, auto_increment = false)]
	pub id: String,
	pub name: String,
	pub address: Option<String>,
	#[sea_orm(column_type = "Json")]
	pub tags: Json,
	/// Bumped on every committed tag change
	pub revision: i64,
	pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
