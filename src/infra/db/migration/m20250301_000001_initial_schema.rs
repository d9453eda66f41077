//! Initial schema: tag hierarchy, catalog entries and the audit log

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
	async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		manager
			.create_table(
				Table::create()
					.table(Tag::Table)
					.if_not_exists()
					.col(ColumnDef::new(Tag::Id).string().not_null().primary_key())
					.col(ColumnDef::new(Tag::Name).string().not_null())
					.col(ColumnDef::new(Tag::ParentId).string())
					.col(
						ColumnDef::new(Tag::CreatedAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.to_owned(),
			)
			.await?;

		manager
			.create_index(
				Index::create()
					.name("idx_tag_parent_id")
					.table(Tag::Table)
					.col(Tag::ParentId)
					.to_owned(),
			)
			.await?;

		manager
			.create_table(
				Table::create()
					.table(CatalogEntry::Table)
					.if_not_exists()
					.col(
						ColumnDef::new(CatalogEntry::Id)
							.string()
							.not_null()
							.primary_key(),
					)
					.col(ColumnDef::new(CatalogEntry::Name).string().not_null())
					.col(ColumnDef::new(CatalogEntry::Address).string())
					.col(ColumnDef::new(CatalogEntry::Tags).json().not_null())
					.col(
						ColumnDef::new(CatalogEntry::Revision)
							.big_integer()
							.not_null()
							.default(0),
					)
					.col(
						ColumnDef::new(CatalogEntry::UpdatedAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.to_owned(),
			)
			.await?;

		manager
			.create_table(
				Table::create()
					.table(AuditLog::Table)
					.if_not_exists()
					.col(
						ColumnDef::new(AuditLog::Id)
							.integer()
							.not_null()
							.auto_increment()
							.primary_key(),
					)
					.col(ColumnDef::new(AuditLog::Uuid).uuid().not_null().unique_key())
					.col(ColumnDef::new(AuditLog::EntityId).string().not_null())
					.col(ColumnDef::new(AuditLog::Action).string().not_null())
					.col(ColumnDef::new(AuditLog::AddedTagIds).json().not_null())
					.col(ColumnDef::new(AuditLog::RemovedTagIds).json().not_null())
					.col(ColumnDef::new(AuditLog::ActorId).string().not_null())
					.col(ColumnDef::new(AuditLog::ActorLabel).string().not_null())
					.col(ColumnDef::new(AuditLog::Summary).text().not_null())
					.col(ColumnDef::new(AuditLog::SearchText).text().not_null())
					.col(
						ColumnDef::new(AuditLog::SequenceToken)
							.string()
							.not_null()
							.unique_key(),
					)
					.col(
						ColumnDef::new(AuditLog::CreatedAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.to_owned(),
			)
			.await?;

		manager
			.create_index(
				Index::create()
					.name("idx_audit_log_entity_id")
					.table(AuditLog::Table)
					.col(AuditLog::EntityId)
					.to_owned(),
			)
			.await?;

		manager
			.create_index(
				Index::create()
					.name("idx_audit_log_created_at")
					.table(AuditLog::Table)
					.col(AuditLog::CreatedAt)
					.to_owned(),
			)
			.await?;

		Ok(())
	}

	async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		manager
			.drop_table(Table::drop().table(AuditLog::Table).to_owned())
			.await?;
		manager
			.drop_table(Table::drop().table(CatalogEntry::Table).to_owned())
			.await?;
		manager
			.drop_table(Table::drop().table(Tag::Table).to_owned())
			.await?;

		Ok(())
	}
}

#[derive(DeriveIden)]
enum Tag {
	Table,
	Id,
	Name,
	ParentId,
	CreatedAt,
}

#[derive(DeriveIden)]
enum CatalogEntry {
	Table,
	Id,
	Name,
	Address,
	Tags,
	Revision,
	UpdatedAt,
}

#[derive(DeriveIden)]
enum AuditLog {
	Table,
	Id,
	Uuid,
	EntityId,
	Action,
	AddedTagIds,
	RemovedTagIds,
	ActorId,
	ActorLabel,
	Summary,
	SearchText,
	SequenceToken,
	CreatedAt,
}
