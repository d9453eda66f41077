//! Database infrastructure using SeaORM

use crate::config::DatabaseConfig;
use sea_orm::{ConnectOptions, Database as SeaDatabase, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub mod entities;
pub mod migration;
pub mod seed;

pub use seed::{CatalogSeed, SeedEntry};

/// Database wrapper for the tag catalog
pub struct Database {
	conn: Arc<DatabaseConnection>,
}

impl Database {
	/// Create (or open) the database at `path`, creating parent directories as needed
	pub async fn create(path: &Path, config: &DatabaseConfig) -> Result<Self, DbErr> {
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent)
				.map_err(|e| DbErr::Custom(format!("Failed to create directory: {}", e)))?;
		}

		let db = Self::connect(format!("sqlite://{}?mode=rwc", path.display()), config).await?;
		info!("Created new database at {:?}", path);

		Ok(db)
	}

	/// Open an existing database
	pub async fn open(path: &Path, config: &DatabaseConfig) -> Result<Self, DbErr> {
		if !path.exists() {
			return Err(DbErr::Custom(format!(
				"Database does not exist: {}",
				path.display()
			)));
		}

		let db = Self::connect(format!("sqlite://{}", path.display()), config).await?;
		info!("Opened database at {:?}", path);

		Ok(db)
	}

	/// Private in-memory database, already migrated. The pool is pinned to a single
	/// connection since every sqlite memory connection is its own database.
	pub async fn memory() -> Result<Self, DbErr> {
		let mut opt = ConnectOptions::new("sqlite::memory:");
		opt.max_connections(1)
			.min_connections(1)
			.sqlx_logging(false);

		let db = Self {
			conn: Arc::new(SeaDatabase::connect(opt).await?),
		};
		db.migrate().await?;

		Ok(db)
	}

	async fn connect(url: String, config: &DatabaseConfig) -> Result<Self, DbErr> {
		let mut opt = ConnectOptions::new(url);
		opt.max_connections(config.max_connections)
			.min_connections(1)
			.connect_timeout(Duration::from_secs(config.connect_timeout_secs))
			.sqlx_logging(config.sqlx_logging); // We use tracing instead

		Ok(Self {
			conn: Arc::new(SeaDatabase::connect(opt).await?),
		})
	}

	/// Run migrations
	pub async fn migrate(&self) -> Result<(), DbErr> {
		migration::Migrator::up(self.conn.as_ref(), None).await?;
		info!("Database migrations completed successfully");
		Ok(())
	}

	/// Get the database connection
	pub fn conn(&self) -> &DatabaseConnection {
		&self.conn
	}

	/// Shared handle for managers that outlive a borrow of `self`
	pub fn shared(&self) -> Arc<DatabaseConnection> {
		Arc::clone(&self.conn)
	}
}
