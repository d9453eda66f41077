//! Application configuration

use super::default_data_dir;
use crate::config::migration::Migrate;
use crate::ops::tags::ReconcilePolicy;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const CONFIG_FILE: &str = "catalog-tags.json";
const DATABASE_FILE: &str = "catalog.db";

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
	/// Config schema version
	pub version: u32,

	/// Data directory path
	pub data_dir: PathBuf,

	/// Logging level
	pub log_level: String,

	#[serde(default)]
	pub database: DatabaseConfig,

	/// Retry policy for listing reads
	#[serde(default)]
	pub retry: RetryConfig,

	#[serde(default)]
	pub audit: AuditConfig,

	#[serde(default)]
	pub reconcile: ReconcileConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
	pub max_connections: u32,
	pub connect_timeout_secs: u64,
	/// Echo every statement through sqlx's own logger
	pub sqlx_logging: bool,
}

impl Default for DatabaseConfig {
	fn default() -> Self {
		Self {
			max_connections: 5,
			connect_timeout_secs: 8,
			sqlx_logging: false,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
	/// Total attempts, including the first one
	pub max_attempts: u32,
	pub initial_interval_ms: u64,
	pub max_interval_ms: u64,
	/// Per-attempt timeout
	pub request_timeout_ms: u64,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			initial_interval_ms: 200,
			max_interval_ms: 2_000,
			request_timeout_ms: 5_000,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditConfig {
	pub default_page_size: u64,
	/// Requested page sizes are clamped to this
	pub max_page_size: u64,
	/// Deletes above this many ids are split into independently committed batches
	pub delete_batch_size: usize,
}

impl Default for AuditConfig {
	fn default() -> Self {
		Self {
			default_page_size: 10,
			max_page_size: 100,
			delete_batch_size: 900, // SQLite variable limit
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileConfig {
	pub policy: ReconcilePolicy,
}

impl AppConfig {
	/// Load configuration from the default location
	pub fn load() -> Result<Self> {
		let data_dir = default_data_dir()?;
		Self::load_from(&data_dir)
	}

	/// Load configuration from a specific data directory, writing defaults if missing
	pub fn load_from(data_dir: &Path) -> Result<Self> {
		let config_path = data_dir.join(CONFIG_FILE);

		if config_path.exists() {
			info!("Loading config from {:?}", config_path);
			let json = fs::read_to_string(&config_path)?;
			let mut config: AppConfig = serde_json::from_str(&json)?;

			if config.needs_migration() {
				info!(
					"Migrating config from v{} to v{}",
					config.version,
					Self::target_version()
				);
				config.migrate()?;
				config.save()?;
			}

			Ok(config)
		} else {
			warn!("No config found, creating default at {:?}", config_path);
			let config = Self::default_with_dir(data_dir.to_path_buf());
			config.save()?;
			Ok(config)
		}
	}

	/// Create default configuration with specific data directory
	pub fn default_with_dir(data_dir: PathBuf) -> Self {
		Self {
			version: Self::target_version(),
			data_dir,
			log_level: "info".to_string(),
			database: DatabaseConfig::default(),
			retry: RetryConfig::default(),
			audit: AuditConfig::default(),
			reconcile: ReconcileConfig::default(),
		}
	}

	/// Save configuration to disk
	pub fn save(&self) -> Result<()> {
		fs::create_dir_all(&self.data_dir)?;

		let config_path = self.data_dir.join(CONFIG_FILE);
		let json = serde_json::to_string_pretty(self)?;
		fs::write(&config_path, json)?;
		info!("Saved config to {:?}", config_path);
		Ok(())
	}

	pub fn database_path(&self) -> PathBuf {
		self.data_dir.join(DATABASE_FILE)
	}

	pub fn logs_dir(&self) -> PathBuf {
		self.data_dir.join("logs")
	}

	/// Clamp a requested audit page size into `1..=max_page_size`
	pub fn page_size(&self, requested: Option<u64>) -> u64 {
		requested
			.unwrap_or(self.audit.default_page_size)
			.clamp(1, self.audit.max_page_size.max(1))
	}
}

impl Default for AppConfig {
	fn default() -> Self {
		let data_dir = default_data_dir().unwrap_or_else(|_| PathBuf::from("."));
		Self::default_with_dir(data_dir)
	}
}

impl Migrate for AppConfig {
	fn current_version(&self) -> u32 {
		self.version
	}

	fn target_version() -> u32 {
		2
	}

	fn migrate(&mut self) -> Result<()> {
		match self.version {
			0 => {
				self.version = 1;
				self.migrate()
			}
			1 => {
				// v2 added retry and reconcile settings
				self.retry = RetryConfig::default();
				self.reconcile = ReconcileConfig::default();
				self.version = 2;
				Ok(())
			}
			2 => Ok(()),
			v => Err(anyhow!("Unknown config version: {}", v)),
		}
	}
}
