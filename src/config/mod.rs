//! Application configuration management

use anyhow::{anyhow, Result};
use std::fs;
use std::path::PathBuf;

pub mod app_config;
pub mod migration;

pub use app_config::{AppConfig, AuditConfig, DatabaseConfig, ReconcileConfig, RetryConfig};
pub use migration::Migrate;

/// Platform-specific data directory resolution
pub fn default_data_dir() -> Result<PathBuf> {
	#[cfg(target_os = "windows")]
	let dir = dirs::data_dir()
		.ok_or_else(|| anyhow!("Could not determine data directory"))?
		.join("CatalogTags");

	#[cfg(target_os = "macos")]
	let dir = dirs::data_dir()
		.ok_or_else(|| anyhow!("Could not determine data directory"))?
		.join("catalog-tags");

	#[cfg(not(any(target_os = "windows", target_os = "macos")))]
	let dir = dirs::data_local_dir()
		.ok_or_else(|| anyhow!("Could not determine data directory"))?
		.join("catalog-tags");

	fs::create_dir_all(&dir)?;

	Ok(dir)
}
