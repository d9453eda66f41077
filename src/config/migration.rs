//! Versioned config upgrades

use anyhow::Result;

pub trait Migrate {
	fn current_version(&self) -> u32;

	fn target_version() -> u32;

	/// Upgrade in place, one version at a time, up to [`Migrate::target_version`]
	fn migrate(&mut self) -> Result<()>;

	fn needs_migration(&self) -> bool {
		self.current_version() < Self::target_version()
	}
}
