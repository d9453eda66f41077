//! Tracing setup shared by the CLI and embedding applications

use std::path::Path;
use std::sync::Once;
use thiserror::Error;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Error)]
pub enum LoggingError {
	#[error("Failed to create logs directory: {0}")]
	LogsDir(#[from] std::io::Error),
	#[error("Failed to initialize tracing: {0}")]
	Init(String),
}

/// Initialize tracing with stdout output and a daily rolling file under
/// `{data_dir}/logs/catalog-tags.log`. `RUST_LOG` overrides `level`.
///
/// Only the first call installs a subscriber; later calls are no-ops.
pub fn init_logging(data_dir: &Path, level: &str) -> Result<(), LoggingError> {
	static INIT: Once = Once::new();
	let mut result: Result<(), LoggingError> = Ok(());

	INIT.call_once(|| {
		let logs_dir = data_dir.join("logs");
		if let Err(e) = std::fs::create_dir_all(&logs_dir) {
			result = Err(e.into());
			return;
		}

		let env_filter = format!("sd_catalog_tags={level},sd_tags={level}");
		let file_appender = RollingFileAppender::new(Rotation::DAILY, logs_dir, "catalog-tags.log");

		if let Err(e) = tracing_subscriber::registry()
			.with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(env_filter)))
			.with(
				fmt::layer()
					.with_target(true)
					.with_writer(std::io::stderr),
			)
			.with(
				fmt::layer()
					.with_target(true)
					.with_thread_ids(true)
					.with_ansi(false) // No ANSI colors in log files
					.with_writer(file_appender),
			)
			.try_init()
		{
			result = Err(LoggingError::Init(e.to_string()));
		}
	});

	result
}
