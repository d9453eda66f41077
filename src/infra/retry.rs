//! Bounded retries for read paths
//!
//! Listing reads are retried on connection trouble and per-attempt timeouts with an
//! exponential backoff. Writes are never retried here: a failed commit is reported
//! to the caller, who decides whether to reload and try again.

use crate::config::RetryConfig;
use backoff::{future::retry, ExponentialBackoffBuilder};
use sea_orm::DbErr;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ReadError {
	#[error("{operation} timed out after {timeout_ms}ms")]
	Timeout {
		operation: &'static str,
		timeout_ms: u64,
	},
	#[error(transparent)]
	Database(#[from] DbErr),
}

impl ReadError {
	/// Connection level failures and timeouts may succeed on another attempt.
	pub fn is_transient(&self) -> bool {
		match self {
			Self::Timeout { .. } => true,
			Self::Database(DbErr::Conn(_) | DbErr::ConnectionAcquire(_)) => true,
			Self::Database(_) => false,
		}
	}
}

/// Run `op` until it succeeds, fails permanently, or `config.max_attempts` is spent.
pub async fn read_with_retry<T, F, Fut>(
	config: &RetryConfig,
	operation: &'static str,
	mut op: F,
) -> Result<T, ReadError>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T, DbErr>>,
{
	let policy = ExponentialBackoffBuilder::new()
		.with_initial_interval(Duration::from_millis(config.initial_interval_ms))
		.with_max_interval(Duration::from_millis(config.max_interval_ms))
		.with_max_elapsed_time(None)
		.build();

	let max_attempts = config.max_attempts.max(1);
	let timeout_ms = config.request_timeout_ms;
	let mut attempt = 0u32;

	retry(policy, || {
		attempt += 1;
		let current = attempt;
		let fut = op();

		async move {
			let err = match tokio::time::timeout(Duration::from_millis(timeout_ms), fut).await {
				Ok(Ok(value)) => return Ok(value),
				Ok(Err(e)) => ReadError::from(e),
				Err(_) => ReadError::Timeout {
					operation,
					timeout_ms,
				},
			};

			if err.is_transient() && current < max_attempts {
				warn!(
					operation,
					attempt = current,
					max_attempts,
					error = %err,
					"Read failed, retrying"
				);
				Err(backoff::Error::transient(err))
			} else {
				Err(backoff::Error::permanent(err))
			}
		}
	})
	.await
}

#[cfg(test)]
mod tests {
	use super::*;
	use sea_orm::RuntimeErr;
	use std::sync::atomic::{AtomicU32, Ordering};

	fn fast(max_attempts: u32) -> RetryConfig {
		RetryConfig {
			max_attempts,
			initial_interval_ms: 1,
			max_interval_ms: 2,
			request_timeout_ms: 50,
		}
	}

	fn connection_lost() -> DbErr {
		DbErr::Conn(RuntimeErr::Internal("connection reset".into()))
	}

	#[tokio::test]
	async fn transient_failures_are_retried_until_success() {
		let calls = AtomicU32::new(0);

		let value = read_with_retry(&fast(3), "list", || {
			let n = calls.fetch_add(1, Ordering::SeqCst);
			async move {
				if n < 2 {
					Err(connection_lost())
				} else {
					Ok(n)
				}
			}
		})
		.await
		.unwrap();

		assert_eq!(value, 2);
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn gives_up_after_max_attempts() {
		let calls = AtomicU32::new(0);

		let err = read_with_retry(&fast(3), "list", || {
			calls.fetch_add(1, Ordering::SeqCst);
			async { Err::<(), _>(connection_lost()) }
		})
		.await
		.unwrap_err();

		assert!(matches!(err, ReadError::Database(DbErr::Conn(_))));
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn permanent_errors_are_not_retried() {
		let calls = AtomicU32::new(0);

		let err = read_with_retry(&fast(3), "list", || {
			calls.fetch_add(1, Ordering::SeqCst);
			async { Err::<(), _>(DbErr::RecordNotFound("entry".into())) }
		})
		.await
		.unwrap_err();

		assert!(!err.is_transient());
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn slow_attempts_time_out() {
		let err = read_with_retry(&fast(2), "list", || async {
			tokio::time::sleep(Duration::from_millis(500)).await;
			Ok::<_, DbErr>(())
		})
		.await
		.unwrap_err();

		assert!(matches!(
			err,
			ReadError::Timeout {
				operation: "list",
				timeout_ms: 50
			}
		));
	}
}
