//! Backoff wrapper for per-file storage operations.

use crate::config::RetryConfig;
use blobsync_storage::StorageError;
use std::fmt::Display;
use std::future::Future;
use tracing::debug;

/// Errors that know whether repeating the operation may help.
pub trait Retryable: Display {
    /// Returns true if the operation should be attempted again.
    fn is_retryable(&self) -> bool;
}

impl Retryable for StorageError {
    fn is_retryable(&self) -> bool {
        StorageError::is_retryable(self)
    }
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or
/// `config.max_attempts()` attempts are spent.
///
/// The final error is returned unchanged.
pub async fn with_retry<T, E, F, Fut>(
    config: &RetryConfig,
    operation: &str,
    mut op: F,
) -> Result<T, E>
where
    E: Retryable,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < config.max_attempts() => {
                attempt += 1;
                let delay = config.delay_for_attempt(attempt);
                debug!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
