//! Transport retry with exponential backoff and jitter
//!
//! Used by store adapters around individual requests. The sync engine itself
//! never retries; a request that still fails after the adapter's attempts
//! surfaces to the engine as-is.

use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::{Error, Result};

/// Retry a fallible async operation with exponential backoff
///
/// `operation` is re-invoked while it fails with an error accepted by
/// `is_retryable`, up to `config.max_attempts` attempts in total.
///
/// # Example
/// ```ignore
/// let page = retry_with_backoff(
///     &config,
///     "list_objects",
///     || async { store.list_page(bucket, token.clone()).await },
///     is_retryable_error,
/// )
/// .await?;
/// ```
pub async fn retry_with_backoff<T, F, Fut, R>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
    is_retryable: R,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
    R: Fn(&Error) -> bool,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if attempt >= max_attempts || !is_retryable(&e) {
                    return Err(e);
                }

                let backoff = calculate_backoff(config, attempt);
                tracing::debug!(
                    operation = operation_name,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "Retrying after transient error"
                );

                tokio::time::sleep(backoff).await;
            }
        }
    }
}

/// Backoff before the next attempt: `initial * 2^(attempt-1)`, capped, plus jitter
fn calculate_backoff(config: &RetryConfig, attempt: u32) -> Duration {
    let base_ms = config
        .initial_backoff_ms
        .saturating_mul(1u64 << (attempt.saturating_sub(1)).min(10));
    let capped_ms = base_ms.min(config.max_backoff_ms);

    Duration::from_millis(capped_ms + jitter(capped_ms))
}

/// Pseudo-random value in `0..max` taken from the clock's sub-second part
fn jitter(max: u64) -> u64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos() as u64;
    nanos % max.max(1)
}

/// Whether an error is worth another attempt
///
/// Sync context wrappers are looked through; only the transport cause counts.
pub fn is_retryable_error(error: &Error) -> bool {
    match error.root_cause() {
        Error::Network(msg) => {
            let msg = msg.to_lowercase();
            [
                "timeout",
                "timed out",
                "connection reset",
                "connection refused",
                "dispatch",
                "500",
                "503",
                "internalerror",
                "service unavailable",
                "slowdown",
                "slow down",
                "throttl",
                "too many requests",
                "429",
                "requesttimeout",
            ]
            .iter()
            .any(|needle| msg.contains(needle))
        }
        Error::Io(e) => matches!(
            e.kind(),
            std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::TimedOut
                | std::io::ErrorKind::Interrupted
        ),
        Error::Auth(_)
        | Error::NotFound(_)
        | Error::Conflict(_)
        | Error::Config(_)
        | Error::UnsupportedRegion(_)
        | Error::LocalIo { .. }
        | Error::General(_) => false,
        Error::RemoteUnavailable { .. } | Error::Upload { .. } | Error::Delete { .. } => false,
    }
}
