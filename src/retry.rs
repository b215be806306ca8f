//! Retry logic with exponential backoff
//!
//! This module provides configurable retry logic for transient failures.
//! It implements exponential backoff with a hard delay cap and optional
//! jitter to prevent thundering herd.
//!
//! Only errors classified as retryable consume retry budget; non-retryable
//! errors fail fast after the first attempt.

use crate::config::RetryConfig;
use crate::error::{ArtifactError, Error, ProviderError};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (network timeouts, rate limits, transient server
/// errors) should return `true`. Permanent failures (invalid request,
/// malformed response, corrupt state) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

/// Implementation of IsRetryable for our Error type
impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            // Network errors are generally retryable
            Error::Network(e) => {
                if e.is_timeout() || e.is_connect() {
                    return true;
                }
                // Rate limits and transient server errors
                e.status()
                    .map(|s| s.as_u16() == 408 || s.as_u16() == 429 || s.is_server_error())
                    .unwrap_or(false)
            }
            // I/O errors can be retryable in some cases
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
            ),
            // Provider HTTP errors follow the same status classification
            Error::Provider(ProviderError::Api { status, .. }) => {
                *status == 408 || *status == 429 || *status >= 500
            }
            // A malformed envelope will not improve on retry
            Error::Provider(ProviderError::MalformedResponse(_)) => false,
            // Artifact request/payload errors are permanent
            Error::Artifact(ArtifactError::InvalidRequest(_)) => false,
            Error::Artifact(ArtifactError::MissingData) => false,
            Error::Artifact(ArtifactError::Decode(_)) => false,
            // State and configuration errors are permanent
            Error::Config { .. } => false,
            Error::CorruptCatalog { .. } => false,
            Error::Persistence { .. } => false,
            Error::Serialization(_) => false,
            // Cancellation must not trigger retries
            Error::Cancelled => false,
            // Unknown errors - be conservative and don't retry
            Error::Other(_) => false,
        }
    }
}

/// Execute an async operation with exponential backoff retry logic
///
/// Makes at most `config.max_attempts` total attempts (clamped to at least
/// one). Each retryable failure waits the current backoff delay before the
/// next attempt; the delay grows by `backoff_multiplier` up to `max_delay`.
/// Non-retryable errors are returned immediately without consuming retry
/// budget.
///
/// Cancellation: an in-flight attempt always runs to completion, but a
/// pending backoff wait is abandoned when `cancel` fires and the last error
/// is returned as terminal.
pub async fn retry_with_backoff<F, Fut, T, E>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut delay = config.initial_delay;

    for attempt in 1..=max_attempts {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                tracing::warn!(
                    error = %e,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis(),
                    "operation failed, retrying"
                );

                let jittered_delay = if config.jitter { add_jitter(delay) } else { delay };

                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::warn!(attempt, "cancelled during backoff, giving up");
                        return Err(e);
                    }
                    _ = tokio::time::sleep(jittered_delay) => {}
                }

                let next_delay =
                    Duration::from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier);
                delay = next_delay.min(config.max_delay);
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt,
                        "operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::error!(error = %e, "operation failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }

    unreachable!("loop returns on the final attempt")
}

/// Add random jitter to a delay to prevent thundering herd
///
/// Jitter is uniformly distributed between 0% and 100% of the delay, so the
/// actual delay is between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    let jittered_secs = delay.as_secs_f64() * (1.0 + jitter_factor);
    Duration::from_secs_f64(jittered_secs)
}
