//! Retry with exponential back-off and jitter for backend HTTP calls.
//!
//! Only transport failures and 5xx responses are retried. Rate-limit,
//! not-found and authentication outcomes are surfaced immediately: the
//! orchestrator records them (or re-authenticates) instead.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::ScraperError;

/// Ceiling for a single back-off sleep.
const MAX_DELAY: Duration = Duration::from_secs(60);

/// Transport faults and 5xx answers; everything else is a definitive
/// answer from the platform.
pub(crate) fn is_retriable(err: &ScraperError) -> bool {
    match err {
        ScraperError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        ScraperError::UnexpectedStatus { status, .. } => (500..600).contains(status),
        ScraperError::Authentication { .. }
        | ScraperError::NotFound { .. }
        | ScraperError::RateLimited { .. }
        | ScraperError::Deserialize { .. }
        | ScraperError::InvalidBaseUrl { .. } => false,
    }
}

/// Sleep before retry number `retry` (1-based): `base_ms * 2^(retry-1)`,
/// capped at [`MAX_DELAY`], then scaled by a random factor in `[0.75, 1.25]`.
fn backoff_delay(base_ms: u64, retry: u32) -> Duration {
    let doublings = retry.saturating_sub(1).min(16);
    let nominal = Duration::from_millis(base_ms.saturating_mul(1 << doublings)).min(MAX_DELAY);
    nominal.mul_f64(rand::rng().random_range(0.75..=1.25))
}

/// Runs `operation`, retrying up to `max_retries` times while it fails with a
/// [retriable](is_retriable) error. The last error is returned unchanged.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, ScraperError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ScraperError>>,
{
    let mut retry = 0u32;
    let mut outcome = operation().await;
    while let Err(err) = &outcome {
        if retry == max_retries || !is_retriable(err) {
            break;
        }
        retry += 1;
        let delay = backoff_delay(backoff_base_ms, retry);
        tracing::warn!(
            retry,
            max_retries,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "transient backend error, backing off"
        );
        tokio::time::sleep(delay).await;
        outcome = operation().await;
    }
    outcome
}
