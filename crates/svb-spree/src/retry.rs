//! Bounded retry with exponential backoff for transient Spree errors.
//!
//! Catalog listing requests are idempotent per `(page, per_page)`, so
//! retrying a failed page fetch preserves the walk's ordering guarantees.
//! Non-retriable errors (parse failures, 404s, other 4xx statuses) are
//! propagated immediately.

use std::future::Future;
use std::time::Duration;

use crate::error::SpreeError;

/// Returns `true` if `err` represents a transient condition that should be
/// retried after a backoff delay: network-level failures, rate limiting, and
/// 5xx responses. Client errors and malformed responses are hard stops.
fn is_retriable(err: &SpreeError) -> bool {
    match err {
        SpreeError::RateLimited { .. } | SpreeError::Http(_) => true,
        SpreeError::UnexpectedStatus { status, .. } => *status >= 500,
        _ => false,
    }
}

/// Executes `operation` with exponential backoff retries on transient errors.
///
/// On a retriable error the function sleeps for `backoff_base_secs * 2^attempt`
/// seconds and tries again, up to `max_retries` additional attempts after the
/// first try. If all retries are exhausted the last error is returned.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_secs: u64,
    mut operation: F,
) -> Result<T, SpreeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SpreeError>>,
{
    let mut last_err;
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                last_err = err;
            }
        }

        // Exponential backoff: base * 2^attempt seconds, capped against overflow.
        let delay_secs = backoff_base_secs.saturating_mul(1u64 << attempt.min(62));
        tracing::warn!(
            attempt,
            max_retries,
            delay_secs,
            error = %last_err,
            "transient Spree error, retrying after backoff"
        );
        tokio::time::sleep(Duration::from_secs(delay_secs)).await;
        attempt += 1;
    }
}
