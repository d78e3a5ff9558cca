//! Bounded retry with exponential backoff.

use std::future::Future;
use std::num::NonZeroU32;
use std::time::Duration;

use tracing::warn;

use super::error::UpstreamError;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BACKOFF_UNIT: Duration = Duration::from_secs(1);
const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);
// 2^16 units is already far past any sane schedule.
const MAX_BACKOFF_EXPONENT: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: NonZeroU32,
    /// Base of the exponential schedule.
    pub backoff_unit: Duration,
    /// Upper bound for a single attempt.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: NonZeroU32::new(DEFAULT_MAX_ATTEMPTS).unwrap_or(NonZeroU32::MIN),
            backoff_unit: DEFAULT_BACKOFF_UNIT,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }
}

impl RetryPolicy {
    /// Sleep after failed attempt `attempt` (1-based): `2^attempt` units.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(MAX_BACKOFF_EXPONENT);
        self.backoff_unit.saturating_mul(1_u32 << exponent)
    }
}

/// Run `operation` until it succeeds, fails permanently, or the attempt
/// budget is spent. Each attempt is bounded by `policy.attempt_timeout`;
/// a timeout counts as a transient failure.
///
/// The closure receives the 1-based attempt number.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, UpstreamError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, UpstreamError>>,
{
    let max_attempts = policy.max_attempts.get();
    let mut attempt = 1;

    loop {
        let result = match tokio::time::timeout(policy.attempt_timeout, operation(attempt)).await {
            Ok(result) => result,
            Err(_) => Err(UpstreamError::Timeout(policy.attempt_timeout)),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_transient() || attempt >= max_attempts => return Err(err),
            Err(err) => {
                let delay = policy.delay_after(attempt);
                warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "upstream attempt failed; backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
