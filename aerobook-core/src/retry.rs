//! Automatic retry for the transient booking failures.
//!
//! Only errors with [`BookingError::is_retryable`] are retried
//! (`LockUnavailable`, `SeatConflict`); everything else returns immediately.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{BookingError, BookingResult};

/// Exponential backoff settings.
///
/// # Default Values
///
/// - `max_retries`: 2
/// - `initial_delay`: 50ms
/// - `max_delay`: 2 seconds
/// - `multiplier`: 2.0
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// delay = initial_delay * multiplier^attempt, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let factor = self.multiplier.powi(attempt.min(i32::MAX as usize) as i32);
        let delay_ms = self.initial_delay.as_millis() as f64 * factor;
        let delay = Duration::from_millis(delay_ms.min(u64::MAX as f64) as u64);
        delay.min(self.max_delay)
    }
}

/// Runs `operation`, retrying retryable failures according to `policy`.
pub async fn retry_transient<F, Fut, T>(policy: &RetryPolicy, mut operation: F) -> BookingResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BookingError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    info!(attempt, "Booking operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if err.is_retryable() && attempt < policy.max_retries => {
                let delay = policy.delay_for_attempt(attempt);
                warn!(attempt, ?delay, code = %err.code(), "Transient booking failure, retrying");
                sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
