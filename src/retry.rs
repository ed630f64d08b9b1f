//! Retry with exponential back-off and jitter for inference calls.
//!
//! One [`RetryPolicy`] value is shared by per-video extraction and the
//! synthesis call. Only [`InferenceError::is_retryable`] errors are retried;
//! everything else is returned after the first attempt.

use crate::inference::InferenceError;
use std::future::Future;
use std::time::Duration;

/// How often and how patiently to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub backoff_base: Duration,
    /// Upper bound for any single delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_secs(2),
            max_backoff: Duration::from_secs(60),
        }
    }
}

/// The last error of a call that did not succeed, and how many attempts ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryFailure {
    pub error: InferenceError,
    pub attempts: u32,
}

impl RetryPolicy {
    /// Policy with no delays, for tests.
    #[cfg(test)]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff_base: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Nominal delay before retry number `retry` (1-based), without jitter.
    ///
    /// | Retry | Delay                      |
    /// |-------|----------------------------|
    /// | 1     | base × 2⁰                  |
    /// | 2     | base × 2¹                  |
    /// | 3     | base × 2²                  |
    ///
    /// Capped at `max_backoff`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32 << retry.saturating_sub(1).min(16);
        self.backoff_base
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Runs `operation` until it succeeds, fails non-retryably, or attempts run out.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, RetryFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, InferenceError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if !error.is_retryable() || attempt >= max_attempts {
                        return Err(RetryFailure {
                            error,
                            attempts: attempt,
                        });
                    }
                    let delay = jittered(self.delay_for(attempt));
                    #[allow(clippy::cast_possible_truncation)]
                    let delay_ms = delay.as_millis() as u64;
                    tracing::warn!(
                        target_label = label,
                        attempt,
                        max_attempts,
                        delay_ms,
                        error = %error,
                        "inference call failed, retrying after back-off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Applies ±25 % jitter.
fn jittered(delay: Duration) -> Duration {
    if delay.is_zero() {
        return delay;
    }
    delay.mul_f64(rand::random::<f64>() * 0.5 + 0.75)
}
