//! Bounded retry with exponential backoff for opening live subscriptions.

use std::future::Future;
use std::time::Duration;

use pioforum_store::StoreError;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Never less than one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// A policy that tries exactly once.
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay after the `failures`-th consecutive failure: base * 2^(failures-1),
    /// capped at `max_delay`.
    pub fn delay_for(&self, failures: u32) -> Duration {
        let exp = failures.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails with a permanent error, or the
    /// attempts run out. The last error is returned.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut failures = 0;
        loop {
            match op().await {
                Ok(value) => {
                    if failures > 0 {
                        debug!(what, failures, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if !is_transient(&e) => return Err(e),
                Err(e) => {
                    failures += 1;
                    if failures >= attempts {
                        warn!(what, attempts, error = %e, "giving up");
                        return Err(e);
                    }
                    let delay = self.delay_for(failures);
                    debug!(what, failures, delay_ms = delay.as_millis() as u64, error = %e, "retrying");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Missing records and uniqueness conflicts will not fix themselves.
fn is_transient(err: &StoreError) -> bool {
    !matches!(err, StoreError::NotFound | StoreError::Conflict(_))
}
