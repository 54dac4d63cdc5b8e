//! Bounded exponential backoff for read operations.
//!
//! Only reads are wrapped. Writes go through the concurrency guard exactly once.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

use steadfast_types::models::config::RetryConfig;
use steadfast_types::DataResult;

use crate::metrics;

/// Backoff schedule: `min(base * 2^attempt, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total calls per operation, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }

    /// Delay before retrying after failed attempt number `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Per-call retry bookkeeping. Never outlives one [`with_retry`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    pub attempt: u32,
    pub max_attempts: u32,
    pub next_delay: Duration,
}

impl RetryState {
    fn new(policy: &RetryPolicy) -> Self {
        Self { attempt: 0, max_attempts: policy.max_attempts, next_delay: policy.delay_for(0) }
    }

    fn exhausted(&self) -> bool {
        self.attempt + 1 >= self.max_attempts
    }

    fn advance(&mut self, policy: &RetryPolicy) {
        self.attempt += 1;
        self.next_delay = policy.delay_for(self.attempt);
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the attempt budget runs out. The last error is returned unchanged.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut operation: F) -> DataResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DataResult<T>>,
{
    let mut state = RetryState::new(policy);

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !err.is_retryable() {
            debug!("[{}] Non-retryable error, stopping: {}", label, err);
            return Err(err);
        }
        if state.exhausted() {
            info!("[{}] Giving up after {} attempts: {}", label, state.max_attempts, err);
            return Err(err);
        }

        info!(
            "[{}] Retrying read: attempt={}/{}, delay={}ms, error={}",
            label,
            state.attempt + 2,
            state.max_attempts,
            state.next_delay.as_millis(),
            err
        );
        metrics::record_retry();
        sleep(state.next_delay).await;
        state.advance(policy);
    }
}
