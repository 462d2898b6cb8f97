//! Bounded retries for capability calls
//!
//! Only transient failures are retried. Each attempt is bounded by
//! `call_timeout`, and an elapsed timeout counts as transient. Backoff sleeps
//! end early when the cancellation token fires.

use crate::types::{CapabilityError, CapabilityResult};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one (default: 3)
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
    /// Scale each delay by a random factor in [0.5, 1.0)
    pub jitter: bool,
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_factor: 2.0,
            jitter: true,
            call_timeout: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    /// A policy that never waits; handy for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_factor: 1.0,
            jitter: false,
            call_timeout: Duration::from_secs(30),
        }
    }

    /// Delay before retry number `retry` (0-based), before jitter.
    pub fn base_delay(&self, retry: u32) -> Duration {
        let factor = self.backoff_factor.powi(retry as i32);
        let millis = (self.initial_delay.as_millis() as f64 * factor)
            .min(self.max_delay.as_millis() as f64);
        Duration::from_millis(millis as u64)
    }

    fn delay(&self, retry: u32) -> Duration {
        let base = self.base_delay(retry);
        if self.jitter && !base.is_zero() {
            base.mul_f64(rand::rng().random_range(0.5..1.0))
        } else {
            base
        }
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// Cancellation during a backoff sleep returns the last error seen.
    pub async fn run<T, F, Fut>(
        &self,
        capability: &str,
        cancel: &CancellationToken,
        mut op: F,
    ) -> CapabilityResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CapabilityResult<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let outcome = match tokio::time::timeout(self.call_timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(CapabilityError::transient(
                    capability,
                    format!("call timed out after {:?}", self.call_timeout),
                )),
            };

            let err = match outcome {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_transient() || attempt >= attempts => return Err(err),
                Err(err) => err,
            };

            let delay = self.delay(attempt - 1);
            tracing::warn!(
                capability,
                attempt,
                max_attempts = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Transient capability failure, retrying"
            );

            tokio::select! {
                _ = cancel.cancelled() => return Err(err),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
