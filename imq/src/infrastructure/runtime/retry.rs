// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Retry Policy
//!
//! Exponential backoff with a cap and optional jitter for gateway-facing
//! calls. Delay for attempt `n` (0-indexed) is `min(base_delay * 2^n,
//! max_delay)`, jittered by a configurable factor to avoid thundering herds.
//!
//! Only errors classified retriable by
//! [`MergeQueueError::is_retriable`] are re-run: transient network failures,
//! timeouts, rate-limit signals, and 5xx responses. Authentication failures,
//! other 4xx, validation errors, and cancellations surface immediately. The
//! last error is surfaced when attempts are exhausted.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use imq_domain::MergeQueueError;

/// Exponential-backoff retry executor.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    /// Jitter factor: 0.0 disables, 0.5 means `delay * (0.5..1.5)`.
    jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            jitter: 0.5,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
            jitter: 0.5,
        }
    }

    /// Disables jitter (deterministic delays, used by tests).
    pub fn without_jitter(mut self) -> Self {
        self.jitter = 0.0;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Backoff before retry attempt `n` (0-indexed), capped and jittered.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let delay = self
            .base_delay
            .saturating_mul(2_u32.saturating_pow(exponent))
            .min(self.max_delay);

        if self.jitter > 0.0 {
            apply_jitter(delay, self.jitter)
        } else {
            delay
        }
    }

    /// Runs `operation` up to `1 + max_retries` times. The closure receives
    /// the attempt number starting at 0.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, MergeQueueError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, MergeQueueError>>,
    {
        let mut attempt = 0;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_retriable() && attempt < self.max_retries => {
                    let delay = self.delay_for_attempt(attempt);
                    debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "retriable failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    if error.is_retriable() {
                        warn!(attempts = attempt + 1, error = %error, "retries exhausted");
                    }
                    return Err(error);
                }
            }
        }
    }
}

/// Jitter factor of 0.5 maps a delay to `delay * (0.5..1.5)`.
fn apply_jitter(delay: Duration, jitter: f64) -> Duration {
    let random: f64 = rand::rng().random();
    let factor = 1.0 - jitter + (random * 2.0 * jitter);
    let millis = (delay.as_millis() as f64 * factor).round() as u64;
    Duration::from_millis(millis)
}
