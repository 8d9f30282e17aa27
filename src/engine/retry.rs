// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Retry helpers for flaky equipment calls.
//!
//! Waits between attempts go through [`cancel::sleep`], so a retry loop running inside a
//! strict batch stops as soon as a sibling invocation fails.

use std::time::{Duration, Instant};

use crate::engine::cancel;
use crate::observability::messages::executor::RetryScheduled;
use crate::observability::messages::StructuredLog;

/// How often and how patiently to retry.
///
/// The delay after attempt `n` (starting at 0) is `delay * backoff^n`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub tries: u32,
    pub delay: Duration,
    pub backoff: f64,
}

impl RetryPolicy {
    pub fn new(tries: u32) -> Self {
        Self {
            tries: tries.max(1),
            delay: Duration::ZERO,
            backoff: 1.0,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_backoff(mut self, backoff: f64) -> Self {
        self.backoff = backoff.max(1.0);
        self
    }

    /// Backoff delay before retry number `attempt + 1`, saturating instead of overflowing.
    fn delay_after(&self, attempt: u32) -> Duration {
        if self.delay.is_zero() {
            return Duration::ZERO;
        }
        let factor = self.backoff.powi(attempt.min(i32::MAX as u32) as i32);
        Duration::try_from_secs_f64(self.delay.as_secs_f64() * factor).unwrap_or(Duration::MAX)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(4)
    }
}

/// Call `f` until it succeeds, fails with an error `retryable` rejects, or runs out of tries.
///
/// The last error is returned unchanged.
pub fn retry<T, F, P>(policy: RetryPolicy, retryable: P, mut f: F) -> anyhow::Result<T>
where
    F: FnMut() -> anyhow::Result<T>,
    P: Fn(&anyhow::Error) -> bool,
{
    let mut attempt = 0u32;
    loop {
        match f() {
            Ok(value) => return Ok(value),
            Err(e) if attempt + 1 >= policy.tries || !retryable(&e) => return Err(e),
            Err(e) => {
                let delay = policy.delay_after(attempt);
                RetryScheduled {
                    attempt: attempt + 1,
                    tries: policy.tries,
                    delay,
                    error: &e,
                }
                .log();
                cancel::sleep(delay)?;
                attempt += 1;
            }
        }
    }
}

/// Like [`retry`], but bounded by wall-clock time instead of a number of tries.
///
/// At least one attempt is always made. `policy.tries` is ignored.
pub fn until_timeout<T, F, P>(
    timeout: Duration,
    policy: RetryPolicy,
    retryable: P,
    mut f: F,
) -> anyhow::Result<T>
where
    F: FnMut() -> anyhow::Result<T>,
    P: Fn(&anyhow::Error) -> bool,
{
    let deadline = Instant::now() + timeout;
    let mut attempt = 0u32;
    loop {
        match f() {
            Ok(value) => return Ok(value),
            Err(e) => {
                let delay = policy.delay_after(attempt);
                let past_deadline = Instant::now()
                    .checked_add(delay)
                    .map_or(true, |wake| wake >= deadline);
                if !retryable(&e) || past_deadline {
                    return Err(e.context(format!("gave up after {:?}", timeout)));
                }
                RetryScheduled {
                    attempt: attempt + 1,
                    tries: u32::MAX,
                    delay,
                    error: &e,
                }
                .log();
                cancel::sleep(delay)?;
                attempt += 1;
            }
        }
    }
}
