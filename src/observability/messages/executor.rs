// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for batch execution events.
//!
//! This module contains message types for logging events related to:
//! * Batch start and completion
//! * Captured invocation failures (with their full trace)
//! * Retry scheduling

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// Batch execution started.
///
/// # Log Level
/// `debug!` - Batches are frequent; one per step and per owner node
///
/// # Example
/// ```
/// use the_benchtop::observability::messages::executor::BatchStarted;
///
/// let msg = BatchStarted {
///     mode: "concurrent",
///     invocation_count: 4,
/// };
///
/// tracing::debug!("{}", msg);
/// ```
pub struct BatchStarted<'a> {
    pub mode: &'a str,
    pub invocation_count: usize,
}

impl Display for BatchStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Starting {} batch of {} invocations",
            self.mode, self.invocation_count
        )
    }
}

impl StructuredLog for BatchStarted<'_> {
    fn log(&self) {
        tracing::debug!(
            mode = self.mode,
            invocation_count = self.invocation_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "batch",
            span_name = name,
            mode = self.mode,
            invocation_count = self.invocation_count,
        )
    }
}

/// Batch finished; every invocation has returned.
///
/// # Log Level
/// `debug!` on full success, `warn!` when anything failed or was cancelled
pub struct BatchCompleted<'a> {
    pub mode: &'a str,
    pub invocation_count: usize,
    pub failure_count: usize,
    pub cancelled_count: usize,
    pub duration: Duration,
}

impl Display for BatchCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} batch of {} invocations finished in {:?}: {} failed, {} cancelled",
            self.mode, self.invocation_count, self.duration, self.failure_count, self.cancelled_count
        )
    }
}

impl StructuredLog for BatchCompleted<'_> {
    fn log(&self) {
        if self.failure_count > 0 || self.cancelled_count > 0 {
            tracing::warn!(
                mode = self.mode,
                invocation_count = self.invocation_count,
                failure_count = self.failure_count,
                cancelled_count = self.cancelled_count,
                duration_ms = self.duration.as_millis() as u64,
                "{}", self
            );
        } else {
            tracing::debug!(
                mode = self.mode,
                invocation_count = self.invocation_count,
                duration_ms = self.duration.as_millis() as u64,
                "{}", self
            );
        }
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "batch_completed",
            span_name = name,
            mode = self.mode,
            invocation_count = self.invocation_count,
            failure_count = self.failure_count,
            duration = ?self.duration,
        )
    }
}

/// An invocation failed; carries the formatted trace.
///
/// Emitted at aggregation for every failure, whatever the batch's failure strategy.
///
/// # Log Level
/// `error!` - Failure requiring attention
///
/// # Example
/// ```
/// use the_benchtop::observability::messages::executor::InvocationFailed;
///
/// let msg = InvocationFailed {
///     name: "sa_fetch",
///     trace: "timeout waiting for trigger",
/// };
///
/// tracing::error!("{}", msg);
/// ```
pub struct InvocationFailed<'a> {
    pub name: &'a str,
    pub trace: &'a str,
}

impl Display for InvocationFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Invocation '{}' failed:\n{}", self.name, self.trace)
    }
}

impl StructuredLog for InvocationFailed<'_> {
    fn log(&self) {
        tracing::error!(
            invocation = self.name,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "invocation_failed",
            span_name = name,
            invocation = self.name,
        )
    }
}

/// A retryable error occurred and another attempt is scheduled.
///
/// # Log Level
/// `warn!` - Recoverable problem
pub struct RetryScheduled<'a> {
    pub attempt: u32,
    pub tries: u32,
    pub delay: Duration,
    pub error: &'a anyhow::Error,
}

impl Display for RetryScheduled<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        if self.tries == u32::MAX {
            write!(
                f,
                "Attempt {} failed ({}); retrying in {:?}",
                self.attempt, self.error, self.delay
            )
        } else {
            write!(
                f,
                "Attempt {}/{} failed ({}); retrying in {:?}",
                self.attempt, self.tries, self.error, self.delay
            )
        }
    }
}

impl StructuredLog for RetryScheduled<'_> {
    fn log(&self) {
        tracing::warn!(
            attempt = self.attempt,
            delay_ms = self.delay.as_millis() as u64,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "retry",
            span_name = name,
            attempt = self.attempt,
            delay = ?self.delay,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_completed_display() {
        let msg = BatchCompleted {
            mode: "sequential",
            invocation_count: 3,
            failure_count: 1,
            cancelled_count: 0,
            duration: Duration::from_millis(5),
        };
        assert_eq!(
            msg.to_string(),
            "sequential batch of 3 invocations finished in 5ms: 1 failed, 0 cancelled"
        );
    }

    #[test]
    fn test_retry_display_without_limit() {
        let error = anyhow::anyhow!("busy");
        let msg = RetryScheduled {
            attempt: 2,
            tries: u32::MAX,
            delay: Duration::from_millis(10),
            error: &error,
        };
        assert_eq!(msg.to_string(), "Attempt 2 failed (busy); retrying in 10ms");
    }
}
