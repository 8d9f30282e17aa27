// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for sequence binding and step execution.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// A sequence was compiled against an owner tree.
///
/// # Log Level
/// `debug!` - Diagnostic detail
///
/// # Example
/// ```
/// use the_benchtop::observability::messages::broadcast::SequenceBound;
///
/// let msg = SequenceBound {
///     sequence: "sweep",
///     step_count: 2,
///     parameter_count: 5,
/// };
///
/// tracing::debug!("{}", msg);
/// ```
pub struct SequenceBound<'a> {
    pub sequence: &'a str,
    pub step_count: usize,
    pub parameter_count: usize,
}

impl Display for SequenceBound<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Bound sequence '{}': {} steps, {} accepted argument names",
            self.sequence, self.step_count, self.parameter_count
        )
    }
}

impl StructuredLog for SequenceBound<'_> {
    fn log(&self) {
        tracing::debug!(
            sequence = self.sequence,
            step_count = self.step_count,
            parameter_count = self.parameter_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "sequence_bound",
            span_name = name,
            sequence = self.sequence,
        )
    }
}

/// A step is about to run its targets.
///
/// # Log Level
/// `info!` - Important operational event
pub struct StepStarted<'a> {
    pub sequence: &'a str,
    pub step: &'a str,
    pub target_count: usize,
}

impl Display for StepStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Sequence '{}' step '{}': running {} targets",
            self.sequence, self.step, self.target_count
        )
    }
}

impl StructuredLog for StepStarted<'_> {
    fn log(&self) {
        tracing::info!(
            sequence = self.sequence,
            step = self.step,
            target_count = self.target_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "step",
            span_name = name,
            sequence = self.sequence,
            step = self.step,
        )
    }
}

/// The whole sequence ran to completion.
///
/// # Log Level
/// `info!` - Important operational event
pub struct SequenceCompleted<'a> {
    pub sequence: &'a str,
    pub step_count: usize,
    pub duration: Duration,
}

impl Display for SequenceCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Sequence '{}' completed {} steps in {:?}",
            self.sequence, self.step_count, self.duration
        )
    }
}

impl StructuredLog for SequenceCompleted<'_> {
    fn log(&self) {
        tracing::info!(
            sequence = self.sequence,
            step_count = self.step_count,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "sequence_completed",
            span_name = name,
            sequence = self.sequence,
            duration = ?self.duration,
        )
    }
}

/// A step's batch failed; later steps are skipped.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct StepFailed<'a> {
    pub sequence: &'a str,
    pub step: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for StepFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Sequence '{}' stopped at step '{}': {}",
            self.sequence, self.step, self.error
        )
    }
}

impl StructuredLog for StepFailed<'_> {
    fn log(&self) {
        tracing::error!(
            sequence = self.sequence,
            step = self.step,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "step_failed",
            span_name = name,
            sequence = self.sequence,
            step = self.step,
        )
    }
}
