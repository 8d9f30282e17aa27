// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors produced while executing a batch of invocations.

use std::fmt;

use serde::Deserialize;
use thiserror::Error;

use crate::engine::cancel::Cancelled;

/// How a batch reports invocations that failed.
///
/// # Variants
/// * `Strict` - Any failure turns the batch into an [`AggregateFailure`] (default)
/// * `Catch` - Failures are logged and dropped; the caller receives the successful subset
///
/// Both variants wait for every invocation to finish and both log every failure trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStrategy {
    #[default]
    Strict,
    Catch,
}

impl FailureStrategy {
    /// Map the `catch` flag used by callers that think in booleans.
    pub fn from_catch(catch: bool) -> Self {
        if catch {
            FailureStrategy::Catch
        } else {
            FailureStrategy::Strict
        }
    }
}

/// One invocation's captured error.
#[derive(Error)]
#[error("invocation '{name}' failed: {error}")]
pub struct InvocationFailure {
    pub name: String,
    pub error: anyhow::Error,
}

impl InvocationFailure {
    pub fn new(name: impl Into<String>, error: anyhow::Error) -> Self {
        Self {
            name: name.into(),
            error,
        }
    }

    /// The outermost error message.
    pub fn message(&self) -> String {
        self.error.to_string()
    }

    /// Full cause chain, plus the backtrace when one was captured.
    pub fn trace(&self) -> String {
        format!("{:?}", self.error)
    }
}

impl fmt::Debug for InvocationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.trace())
    }
}

/// Every failure from one batch, in invocation order.
///
/// `Debug` renders each contributing trace, so an aggregate that escapes `main`
/// still shows which of several concurrent invocations actually failed.
#[derive(Error)]
pub struct AggregateFailure {
    pub failures: Vec<InvocationFailure>,
}

impl AggregateFailure {
    pub fn new(failures: Vec<InvocationFailure>) -> Self {
        Self { failures }
    }

    pub fn single(failure: InvocationFailure) -> Self {
        Self {
            failures: vec![failure],
        }
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Names of the failed invocations.
    pub fn names(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.failures.iter().any(|f| f.name == name)
    }
}

impl fmt::Display for AggregateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} invocation(s) failed: {}",
            self.failures.len(),
            self.names().join(", ")
        )
    }
}

impl fmt::Debug for AggregateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self)?;
        for failure in &self.failures {
            writeln!(f, "--- {} ---", failure.name)?;
            writeln!(f, "{}", failure.trace())?;
        }
        Ok(())
    }
}

/// Errors returned by the batch executor.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Two invocations in one batch resolved to the same name. Raised before anything runs.
    #[error("invocation name '{name}' is used more than once in the batch")]
    NameCollision { name: String },

    #[error(transparent)]
    Aggregate(#[from] AggregateFailure),

    /// The batch only saw invocations that exited through the cooperative wait primitive.
    #[error("batch was cancelled before its invocations finished")]
    Cancelled(#[source] Cancelled),
}

impl ExecutionError {
    /// Fold any execution error into an aggregate attributed to `name`.
    pub fn into_aggregate(self, name: &str) -> AggregateFailure {
        match self {
            ExecutionError::Aggregate(aggregate) => aggregate,
            other => AggregateFailure::single(InvocationFailure::new(name, anyhow::Error::new(other))),
        }
    }

    /// Number of failed invocations carried by this error.
    pub fn failure_count(&self) -> usize {
        match self {
            ExecutionError::Aggregate(aggregate) => aggregate.len(),
            _ => 0,
        }
    }
}
