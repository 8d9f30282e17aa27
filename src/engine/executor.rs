// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::Value;

use crate::config::consts::DEFAULT_POLL_INTERVAL_MS;
use crate::config::Config;
use crate::engine::cancel::{self, CancelToken, Cancelled};
use crate::engine::invocation::{Batch, Invocation};
use crate::errors::{AggregateFailure, ExecutionError, FailureStrategy, InvocationFailure};
use crate::observability::messages::executor::{BatchCompleted, BatchStarted, InvocationFailed};
use crate::observability::messages::StructuredLog;

/// Successful, non-null invocation values keyed by invocation name.
pub type Results = HashMap<String, Value>;

/// Whether a batch fans out onto threads or runs in order on the caller's thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    #[default]
    Concurrent,
    Sequential,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Concurrent => "concurrent",
            ExecutionMode::Sequential => "sequential",
        }
    }
}

/// What happened to one invocation.
#[derive(Debug)]
pub enum ExecutionResult {
    Success(Value),
    Failure(InvocationFailure),
    /// Exited early through the cooperative wait primitive
    Cancelled,
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Success(_))
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            ExecutionResult::Success(value) => Some(value),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&InvocationFailure> {
        match self {
            ExecutionResult::Failure(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Per-invocation outcome of one batch, in submission order.
#[derive(Debug)]
pub struct BatchReport {
    pub mode: ExecutionMode,
    pub entries: Vec<(String, ExecutionResult)>,
    pub duration: Duration,
}

impl BatchReport {
    pub fn get(&self, name: &str) -> Option<&ExecutionResult> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, result)| result)
    }

    pub fn failures(&self) -> impl Iterator<Item = &InvocationFailure> {
        self.entries.iter().filter_map(|(_, result)| result.failure())
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    pub fn cancelled_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, result)| matches!(result, ExecutionResult::Cancelled))
            .count()
    }

    /// Names of the invocations that returned successfully, null values included.
    pub fn succeeded(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, result)| result.is_success())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// The convenience view: successful values, with nulls left out.
    pub fn values(&self) -> Results {
        self.entries
            .iter()
            .filter_map(|(name, result)| match result {
                ExecutionResult::Success(value) if !value.is_null() => {
                    Some((name.clone(), value.clone()))
                }
                _ => None,
            })
            .collect()
    }

    /// Apply `strategy` to the report.
    ///
    /// Failures become an [`AggregateFailure`] under `Strict` and vanish under `Catch`.
    /// A batch whose only unsuccessful invocations were cancelled reports `Cancelled`,
    /// which lets an enclosing batch classify it the same way.
    pub fn into_results(self, strategy: FailureStrategy) -> Result<Results, ExecutionError> {
        let mut results = Results::new();
        let mut failures = Vec::new();
        let mut cancelled = 0usize;

        for (name, result) in self.entries {
            match result {
                ExecutionResult::Success(Value::Null) => {}
                ExecutionResult::Success(value) => {
                    results.insert(name, value);
                }
                ExecutionResult::Failure(failure) => failures.push(failure),
                ExecutionResult::Cancelled => cancelled += 1,
            }
        }

        if !failures.is_empty() {
            return match strategy {
                FailureStrategy::Strict => Err(AggregateFailure::new(failures).into()),
                FailureStrategy::Catch => Ok(results),
            };
        }
        if cancelled > 0 {
            return Err(ExecutionError::Cancelled(Cancelled));
        }
        Ok(results)
    }
}

/// Runs batches of invocations and aggregates their failures.
///
/// The executor never interrupts an invocation. It waits for every one of them, then
/// logs each failure's trace, and only then decides what to return. Under
/// `FailureStrategy::Strict` the batch's cancellation token is cancelled the moment an
/// invocation fails, so cooperative invocations (those waiting through
/// [`cancel::sleep`]) can wind down early.
///
/// # Example
/// ```
/// use the_benchtop::engine::{Executor, Invocation};
/// use serde_json::json;
///
/// let executor = Executor::concurrent();
/// let results = executor
///     .run(vec![
///         Invocation::named("voltage", || Ok(json!(3.3))),
///         Invocation::named("current", || Ok(json!(0.12))),
///     ])
///     .unwrap();
/// assert_eq!(results["voltage"], json!(3.3));
/// ```
#[derive(Debug, Clone)]
pub struct Executor {
    mode: ExecutionMode,
    failure_strategy: FailureStrategy,
    poll_interval: Duration,
}

impl Executor {
    pub fn new(mode: ExecutionMode, failure_strategy: FailureStrategy) -> Self {
        Self {
            mode,
            failure_strategy,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }

    /// Strict, concurrent executor
    pub fn concurrent() -> Self {
        Self::new(ExecutionMode::Concurrent, FailureStrategy::Strict)
    }

    /// Strict, sequential executor
    pub fn sequential() -> Self {
        Self::new(ExecutionMode::Sequential, FailureStrategy::Strict)
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.execution_mode, cfg.failure_strategy)
            .with_poll_interval(cfg.executor_options.poll_interval())
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(Duration::from_millis(1));
        self
    }

    pub fn with_failure_strategy(mut self, failure_strategy: FailureStrategy) -> Self {
        self.failure_strategy = failure_strategy;
        self
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn failure_strategy(&self) -> FailureStrategy {
        self.failure_strategy
    }

    /// Run a batch and apply the failure strategy.
    pub fn run(&self, invocations: Vec<Invocation<'_>>) -> Result<Results, ExecutionError> {
        self.run_report(invocations)?
            .into_results(self.failure_strategy)
    }

    /// Run a batch and return every invocation's outcome.
    ///
    /// The only error is a name collision, detected before anything starts.
    pub fn run_report(&self, invocations: Vec<Invocation<'_>>) -> Result<BatchReport, ExecutionError> {
        let batch = Batch::new(invocations)?;
        let token = match cancel::current() {
            Some(parent) => parent.child(self.poll_interval),
            None => CancelToken::with_poll_interval(self.poll_interval),
        };

        let invocation_count = batch.len();
        let started = BatchStarted {
            mode: self.mode.as_str(),
            invocation_count,
        };
        let span = started.span("batch");
        let _entered = span.enter();
        started.log();

        let start = Instant::now();
        let entries = match self.mode {
            ExecutionMode::Concurrent => self.execute_concurrent(batch, &token),
            ExecutionMode::Sequential => self.execute_sequential(batch, &token),
        };
        let report = BatchReport {
            mode: self.mode,
            entries,
            duration: start.elapsed(),
        };

        for failure in report.failures() {
            InvocationFailed {
                name: &failure.name,
                trace: &failure.trace(),
            }
            .log();
        }

        BatchCompleted {
            mode: self.mode.as_str(),
            invocation_count,
            failure_count: report.failure_count(),
            cancelled_count: report.cancelled_count(),
            duration: report.duration,
        }
        .log();

        Ok(report)
    }

    /// One scoped thread per invocation, all joined before returning.
    fn execute_concurrent(&self, batch: Batch<'_>, token: &CancelToken) -> Vec<(String, ExecutionResult)> {
        let cancel_on_failure = self.failure_strategy == FailureStrategy::Strict;

        thread::scope(|scope| {
            let handles: Vec<_> = batch
                .into_invocations()
                .into_iter()
                .map(|invocation| {
                    let (name, work) = invocation.into_parts();
                    let token = token.clone();
                    let handle = thread::Builder::new()
                        .name(thread_name(&name))
                        .spawn_scoped(scope, move || {
                            run_guarded(work, &token, cancel_on_failure)
                        });
                    (name, handle)
                })
                .collect();

            handles
                .into_iter()
                .map(|(name, handle)| {
                    let outcome = match handle {
                        Ok(handle) => handle
                            .join()
                            .unwrap_or_else(|payload| Err(panic_error(payload))),
                        Err(e) => {
                            token.cancel();
                            Err(anyhow::Error::new(e).context("failed to spawn worker thread"))
                        }
                    };
                    let result = classify(&name, outcome);
                    (name, result)
                })
                .collect()
        })
    }

    /// In order on the calling thread. A failure never skips later invocations.
    fn execute_sequential(&self, batch: Batch<'_>, token: &CancelToken) -> Vec<(String, ExecutionResult)> {
        let cancel_on_failure = self.failure_strategy == FailureStrategy::Strict;

        batch
            .into_invocations()
            .into_iter()
            .map(|invocation| {
                let (name, work) = invocation.into_parts();
                let outcome = run_guarded(work, token, cancel_on_failure);
                let result = classify(&name, outcome);
                (name, result)
            })
            .collect()
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::concurrent()
    }
}

/// Run `work` with `token` installed, turning a panic into an error.
fn run_guarded(
    work: Box<dyn FnOnce() -> anyhow::Result<Value> + Send + '_>,
    token: &CancelToken,
    cancel_on_failure: bool,
) -> anyhow::Result<Value> {
    let _guard = cancel::enter(token.clone());
    let outcome = panic::catch_unwind(AssertUnwindSafe(work))
        .unwrap_or_else(|payload| Err(panic_error(payload)));

    if let Err(e) = &outcome {
        if cancel_on_failure && !is_cancellation(e) {
            token.cancel();
        }
    }
    outcome
}

/// True when `error` came out of the cooperative wait primitive.
pub(crate) fn is_cancellation(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| cause.is::<Cancelled>())
}

/// OS thread names cannot hold NUL bytes; the invocation keeps its own name.
fn thread_name(name: &str) -> String {
    name.replace('\0', "\u{fffd}")
}

fn classify(name: &str, outcome: anyhow::Result<Value>) -> ExecutionResult {
    match outcome {
        Ok(value) => ExecutionResult::Success(value),
        Err(e) if is_cancellation(&e) => ExecutionResult::Cancelled,
        Err(e) => ExecutionResult::Failure(InvocationFailure::new(name, e)),
    }
}

fn panic_error(payload: Box<dyn std::any::Any + Send>) -> anyhow::Error {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    anyhow::anyhow!("invocation panicked: {}", message)
}

/// Run every invocation on its own thread and wait for all of them.
///
/// `Strict` turns any failure into [`ExecutionError::Aggregate`]; `Catch` returns the
/// successful subset. Failure traces are logged either way.
pub fn run_concurrent(
    invocations: Vec<Invocation<'_>>,
    strategy: FailureStrategy,
) -> Result<Results, ExecutionError> {
    Executor::new(ExecutionMode::Concurrent, strategy).run(invocations)
}

/// Run every invocation in order on the calling thread, with the same contract as
/// [`run_concurrent`].
pub fn run_sequential(
    invocations: Vec<Invocation<'_>>,
    strategy: FailureStrategy,
) -> Result<Results, ExecutionError> {
    Executor::new(ExecutionMode::Sequential, strategy).run(invocations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn ok(name: &str, value: Value) -> Invocation<'static> {
        Invocation::named(name, move || Ok(value))
    }

    fn failing(name: &str) -> Invocation<'static> {
        let message = format!("{} exploded", name);
        Invocation::named(name, move || Err(anyhow::anyhow!(message)))
    }

    #[test]
    fn test_empty_batch() {
        assert!(run_concurrent(vec![], FailureStrategy::Strict).unwrap().is_empty());
        assert!(run_sequential(vec![], FailureStrategy::Strict).unwrap().is_empty());
    }

    #[test]
    fn test_null_values_are_omitted() {
        let results = run_concurrent(
            vec![ok("configure", Value::Null), ok("fetch", json!([1, 2, 3]))],
            FailureStrategy::Strict,
        )
        .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results["fetch"], json!([1, 2, 3]));
    }

    #[test]
    fn test_strict_failure_counts_every_failure() {
        let err = run_concurrent(
            vec![failing("psu"), ok("sa", json!(1)), failing("scope")],
            FailureStrategy::Strict,
        )
        .unwrap_err();

        match err {
            ExecutionError::Aggregate(aggregate) => {
                assert_eq!(aggregate.len(), 2);
                assert_eq!(aggregate.names(), vec!["psu", "scope"]);
            }
            other => panic!("expected aggregate, got {:?}", other),
        }
    }

    #[test]
    fn test_catch_returns_successful_subset() {
        let results = run_sequential(
            vec![failing("psu"), ok("sa", json!(1)), ok("scope", json!("trace"))],
            FailureStrategy::Catch,
        )
        .unwrap();

        let mut names: Vec<_> = results.keys().cloned().collect();
        names.sort();
        assert_eq!(names, vec!["sa", "scope"]);
    }

    #[test]
    fn test_sequential_runs_in_order_past_failures() {
        let order = Mutex::new(Vec::new());
        let order_ref = &order;
        let record = move |label: &'static str, fail: bool| {
            Invocation::named(label, move || {
                order_ref.lock().unwrap().push(label);
                if fail {
                    anyhow::bail!("{} failed", label);
                }
                Ok(Value::Null)
            })
        };

        let err = run_sequential(
            vec![record("first", false), record("second", true), record("third", false)],
            FailureStrategy::Strict,
        )
        .unwrap_err();

        assert_eq!(err.failure_count(), 1);
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_panic_is_captured_as_failure() {
        let err = run_concurrent(
            vec![
                Invocation::named("boom", || panic!("relay stuck")),
                ok("fine", json!(true)),
            ],
            FailureStrategy::Strict,
        )
        .unwrap_err();

        match err {
            ExecutionError::Aggregate(aggregate) => {
                assert_eq!(aggregate.names(), vec!["boom"]);
                assert!(aggregate.failures[0].message().contains("relay stuck"));
            }
            other => panic!("expected aggregate, got {:?}", other),
        }
    }

    #[test]
    fn test_collision_runs_nothing() {
        let calls = AtomicUsize::new(0);
        let calls_ref = &calls;
        let counted = move |name: &'static str| {
            Invocation::named(name, move || {
                calls_ref.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Null)
            })
        };

        let err = run_concurrent(vec![counted("fetch"), counted("fetch")], FailureStrategy::Catch)
            .unwrap_err();
        assert!(matches!(err, ExecutionError::NameCollision { ref name } if name == "fetch"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_strict_failure_cancels_cooperative_siblings() {
        let start = Instant::now();
        let err = run_concurrent(
            vec![
                Invocation::named("sweep", || {
                    cancel::sleep(Duration::from_secs(10))?;
                    Ok(json!("done"))
                }),
                Invocation::named("trigger", || {
                    thread::sleep(Duration::from_millis(50));
                    anyhow::bail!("trigger lost")
                }),
            ],
            FailureStrategy::Strict,
        )
        .unwrap_err();

        assert!(start.elapsed() < Duration::from_secs(5));
        match err {
            ExecutionError::Aggregate(aggregate) => assert_eq!(aggregate.names(), vec!["trigger"]),
            other => panic!("expected aggregate, got {:?}", other),
        }
    }

    #[test]
    fn test_catch_does_not_cancel_siblings() {
        let results = run_concurrent(
            vec![
                Invocation::named("settle", || {
                    cancel::sleep(Duration::from_millis(200))?;
                    Ok(json!("settled"))
                }),
                failing("trigger"),
            ],
            FailureStrategy::Catch,
        )
        .unwrap();

        assert_eq!(results["settle"], json!("settled"));
    }

    #[test]
    fn test_report_keeps_every_outcome() {
        let report = Executor::sequential()
            .run_report(vec![ok("a", json!(1)), failing("b"), ok("c", Value::Null)])
            .unwrap();

        assert_eq!(report.entries.len(), 3);
        assert_eq!(report.succeeded(), vec!["a", "c"]);
        assert_eq!(report.failure_count(), 1);
        assert!(report.get("b").and_then(|r| r.failure()).is_some());
        assert_eq!(report.values().len(), 1);
    }

    #[test]
    fn test_nested_batch_value_is_object() {
        let results = run_sequential(
            vec![
                Invocation::concurrent(
                    "readings",
                    vec![ok("power", json!(-3.0)), ok("freq", json!(2.4e9))],
                    FailureStrategy::Strict,
                ),
                ok("label", json!("run-1")),
            ],
            FailureStrategy::Strict,
        )
        .unwrap();

        assert_eq!(results["readings"], json!({"power": -3.0, "freq": 2.4e9}));
        assert_eq!(results["label"], json!("run-1"));
    }

    #[test]
    fn test_nested_batch_inherits_cancellation() {
        let start = Instant::now();
        let err = run_concurrent(
            vec![
                Invocation::sequential(
                    "inner",
                    vec![Invocation::named("wait", || {
                        cancel::sleep(Duration::from_secs(10))?;
                        Ok(Value::Null)
                    })],
                    FailureStrategy::Strict,
                ),
                Invocation::named("fail", || {
                    thread::sleep(Duration::from_millis(20));
                    anyhow::bail!("nope")
                }),
            ],
            FailureStrategy::Strict,
        )
        .unwrap_err();

        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(err.failure_count(), 1);
    }

    #[test]
    fn test_nul_in_name_does_not_break_the_batch() {
        let results = run_concurrent(
            vec![
                Invocation::named("ch\01", || Ok(json!(1))),
                Invocation::named("ch2", || Ok(json!(2))),
            ],
            FailureStrategy::Catch,
        )
        .unwrap();

        assert_eq!(results["ch\01"], json!(1));
        assert_eq!(results.len(), 2);
    }
}
