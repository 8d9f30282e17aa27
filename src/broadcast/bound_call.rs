// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use crate::broadcast::routing::RoutingTable;
use crate::engine::{BatchReport, Executor, Invocation, Results};
use crate::errors::{BindingError, SequenceError};
use crate::observability::messages::broadcast::{SequenceCompleted, StepFailed, StepStarted};
use crate::observability::messages::StructuredLog;
use crate::traits::NamedArgs;

/// Receives every step's full batch report, successes and failures alike.
///
/// Observers run on the invoking thread after the step's batch finished and before
/// the failure strategy is applied, so a failing step is reported too.
pub trait StepObserver: Send + Sync {
    fn step_completed(&self, sequence: &str, step: &str, report: &BatchReport);
}

/// Results of one sequence call: each step's results, in step order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SequenceResults(Vec<(String, Results)>);

impl SequenceResults {
    pub fn get(&self, step: &str) -> Option<&Results> {
        self.0
            .iter()
            .find(|(name, _)| name == step)
            .map(|(_, results)| results)
    }

    pub fn steps(&self) -> Vec<&str> {
        self.0.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, Results)> {
        self.0.iter()
    }

    pub fn into_inner(self) -> Vec<(String, Results)> {
        self.0
    }
}

/// A sequence bound to the resources of an owner tree.
///
/// Calls route named arguments through the table built at bind time, then run the
/// steps strictly in order; each step's targets run as one batch through the
/// configured executor. The first failing step ends the call.
pub struct BoundCall {
    sequence: String,
    table: RoutingTable,
    executor: Executor,
    observers: Vec<Arc<dyn StepObserver>>,
    last: Mutex<Option<SequenceResults>>,
}

impl BoundCall {
    pub(crate) fn new(sequence: String, table: RoutingTable) -> Self {
        Self {
            sequence,
            table,
            executor: Executor::default(),
            observers: Vec::new(),
            last: Mutex::new(None),
        }
    }

    pub fn with_executor(mut self, executor: Executor) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn StepObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn sequence(&self) -> &str {
        &self.sequence
    }

    /// Every argument name a call accepts, plain and step-scoped.
    pub fn parameters(&self) -> Vec<&str> {
        self.table.parameters()
    }

    /// Target names of `step`, or `None` for an unknown step.
    pub fn targets(&self, step: &str) -> Option<Vec<&str>> {
        self.table
            .steps()
            .iter()
            .find(|s| s.name == step)
            .map(|s| s.targets.iter().map(|t| t.name.as_str()).collect())
    }

    /// Results of the last call that completed every step.
    pub fn last_result(&self) -> Option<SequenceResults> {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Route `args` and run the steps in order.
    ///
    /// Argument errors are reported before the first step runs.
    pub fn invoke(&self, args: &NamedArgs) -> Result<SequenceResults, SequenceError> {
        let start = Instant::now();
        let routed = self.table.route(args)?;
        let mut results = Vec::with_capacity(routed.len());

        for (step, step_args) in self.table.steps().iter().zip(routed) {
            StepStarted {
                sequence: &self.sequence,
                step: &step.name,
                target_count: step.targets.len(),
            }
            .log();

            let invocations = step
                .targets
                .iter()
                .zip(step_args)
                .map(|(target, target_args)| {
                    Invocation::operation(
                        target.name.clone(),
                        target.resource.clone(),
                        target.reference.operation.clone(),
                        target_args,
                    )
                })
                .collect();

            let outcome = self.executor.run_report(invocations).and_then(|report| {
                for observer in &self.observers {
                    observer.step_completed(&self.sequence, &step.name, &report);
                }
                report.into_results(self.executor.failure_strategy())
            });

            match outcome {
                Ok(step_results) => results.push((step.name.clone(), step_results)),
                Err(source) => {
                    StepFailed {
                        sequence: &self.sequence,
                        step: &step.name,
                        error: &source,
                    }
                    .log();
                    return Err(SequenceError::Step {
                        step: step.name.clone(),
                        source,
                    });
                }
            }
        }

        SequenceCompleted {
            sequence: &self.sequence,
            step_count: results.len(),
            duration: start.elapsed(),
        }
        .log();

        let results = SequenceResults(results);
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(results.clone());
        Ok(results)
    }

    /// Check that `args` route cleanly without running anything.
    pub fn validate(&self, args: &NamedArgs) -> Result<(), BindingError> {
        self.table.route(args).map(|_| ())
    }
}
