// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{anyhow, bail};
use serde_json::Value;

use crate::engine::cancel;
use crate::traits::{NamedArgs, Resource, Signature};

type Handler = Arc<dyn Fn(&NamedArgs) -> anyhow::Result<Value> + Send + Sync>;

/// In-memory instrument with scripted operations and injectable faults.
///
/// Opening waits through [`cancel::sleep`], so a sibling failure in the same batch cuts a
/// slow open short. Every open, close and call attempt is counted, successful or not.
///
/// # Example
/// ```
/// use serde_json::json;
/// use the_benchtop::backends::simulated::SimulatedInstrument;
/// use the_benchtop::traits::{Resource, Signature};
///
/// let psu = SimulatedInstrument::new("psu")
///     .with_echo(Signature::new("set_output").param("voltage"));
/// psu.open().unwrap();
///
/// let args = json!({ "voltage": 3.3 }).as_object().unwrap().clone();
/// assert_eq!(psu.call("set_output", &args).unwrap(), json!({ "voltage": 3.3 }));
/// ```
pub struct SimulatedInstrument {
    name: String,
    open: AtomicBool,
    open_delay: Duration,
    open_failure: Option<String>,
    close_failure: Option<String>,
    operations: Vec<(Signature, Handler)>,
    opens: AtomicUsize,
    closes: AtomicUsize,
    calls: Mutex<Vec<(String, NamedArgs)>>,
}

impl SimulatedInstrument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            open: AtomicBool::new(false),
            open_delay: Duration::ZERO,
            open_failure: None,
            close_failure: None,
            operations: Vec::new(),
            opens: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Time an open takes before it succeeds or fails
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    pub fn failing_open(mut self, reason: impl Into<String>) -> Self {
        self.open_failure = Some(reason.into());
        self
    }

    pub fn failing_close(mut self, reason: impl Into<String>) -> Self {
        self.close_failure = Some(reason.into());
        self
    }

    /// Expose an operation backed by `handler`.
    pub fn with_operation<F>(mut self, signature: Signature, handler: F) -> Self
    where
        F: Fn(&NamedArgs) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.operations.push((signature, Arc::new(handler)));
        self
    }

    /// Expose an operation that returns the arguments it received.
    pub fn with_echo(self, signature: Signature) -> Self {
        self.with_operation(signature, |args| Ok(Value::Object(args.clone())))
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn call_count(&self) -> usize {
        self.lock_calls().len()
    }

    /// Calls received so far, in arrival order
    pub fn calls(&self) -> Vec<(String, NamedArgs)> {
        self.lock_calls().clone()
    }

    fn lock_calls(&self) -> std::sync::MutexGuard<'_, Vec<(String, NamedArgs)>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Resource for SimulatedInstrument {
    fn open(&self) -> anyhow::Result<()> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if !self.open_delay.is_zero() {
            cancel::sleep(self.open_delay)?;
        }
        if let Some(reason) = &self.open_failure {
            bail!("{} failed to open: {}", self.name, reason);
        }
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) -> anyhow::Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = &self.close_failure {
            bail!("{} failed to close: {}", self.name, reason);
        }
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn operations(&self) -> Vec<Signature> {
        self.operations.iter().map(|(sig, _)| sig.clone()).collect()
    }

    fn call(&self, name: &str, args: &NamedArgs) -> anyhow::Result<Value> {
        let handler = self
            .operations
            .iter()
            .find(|(sig, _)| sig.name == name)
            .map(|(_, handler)| handler.clone())
            .ok_or_else(|| anyhow!("{} has no operation '{}'", self.name, name))?;

        self.lock_calls().push((name.to_string(), args.clone()));
        if !self.is_open() {
            bail!("{} is not open", self.name);
        }
        handler(args)
    }
}

impl fmt::Debug for SimulatedInstrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulatedInstrument")
            .field("name", &self.name)
            .field("open", &self.is_open())
            .finish()
    }
}
