// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Deferred units of work and the batches they are submitted in.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::engine::executor::{run_concurrent, run_sequential};
use crate::errors::{ExecutionError, FailureStrategy};
use crate::traits::{NamedArgs, Resource};

type Work<'a> = Box<dyn FnOnce() -> anyhow::Result<Value> + Send + 'a>;

/// One named, not-yet-evaluated call.
///
/// The closure captures whatever arguments the call needs. Its display name is derived
/// from the closure's type unless one is given explicitly: a named function keeps its own
/// name, a closure takes the name of the function it was written in. Two closures written
/// in the same function therefore collide and need [`Invocation::with_name`].
pub struct Invocation<'a> {
    name: String,
    work: Work<'a>,
}

impl<'a> Invocation<'a> {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<Value> + Send + 'a,
    {
        Self {
            name: derive_name(std::any::type_name::<F>()),
            work: Box::new(f),
        }
    }

    pub fn named<F>(name: impl Into<String>, f: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<Value> + Send + 'a,
    {
        Self {
            name: name.into(),
            work: Box::new(f),
        }
    }

    /// Override the derived name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// A call to `operation` on `resource` with the given named arguments.
    pub fn operation(
        name: impl Into<String>,
        resource: Arc<dyn Resource>,
        operation: impl Into<String>,
        args: NamedArgs,
    ) -> Invocation<'static> {
        let operation = operation.into();
        Invocation::named(name, move || resource.call(&operation, &args))
    }

    /// A nested batch run concurrently; its value is an object of the nested results.
    pub fn concurrent(
        name: impl Into<String>,
        invocations: Vec<Invocation<'a>>,
        strategy: FailureStrategy,
    ) -> Self {
        Self::named(name, move || {
            let results = run_concurrent(invocations, strategy)?;
            Ok(Value::Object(results.into_iter().collect()))
        })
    }

    /// A nested batch run one at a time; its value is an object of the nested results.
    pub fn sequential(
        name: impl Into<String>,
        invocations: Vec<Invocation<'a>>,
        strategy: FailureStrategy,
    ) -> Self {
        Self::named(name, move || {
            let results = run_sequential(invocations, strategy)?;
            Ok(Value::Object(results.into_iter().collect()))
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn into_parts(self) -> (String, Work<'a>) {
        (self.name, self.work)
    }
}

impl fmt::Debug for Invocation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation").field("name", &self.name).finish()
    }
}

/// A set of invocations whose names are known to be unique.
#[derive(Debug)]
pub struct Batch<'a> {
    invocations: Vec<Invocation<'a>>,
}

impl<'a> Batch<'a> {
    /// Validate names. Fails before any invocation has run.
    pub fn new(invocations: Vec<Invocation<'a>>) -> Result<Self, ExecutionError> {
        let mut seen = HashSet::new();
        for invocation in &invocations {
            if !seen.insert(invocation.name.as_str()) {
                return Err(ExecutionError::NameCollision {
                    name: invocation.name.clone(),
                });
            }
        }
        Ok(Self { invocations })
    }

    pub fn len(&self) -> usize {
        self.invocations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invocations.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.invocations.iter().map(|i| i.name()).collect()
    }

    pub(crate) fn into_invocations(self) -> Vec<Invocation<'a>> {
        self.invocations
    }
}

/// Turn a type name such as `bench::measure::{{closure}}` into `measure`.
fn derive_name(type_name: &str) -> String {
    let mut depth = 0usize;
    let mut stripped = String::with_capacity(type_name.len());
    for c in type_name.chars() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            _ if depth == 0 => stripped.push(c),
            _ => {}
        }
    }

    stripped
        .split("::")
        .filter(|segment| !segment.is_empty() && !segment.starts_with('{'))
        .last()
        .unwrap_or("invocation")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn measure_power() -> anyhow::Result<Value> {
        Ok(Value::from(-12.5))
    }

    #[test]
    fn test_name_derived_from_function() {
        let invocation = Invocation::new(measure_power);
        assert_eq!(invocation.name(), "measure_power");
    }

    #[test]
    fn test_closure_named_after_enclosing_function() {
        let invocation = Invocation::new(|| Ok(Value::Null));
        assert_eq!(
            invocation.name(),
            "test_closure_named_after_enclosing_function"
        );
    }

    #[test]
    fn test_derive_name_strips_generics() {
        assert_eq!(derive_name("bench::Driver<u8>::fetch"), "fetch");
        assert_eq!(derive_name("bench::run::{{closure}}::{{closure}}"), "run");
        assert_eq!(derive_name("{{closure}}"), "invocation");
    }

    #[test]
    fn test_batch_rejects_colliding_names_before_running() {
        let calls = AtomicUsize::new(0);
        let first = Invocation::new(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Null)
        });
        let second = Invocation::new(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Null)
        });

        let err = Batch::new(vec![first, second]).unwrap_err();
        assert!(matches!(err, ExecutionError::NameCollision { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_explicit_names_resolve_collision() {
        let first = Invocation::new(|| Ok(Value::Null)).with_name("a");
        let second = Invocation::new(|| Ok(Value::Null)).with_name("b");

        let batch = Batch::new(vec![first, second]).unwrap();
        assert_eq!(batch.names(), vec!["a", "b"]);
    }
}
