// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;

use crate::broadcast::bound_call::BoundCall;
use crate::broadcast::routing::RoutingTable;
use crate::errors::BindingError;
use crate::observability::messages::broadcast::SequenceBound;
use crate::observability::messages::StructuredLog;
use crate::owner::Owner;

/// Reference to one operation on a resource inside an owner tree.
///
/// Converts from `"path.to.resource.operation"`: everything before the last dot is
/// the resource path relative to the owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRef {
    pub resource: String,
    pub operation: String,
}

impl OperationRef {
    pub fn new(resource: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            operation: operation.into(),
        }
    }

    /// Name the target's results are reported under, e.g. `rx_scope_configure`.
    pub fn display_name(&self) -> String {
        format!("{}_{}", self.resource.replace('.', "_"), self.operation)
    }
}

impl From<&str> for OperationRef {
    fn from(reference: &str) -> Self {
        match reference.rsplit_once('.') {
            Some((resource, operation)) => OperationRef::new(resource, operation),
            None => OperationRef::new("", reference),
        }
    }
}

impl fmt::Display for OperationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.resource, self.operation)
    }
}

/// One ordered stage of a sequence; its targets run as a single batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub name: String,
    pub targets: Vec<OperationRef>,
}

/// An ordered list of steps, declared once and bound to an owner before use.
///
/// # Example
/// ```
/// use the_benchtop::broadcast::Sequence;
///
/// let sweep = Sequence::new("sweep")
///     .step("setup", ["psu.set_output", "sa.configure"])
///     .step("measure", ["sa.peak"]);
///
/// assert_eq!(sweep.steps().len(), 2);
/// assert_eq!(sweep.steps()[0].targets[1].resource, "sa");
/// ```
#[derive(Debug, Clone)]
pub struct Sequence {
    name: String,
    steps: Vec<Step>,
}

impl Sequence {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Append a step. Several targets run concurrently within the step.
    pub fn step<I, T>(mut self, name: impl Into<String>, targets: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OperationRef>,
    {
        self.steps.push(Step {
            name: name.into(),
            targets: targets.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Resolve every reference against `owner` and build the argument routing table.
    pub fn bind(&self, owner: &Owner) -> Result<BoundCall, BindingError> {
        let table = RoutingTable::build(&self.steps, owner)?;

        SequenceBound {
            sequence: &self.name,
            step_count: self.steps.len(),
            parameter_count: table.parameters().len(),
        }
        .log();

        Ok(BoundCall::new(self.name.clone(), table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_ref_from_dotted_path() {
        let target = OperationRef::from("rx.scope.configure");
        assert_eq!(target.resource, "rx.scope");
        assert_eq!(target.operation, "configure");
        assert_eq!(target.display_name(), "rx_scope_configure");
        assert_eq!(target.to_string(), "rx.scope.configure");
    }

    #[test]
    fn test_steps_keep_declaration_order() {
        let sequence = Sequence::new("s")
            .step("b", ["x.op"])
            .step("a", [OperationRef::new("y", "op")]);
        let names: Vec<_> = sequence.steps().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }
}
