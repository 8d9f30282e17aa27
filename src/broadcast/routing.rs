// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Argument routing, resolved once at bind time.
//!
//! Every declared parameter `p` of a target in step `s` yields two argument names: the
//! plain name `p`, shared by every target declaring it, and the step-scoped name `s_p`,
//! reaching only targets in step `s`. Both kinds live in one table keyed by argument
//! name, so a call resolves its arguments by lookup alone.
//!
//! A scoped value always wins over a plain one for the same target parameter. An
//! argument name that could mean two different things is rejected at bind time.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::broadcast::sequence::{OperationRef, Step};
use crate::errors::BindingError;
use crate::owner::Owner;
use crate::traits::{NamedArgs, Resource, Signature};

/// A resolved step target.
pub(crate) struct Target {
    pub(crate) name: String,
    pub(crate) reference: OperationRef,
    pub(crate) resource: Arc<dyn Resource>,
    pub(crate) signature: Signature,
}

pub(crate) struct StepTargets {
    pub(crate) name: String,
    pub(crate) targets: Vec<Target>,
}

/// (step index, target index)
type Slot = (usize, usize);

enum Route {
    Plain(Vec<Slot>),
    Scoped {
        step: usize,
        param: String,
        slots: Vec<Slot>,
    },
}

pub(crate) struct RoutingTable {
    steps: Vec<StepTargets>,
    routes: BTreeMap<String, Route>,
}

impl RoutingTable {
    pub(crate) fn build(steps: &[Step], owner: &Owner) -> Result<Self, BindingError> {
        let mut resolved = Vec::with_capacity(steps.len());
        let mut step_names = HashSet::new();

        for step in steps {
            if !step_names.insert(step.name.as_str()) {
                return Err(BindingError::DuplicateStep {
                    step: step.name.clone(),
                });
            }
            if step.targets.is_empty() {
                return Err(BindingError::EmptyStep {
                    step: step.name.clone(),
                });
            }
            resolved.push(resolve_step(step, owner)?);
        }

        let mut routes: BTreeMap<String, Route> = BTreeMap::new();

        for (s, step) in resolved.iter().enumerate() {
            for (t, target) in step.targets.iter().enumerate() {
                for param in &target.signature.params {
                    if let Route::Plain(slots) = routes
                        .entry(param.name.clone())
                        .or_insert_with(|| Route::Plain(Vec::new()))
                    {
                        slots.push((s, t));
                    }
                }
            }
        }

        for (s, step) in resolved.iter().enumerate() {
            for (t, target) in step.targets.iter().enumerate() {
                for param in &target.signature.params {
                    let argument = format!("{}_{}", step.name, param.name);
                    match routes.get_mut(&argument) {
                        None => {
                            routes.insert(
                                argument,
                                Route::Scoped {
                                    step: s,
                                    param: param.name.clone(),
                                    slots: vec![(s, t)],
                                },
                            );
                        }
                        Some(Route::Scoped {
                            step,
                            param: declared,
                            slots,
                        }) if *step == s && *declared == param.name => slots.push((s, t)),
                        Some(_) => return Err(BindingError::AmbiguousArgument { argument }),
                    }
                }
            }
        }

        Ok(Self {
            steps: resolved,
            routes,
        })
    }

    pub(crate) fn steps(&self) -> &[StepTargets] {
        &self.steps
    }

    /// Every accepted argument name, plain and step-scoped, sorted.
    pub(crate) fn parameters(&self) -> Vec<&str> {
        self.routes.keys().map(String::as_str).collect()
    }

    /// Split call arguments into per-target argument maps, indexed `[step][target]`.
    pub(crate) fn route(&self, args: &NamedArgs) -> Result<Vec<Vec<NamedArgs>>, BindingError> {
        if let Some(unknown) = args.keys().find(|name| !self.routes.contains_key(*name)) {
            return Err(BindingError::UnknownArgument {
                argument: unknown.clone(),
            });
        }

        let mut routed: Vec<Vec<NamedArgs>> = self
            .steps
            .iter()
            .map(|step| vec![NamedArgs::new(); step.targets.len()])
            .collect();

        for (name, value) in args {
            if let Some(Route::Scoped { param, slots, .. }) = self.routes.get(name) {
                for &(s, t) in slots {
                    routed[s][t].insert(param.clone(), value.clone());
                }
            }
        }
        for (name, value) in args {
            if let Some(Route::Plain(slots)) = self.routes.get(name) {
                for &(s, t) in slots {
                    routed[s][t]
                        .entry(name.clone())
                        .or_insert_with(|| value.clone());
                }
            }
        }

        for (step, step_args) in self.steps.iter().zip(&routed) {
            for (target, target_args) in step.targets.iter().zip(step_args) {
                if let Some(missing) = target
                    .signature
                    .required()
                    .find(|param| !target_args.contains_key(*param))
                {
                    return Err(BindingError::MissingArgument {
                        step: step.name.clone(),
                        target: target.name.clone(),
                        parameter: missing.to_string(),
                    });
                }
            }
        }

        Ok(routed)
    }
}

fn resolve_step(step: &Step, owner: &Owner) -> Result<StepTargets, BindingError> {
    let mut targets: Vec<Target> = Vec::with_capacity(step.targets.len());

    for reference in &step.targets {
        let resource = owner
            .resource(&reference.resource)
            .ok_or_else(|| BindingError::UnknownResource {
                step: step.name.clone(),
                resource: reference.resource.clone(),
            })?;
        let signature = resource
            .operations()
            .into_iter()
            .find(|sig| sig.name == reference.operation)
            .ok_or_else(|| BindingError::UnknownOperation {
                step: step.name.clone(),
                resource: reference.resource.clone(),
                operation: reference.operation.clone(),
            })?;

        let name = reference.display_name();
        if targets.iter().any(|t| t.name == name) {
            return Err(BindingError::NameCollision {
                step: step.name.clone(),
                name,
            });
        }
        targets.push(Target {
            name,
            reference: reference.clone(),
            resource,
            signature,
        });
    }

    Ok(StepTargets {
        name: step.name.clone(),
        targets,
    })
}
