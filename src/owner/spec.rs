// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Declarations of owner trees.
//!
//! An [`OwnerSpec`] lists the slots an owner node has. A slot is either mandatory, filled
//! by a default resource instance, or a nested owner. Instantiation fills mandatory slots
//! (and optionally overrides defaults) by path and produces a live [`Owner`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::errors::OwnerError;
use crate::owner::arena::{NodeId, NodeKind, ResourceArena};
use crate::owner::tree::Owner;
use crate::traits::Resource;

enum Slot {
    Required,
    Default(Arc<dyn Resource>),
    Nested(OwnerSpec),
}

/// Declaration of an owner node and its child slots.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use the_benchtop::backends::simulated::SimulatedInstrument;
/// use the_benchtop::owner::OwnerSpec;
/// use the_benchtop::traits::Resource;
///
/// let spec = OwnerSpec::new("bench")
///     .resource("psu", Arc::new(SimulatedInstrument::new("psu")))
///     .required("sa")
///     .owner(OwnerSpec::new("rx").required("scope"));
///
/// let owner = spec
///     .instantiate([
///         ("sa", Arc::new(SimulatedInstrument::new("sa")) as Arc<dyn Resource>),
///         ("rx.scope", Arc::new(SimulatedInstrument::new("scope")) as Arc<dyn Resource>),
///     ])
///     .unwrap();
///
/// assert!(owner.resource("rx.scope").is_some());
/// ```
pub struct OwnerSpec {
    name: String,
    slots: Vec<(String, Slot)>,
    entry_order: Vec<String>,
}

impl OwnerSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slots: Vec::new(),
            entry_order: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// A slot that must be filled at instantiation
    pub fn required(mut self, slot: impl Into<String>) -> Self {
        self.slots.push((slot.into(), Slot::Required));
        self
    }

    /// A slot with a default instance, replaceable at instantiation
    pub fn resource(mut self, slot: impl Into<String>, resource: Arc<dyn Resource>) -> Self {
        self.slots.push((slot.into(), Slot::Default(resource)));
        self
    }

    /// A nested owner; its slot is named after the nested spec
    pub fn owner(mut self, nested: OwnerSpec) -> Self {
        self.slots.push((nested.name.clone(), Slot::Nested(nested)));
        self
    }

    /// Slots that must open one at a time, in this order, before the remaining slots
    /// open concurrently.
    pub fn entry_order<I, S>(mut self, slots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entry_order = slots.into_iter().map(Into::into).collect();
        self
    }

    /// Instantiate with defaults only.
    pub fn build(self) -> Result<Owner, OwnerError> {
        self.instantiate(std::iter::empty::<(String, Arc<dyn Resource>)>())
    }

    /// Instantiate, filling slots by dotted path relative to this owner.
    pub fn instantiate<I, S>(self, assignments: I) -> Result<Owner, OwnerError>
    where
        I: IntoIterator<Item = (S, Arc<dyn Resource>)>,
        S: Into<String>,
    {
        let mut assignments: HashMap<String, Arc<dyn Resource>> = assignments
            .into_iter()
            .map(|(path, resource)| (path.into(), resource))
            .collect();

        let root_name = self.name.clone();
        let mut arena = ResourceArena::new();
        let mut placed: Vec<(Arc<dyn Resource>, String)> = Vec::new();
        let root = build_node(&mut arena, self, "", &mut assignments, &mut placed)?;

        if let Some(path) = assignments.keys().min() {
            return Err(OwnerError::UnknownSlot {
                owner: root_name,
                slot: path.clone(),
            });
        }

        Ok(Owner::from_arena(arena, root))
    }
}

fn join(prefix: &str, slot: &str) -> String {
    if prefix.is_empty() {
        slot.to_string()
    } else {
        format!("{}.{}", prefix, slot)
    }
}

fn build_node(
    arena: &mut ResourceArena,
    spec: OwnerSpec,
    prefix: &str,
    assignments: &mut HashMap<String, Arc<dyn Resource>>,
    placed: &mut Vec<(Arc<dyn Resource>, String)>,
) -> Result<NodeId, OwnerError> {
    let id = arena.insert_owner(spec.name.as_str());
    let mut seen = HashSet::new();

    for (slot, declared) in spec.slots {
        if !seen.insert(slot.clone()) {
            return Err(OwnerError::DuplicateSlot {
                owner: spec.name,
                slot,
            });
        }
        let path = join(prefix, &slot);

        let child = match declared {
            Slot::Nested(nested) => {
                if assignments.contains_key(&path) {
                    return Err(OwnerError::UnknownSlot {
                        owner: spec.name,
                        slot,
                    });
                }
                build_node(arena, nested, &path, assignments, placed)?
            }
            Slot::Required => {
                let resource = assignments.remove(&path).ok_or_else(|| OwnerError::MissingChild {
                    owner: spec.name.clone(),
                    slot: slot.clone(),
                })?;
                place(arena, &slot, &path, resource, placed)?
            }
            Slot::Default(default) => {
                let resource = assignments.remove(&path).unwrap_or(default);
                place(arena, &slot, &path, resource, placed)?
            }
        };
        arena.attach(id, child);
    }

    let mut order = Vec::with_capacity(spec.entry_order.len());
    for slot in &spec.entry_order {
        let child = arena
            .child_named(id, slot)
            .ok_or_else(|| OwnerError::UnknownSlot {
                owner: spec.name.clone(),
                slot: slot.clone(),
            })?;
        if !order.contains(&child) {
            order.push(child);
        }
    }
    if let NodeKind::Owner { entry_order, .. } = &mut arena.node_mut(id).kind {
        *entry_order = order;
    }

    Ok(id)
}

fn place(
    arena: &mut ResourceArena,
    slot: &str,
    path: &str,
    resource: Arc<dyn Resource>,
    placed: &mut Vec<(Arc<dyn Resource>, String)>,
) -> Result<NodeId, OwnerError> {
    if let Some((_, owned_by)) = placed.iter().find(|(held, _)| Arc::ptr_eq(held, &resource)) {
        return Err(OwnerError::AlreadyOwned {
            path: path.to_string(),
            owned_by: owned_by.clone(),
        });
    }
    placed.push((resource.clone(), path.to_string()));
    Ok(arena.insert_leaf(slot, resource))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::simulated::SimulatedInstrument;

    fn instrument(name: &str) -> Arc<dyn Resource> {
        Arc::new(SimulatedInstrument::new(name))
    }

    #[test]
    fn test_missing_mandatory_slot() {
        let err = OwnerSpec::new("bench").required("sa").build().err().unwrap();
        assert!(matches!(err, OwnerError::MissingChild { ref slot, .. } if slot == "sa"));
    }

    #[test]
    fn test_unknown_assignment() {
        let err = OwnerSpec::new("bench")
            .resource("psu", instrument("psu"))
            .instantiate([("dmm", instrument("dmm"))])
            .err()
            .unwrap();
        assert!(matches!(err, OwnerError::UnknownSlot { ref slot, .. } if slot == "dmm"));
    }

    #[test]
    fn test_assignment_overrides_default() {
        let replacement = instrument("psu-b");
        let owner = OwnerSpec::new("bench")
            .resource("psu", instrument("psu-a"))
            .instantiate([("psu", replacement.clone())])
            .unwrap();

        let held = owner.resource("psu").unwrap();
        assert!(Arc::ptr_eq(&held, &replacement));
    }

    #[test]
    fn test_same_instance_twice_is_rejected() {
        let shared = instrument("psu");
        let err = OwnerSpec::new("bench")
            .resource("a", shared.clone())
            .resource("b", shared)
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, OwnerError::AlreadyOwned { ref owned_by, .. } if owned_by == "a"));
    }

    #[test]
    fn test_duplicate_slot() {
        let err = OwnerSpec::new("bench")
            .required("sa")
            .required("sa")
            .instantiate([("sa", instrument("sa"))])
            .err()
            .unwrap();
        assert!(matches!(err, OwnerError::DuplicateSlot { .. }));
    }

    #[test]
    fn test_entry_order_must_name_slots() {
        let err = OwnerSpec::new("bench")
            .resource("psu", instrument("psu"))
            .entry_order(["switch"])
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, OwnerError::UnknownSlot { ref slot, .. } if slot == "switch"));
    }

    #[test]
    fn test_nested_paths() {
        let owner = OwnerSpec::new("bench")
            .owner(OwnerSpec::new("rx").required("scope"))
            .instantiate([("rx.scope", instrument("scope"))])
            .unwrap();

        assert_eq!(owner.path_of("rx.scope").as_deref(), Some("bench.rx.scope"));
    }
}
