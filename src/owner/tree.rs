// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use serde_json::Value;

use crate::engine::cancel::{self, Cancelled};
use crate::engine::executor::{is_cancellation, run_concurrent, run_sequential};
use crate::engine::invocation::Invocation;
use crate::errors::{
    AggregateFailure, ExecutionError, FailureStrategy, InvocationFailure, OwnerError,
};
use crate::observability::messages::owner::{
    OpenRollingBack, OwnerClosed, OwnerOpened, OwnershipTransferred, RollbackCloseFailed,
};
use crate::observability::messages::StructuredLog;
use crate::owner::arena::{NodeId, NodeKind, ResourceArena};
use crate::owner::scope::OwnerScope;
use crate::traits::Resource;

/// A live tree of resources that is opened and closed as one unit.
///
/// ## Open
/// Children are opened depth-first. Slots named in the node's entry order open one at a
/// time, in that order; all other slots are independent and open concurrently. If any
/// child fails, every child this call opened is closed again, in reverse order of the
/// opens that completed, and the open failure is returned. Close failures during that
/// rollback are logged and never replace the open failure. Opening an open node does
/// nothing, and leaves that are already open are left alone.
///
/// ## Close
/// Every child is attempted, in reverse slot order, whatever happened to earlier ones.
/// Failures are collected and returned together once all children were attempted.
/// Close paths run shielded from batch cancellation.
///
/// ## Usage contract
/// Open and close are not locked against concurrent operation calls on the same
/// resources. Do not call operations on a resource while its owner is closing.
pub struct Owner {
    arena: ResourceArena,
    root: NodeId,
}

impl Owner {
    pub(crate) fn from_arena(arena: ResourceArena, root: NodeId) -> Self {
        Self { arena, root }
    }

    pub fn name(&self) -> &str {
        self.arena.name(self.root)
    }

    pub fn arena(&self) -> &ResourceArena {
        &self.arena
    }

    pub fn is_open(&self) -> bool {
        self.node_is_open(self.root)
    }

    /// Open every child. See the type-level docs for rollback behavior.
    pub fn open(&self) -> Result<(), OwnerError> {
        self.open_node(self.root)
            .map(|_| ())
            .map_err(|source| OwnerError::Open {
                owner: self.name().to_string(),
                source,
            })
    }

    /// Close every child, reporting all failures at the end.
    pub fn close(&self) -> Result<(), OwnerError> {
        self.close_node(self.root)
            .map_err(|source| OwnerError::Close {
                owner: self.name().to_string(),
                source,
            })
    }

    /// Open the tree and return a guard that closes it exactly once.
    pub fn enter(&self) -> Result<OwnerScope<'_>, OwnerError> {
        self.open()?;
        Ok(OwnerScope::new(self))
    }

    /// Run `f` with the tree open, closing it afterwards on every exit path.
    ///
    /// If `f` fails and the close fails too, `f`'s error is returned and the close
    /// failure is logged.
    pub fn scoped<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Owner) -> Result<T, E>,
        E: From<OwnerError>,
    {
        let scope = self.enter()?;
        match f(self) {
            Ok(value) => {
                scope.exit()?;
                Ok(value)
            }
            Err(e) => {
                drop(scope);
                Err(e)
            }
        }
    }

    /// Resource at a dotted path relative to this owner, e.g. `"rx.scope"`.
    pub fn resource(&self, path: &str) -> Option<Arc<dyn Resource>> {
        self.arena
            .find(self.root, path)
            .and_then(|id| self.arena.resource(id).cloned())
    }

    /// Full name path (including the root name) of the node at `path`.
    pub fn path_of(&self, path: &str) -> Option<String> {
        self.arena.find(self.root, path).map(|id| self.arena.path(id))
    }

    /// Every leaf resource keyed by its full name path.
    pub fn enumerate(&self) -> BTreeMap<String, Arc<dyn Resource>> {
        self.arena
            .descendants(self.root)
            .into_iter()
            .filter_map(|id| {
                self.arena
                    .resource(id)
                    .map(|resource| (self.arena.path(id), resource.clone()))
            })
            .collect()
    }

    /// Open state of every node, the root included, keyed by full name path.
    pub fn snapshot(&self) -> BTreeMap<String, bool> {
        std::iter::once(self.root)
            .chain(self.arena.descendants(self.root))
            .map(|id| (self.arena.path(id), self.node_is_open(id)))
            .collect()
    }

    /// Move the node at `path` under the owner node at `new_parent`, rebinding its name path.
    pub fn transfer(&mut self, path: &str, new_parent: &str) -> Result<(), OwnerError> {
        let node = self
            .arena
            .find(self.root, path)
            .filter(|id| *id != self.root)
            .ok_or_else(|| OwnerError::UnknownResource {
                path: path.to_string(),
            })?;
        let parent = self
            .arena
            .find(self.root, new_parent)
            .filter(|id| self.arena.is_owner(*id))
            .ok_or_else(|| OwnerError::UnknownResource {
                path: new_parent.to_string(),
            })?;

        if self.arena.is_ancestor(node, parent) {
            return Err(OwnerError::CyclicOwnership {
                path: path.to_string(),
            });
        }
        let slot = self.arena.name(node).to_string();
        if let Some(existing) = self.arena.child_named(parent, &slot) {
            if existing != node {
                return Err(OwnerError::DuplicateSlot {
                    owner: self.arena.path(parent),
                    slot,
                });
            }
        }

        let from = self.arena.path(node);
        self.arena.attach(parent, node);
        OwnershipTransferred {
            from: &from,
            to: &self.arena.path(node),
        }
        .log();
        Ok(())
    }

    fn node_is_open(&self, id: NodeId) -> bool {
        match &self.arena.node(id).kind {
            NodeKind::Leaf(resource) => resource.is_open(),
            NodeKind::Owner { open, .. } => open.load(Ordering::SeqCst),
        }
    }

    /// Open the owner node `id` and report whether this call did the opening.
    fn open_node(&self, id: NodeId) -> Result<bool, ExecutionError> {
        let node = self.arena.node(id);
        let NodeKind::Owner { open, entry_order } = &node.kind else {
            return Ok(false);
        };
        if open.load(Ordering::SeqCst) {
            return Ok(false);
        }

        let start = Instant::now();
        let opened: Mutex<Vec<NodeId>> = Mutex::new(Vec::new());

        for &child in entry_order {
            if let Err(e) = self.open_child(child, &opened) {
                self.rollback(id, &opened);
                if is_cancellation(&e) {
                    return Err(ExecutionError::Cancelled(Cancelled));
                }
                let failure = InvocationFailure::new(self.arena.path(child), e);
                return Err(AggregateFailure::single(failure).into());
            }
        }

        let invocations: Vec<Invocation<'_>> = node
            .children
            .iter()
            .copied()
            .filter(|child| !entry_order.contains(child))
            .map(|child| {
                let opened = &opened;
                Invocation::named(self.arena.path(child), move || {
                    self.open_child(child, opened)?;
                    Ok(Value::Null)
                })
            })
            .collect();

        if let Err(e) = run_concurrent(invocations, FailureStrategy::Strict) {
            self.rollback(id, &opened);
            return Err(e);
        }

        open.store(true, Ordering::SeqCst);
        OwnerOpened {
            owner: &self.arena.path(id),
            child_count: node.children.len(),
            duration: start.elapsed(),
        }
        .log();
        Ok(true)
    }

    /// Leaf errors pass through untouched so the batch can tell a cancelled open
    /// from a failed one.
    fn open_child(&self, child: NodeId, opened: &Mutex<Vec<NodeId>>) -> anyhow::Result<()> {
        let did_open = match &self.arena.node(child).kind {
            NodeKind::Leaf(resource) if resource.is_open() => false,
            NodeKind::Leaf(resource) => {
                resource.open()?;
                true
            }
            NodeKind::Owner { .. } => self.open_node(child)?,
        };
        if did_open {
            opened
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(child);
        }
        Ok(())
    }

    /// Close what this open attempt opened, newest first. Failures are only logged.
    fn rollback(&self, id: NodeId, opened: &Mutex<Vec<NodeId>>) {
        let opened = std::mem::take(&mut *opened.lock().unwrap_or_else(PoisonError::into_inner));
        OpenRollingBack {
            owner: &self.arena.path(id),
            opened_count: opened.len(),
        }
        .log();

        cancel::shielded(|| {
            for child in opened.into_iter().rev() {
                if let Err(e) = self.close_child(child) {
                    RollbackCloseFailed {
                        path: &self.arena.path(child),
                        error: &*e,
                    }
                    .log();
                }
            }
        });
    }

    fn close_child(&self, child: NodeId) -> anyhow::Result<()> {
        match &self.arena.node(child).kind {
            NodeKind::Leaf(resource) => cancel::shielded(|| resource.close()),
            NodeKind::Owner { .. } => Ok(self.close_node(child)?),
        }
    }

    /// Close the owner node `id`, attempting every child in reverse slot order.
    fn close_node(&self, id: NodeId) -> Result<(), AggregateFailure> {
        let node = self.arena.node(id);
        let NodeKind::Owner { open, .. } = &node.kind else {
            return Ok(());
        };
        let path = self.arena.path(id);

        let invocations: Vec<Invocation<'_>> = node
            .children
            .iter()
            .rev()
            .copied()
            .map(|child| {
                Invocation::named(self.arena.path(child), move || {
                    self.close_child(child)?;
                    Ok(Value::Null)
                })
            })
            .collect();

        let outcome = cancel::shielded(|| run_sequential(invocations, FailureStrategy::Strict));
        open.store(false, Ordering::SeqCst);

        let failure_count = outcome.as_ref().err().map_or(0, ExecutionError::failure_count);
        OwnerClosed {
            owner: &path,
            child_count: node.children.len(),
            failure_count,
        }
        .log();

        outcome.map(|_| ()).map_err(|e| e.into_aggregate(&path))
    }
}

impl Resource for Owner {
    fn open(&self) -> anyhow::Result<()> {
        Owner::open(self).map_err(anyhow::Error::from)
    }

    fn close(&self) -> anyhow::Result<()> {
        Owner::close(self).map_err(anyhow::Error::from)
    }

    fn is_open(&self) -> bool {
        Owner::is_open(self)
    }
}
