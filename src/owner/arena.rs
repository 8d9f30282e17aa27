// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Node storage for owner trees.
//!
//! Nodes live in a flat arena and refer to each other by [`NodeId`]. Child lists hang off
//! each owner node; the way back up is a separate parent map. Name paths are never
//! stored, they are recomputed from the parent map, so moving a node to a new parent
//! rebinds its path with a single map update.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::traits::Resource;

/// Handle to a node in a [`ResourceArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

pub(crate) enum NodeKind {
    Leaf(Arc<dyn Resource>),
    Owner {
        open: AtomicBool,
        /// Children opened one at a time, in this order, before the rest
        entry_order: Vec<NodeId>,
    },
}

pub(crate) struct Node {
    pub(crate) name: String,
    pub(crate) kind: NodeKind,
    pub(crate) children: Vec<NodeId>,
}

#[derive(Default)]
pub struct ResourceArena {
    nodes: Vec<Node>,
    parents: HashMap<NodeId, NodeId>,
}

impl ResourceArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert_owner(&mut self, name: impl Into<String>) -> NodeId {
        self.insert(Node {
            name: name.into(),
            kind: NodeKind::Owner {
                open: AtomicBool::new(false),
                entry_order: Vec::new(),
            },
            children: Vec::new(),
        })
    }

    pub(crate) fn insert_leaf(&mut self, name: impl Into<String>, resource: Arc<dyn Resource>) -> NodeId {
        self.insert(Node {
            name: name.into(),
            kind: NodeKind::Leaf(resource),
            children: Vec::new(),
        })
    }

    fn insert(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.node(id).name
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parents.get(&id).copied()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn is_owner(&self, id: NodeId) -> bool {
        matches!(self.node(id).kind, NodeKind::Owner { .. })
    }

    pub fn resource(&self, id: NodeId) -> Option<&Arc<dyn Resource>> {
        match &self.node(id).kind {
            NodeKind::Leaf(resource) => Some(resource),
            NodeKind::Owner { .. } => None,
        }
    }

    /// Make `child` the last child of `parent`, detaching it from any previous parent.
    pub(crate) fn attach(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.node_mut(parent).children.push(child);
        self.parents.insert(child, parent);
    }

    pub(crate) fn detach(&mut self, child: NodeId) {
        if let Some(parent) = self.parents.remove(&child) {
            self.node_mut(parent).children.retain(|c| *c != child);
            if let NodeKind::Owner { entry_order, .. } = &mut self.node_mut(parent).kind {
                entry_order.retain(|c| *c != child);
            }
        }
    }

    /// True when `ancestor` is `id` or lies on the path from `id` to its root.
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// Dotted name path from the root, e.g. `bench.sub.scope`.
    pub fn path(&self, id: NodeId) -> String {
        let mut segments = vec![self.name(id)];
        let mut current = self.parent(id);
        while let Some(parent) = current {
            segments.push(self.name(parent));
            current = self.parent(parent);
        }
        segments.reverse();
        segments.join(".")
    }

    pub fn child_named(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|child| self.name(*child) == name)
    }

    /// Resolve a dotted path relative to `from`; the empty path resolves to `from` itself.
    pub fn find(&self, from: NodeId, relative: &str) -> Option<NodeId> {
        if relative.is_empty() {
            return Some(from);
        }
        relative
            .split('.')
            .try_fold(from, |node, segment| self.child_named(node, segment))
    }

    /// Depth-first, pre-order walk of the subtree under `id` (excluding `id`).
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    /// The leaf currently holding `resource`, compared by pointer.
    pub fn find_resource(&self, root: NodeId, resource: &Arc<dyn Resource>) -> Option<NodeId> {
        self.descendants(root).into_iter().find(|id| {
            self.resource(*id)
                .map(|held| Arc::ptr_eq(held, resource))
                .unwrap_or(false)
        })
    }
}
