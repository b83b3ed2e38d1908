// SPDX-License-Identifier: MIT OR Apache-2.0
//! Display tree: node arena with depth-indexed children.

use crate::node::{DisplayNode, NodeId};
use indexmap::IndexMap;

/// Arena of display nodes, attached or detached
#[derive(Debug, Clone, Default)]
pub struct DisplayTree {
    /// Nodes by ID
    nodes: IndexMap<NodeId, DisplayNode>,
}

impl DisplayTree {
    /// Create a new empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a detached node
    pub fn insert(&mut self, node: DisplayNode) -> NodeId {
        let id = node.id;
        self.nodes.insert(id, node);
        id
    }

    /// Get a node by ID
    pub fn node(&self, id: NodeId) -> Option<&DisplayNode> {
        self.nodes.get(&id)
    }

    /// Get a mutable node by ID
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut DisplayNode> {
        self.nodes.get_mut(&id)
    }

    /// Whether the node exists
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Child of `parent` at `depth`
    pub fn child_at_depth(&self, parent: NodeId, depth: i32) -> Option<NodeId> {
        self.nodes.get(&parent)?.child_at_depth(depth)
    }

    /// Snapshot of `parent`'s children in depth order
    pub fn children_of(&self, parent: NodeId) -> Vec<(i32, NodeId)> {
        self.nodes
            .get(&parent)
            .map(|node| node.children().collect())
            .unwrap_or_default()
    }

    /// Attach `child` under `parent` at `depth`
    pub fn add_child_at_depth(
        &mut self,
        parent: NodeId,
        child: NodeId,
        depth: i32,
    ) -> Result<(), TreeError> {
        let child_node = self.nodes.get(&child).ok_or(TreeError::NodeNotFound(child))?;
        if child_node.parent.is_some() {
            return Err(TreeError::AlreadyParented(child));
        }
        let parent_node = self.nodes.get(&parent).ok_or(TreeError::NodeNotFound(parent))?;
        if parent_node.children.contains_key(&depth) {
            return Err(TreeError::DepthOccupied { parent, depth });
        }
        if parent == child || self.is_ancestor(child, parent) {
            return Err(TreeError::WouldCycle(child));
        }

        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.insert(depth, child);
        }
        if let Some(child_node) = self.nodes.get_mut(&child) {
            child_node.parent = Some(parent);
            child_node.depth = Some(depth);
        }
        Ok(())
    }

    /// Attach `child` above all existing children of `parent`, returning the depth used
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<i32, TreeError> {
        let parent_node = self.nodes.get(&parent).ok_or(TreeError::NodeNotFound(parent))?;
        let depth = parent_node
            .children
            .keys()
            .next_back()
            .map_or(0, |top| top.saturating_add(1).max(0));
        self.add_child_at_depth(parent, child, depth)?;
        Ok(depth)
    }

    /// Detach a node from its parent, clearing the parent's depth slot and the
    /// child's back-link together. Returns the former parent and depth.
    pub fn detach(&mut self, child: NodeId) -> Option<(NodeId, i32)> {
        let child_node = self.nodes.get_mut(&child)?;
        let parent = child_node.parent.take()?;
        let depth = child_node.depth.take()?;

        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            if parent_node.children.get(&depth) == Some(&child) {
                parent_node.children.remove(&depth);
            }
        }
        tracing::trace!(?child, ?parent, depth, "detached node");
        Some((parent, depth))
    }

    /// Detach a node and drop it and all its descendants from the arena.
    /// Returns every removed ID.
    pub fn remove_subtree(&mut self, id: NodeId) -> Vec<NodeId> {
        self.detach(id);
        let removed = self.descendants(id);
        for node in &removed {
            self.nodes.swap_remove(node);
        }
        tracing::trace!(?id, count = removed.len(), "removed subtree");
        removed
    }

    /// `id` and all its descendants in pre-order (depth ascending)
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        if !self.nodes.contains_key(&id) {
            return order;
        }
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            order.push(current);
            if let Some(node) = self.nodes.get(&current) {
                stack.extend(node.children.values().rev().copied());
            }
        }
        order
    }

    /// Whether `ancestor` is on the parent chain of `id`
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = self.nodes.get(&id).and_then(|n| n.parent);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.nodes.get(&parent).and_then(|n| n.parent);
        }
        false
    }

    /// Bind a named child slot on `parent`
    pub fn bind_name(&mut self, parent: NodeId, name: impl Into<String>, child: NodeId) {
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.named_children.insert(name.into(), child);
        }
    }

    /// Clear the named slot on `parent` only if it still refers to `child`
    pub fn unbind_name_if(&mut self, parent: NodeId, name: &str, child: NodeId) -> bool {
        let Some(node) = self.nodes.get_mut(&parent) else {
            return false;
        };
        if node.named_children.get(name) == Some(&child) {
            node.named_children.shift_remove(name);
            true
        } else {
            false
        }
    }

    /// Child bound to `name` on `parent`, falling back to a child with that instance name
    pub fn child_by_name(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        let node = self.nodes.get(&parent)?;
        node.named_child(name).or_else(|| {
            node.children
                .values()
                .copied()
                .find(|c| self.nodes.get(c).and_then(|n| n.name.as_deref()) == Some(name))
        })
    }
}

/// Error when restructuring the tree
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    /// Node not found
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeId),

    /// Depth already holds a child
    #[error("Depth {depth} of {parent:?} is occupied")]
    DepthOccupied {
        /// Parent node
        parent: NodeId,
        /// Occupied depth
        depth: i32,
    },

    /// Node already has a parent
    #[error("Node already has a parent: {0:?}")]
    AlreadyParented(NodeId),

    /// Attaching would create a cycle
    #[error("Attaching {0:?} would create a cycle")]
    WouldCycle(NodeId),
}
