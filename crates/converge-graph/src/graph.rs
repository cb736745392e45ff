//! The frozen resource graph.
//!
//! Nodes are kept in identity order so equal inputs build structurally
//! equal graphs. The edge set is derived from every node's outgoing
//! references and is extended by the planner when observed payloads of
//! delete-intent nodes reveal references of their own.

use std::collections::BTreeMap;

use converge_resource::ResourceId;

use crate::node::{Node, ResourceRef};

/// A validated set of nodes plus the references between them.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: BTreeMap<ResourceId, Node>,
}

impl Graph {
    pub(crate) fn from_nodes(nodes: BTreeMap<ResourceId, Node>) -> Self {
        Self { nodes }
    }

    /// Look up a node by identity.
    #[must_use]
    pub fn get(&self, id: &ResourceId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &ResourceId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// Iterate nodes in identity order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Node identities in order.
    #[must_use]
    pub fn ids(&self) -> Vec<ResourceId> {
        self.nodes.keys().cloned().collect()
    }

    /// Every edge in the graph, in source order.
    #[must_use]
    pub fn edges(&self) -> Vec<ResourceRef> {
        self.nodes
            .values()
            .flat_map(|n| n.out_refs().iter().cloned())
            .collect()
    }

    /// Edges pointing at `id`.
    #[must_use]
    pub fn inbound(&self, id: &ResourceId) -> Vec<ResourceRef> {
        self.edges().into_iter().filter(|e| &e.to == id).collect()
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
