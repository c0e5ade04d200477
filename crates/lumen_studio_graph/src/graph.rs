// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure containing nodes and their connections.

use crate::connection::{ConnectError, PendingConnection};
use crate::node::{Node, NodeId, NodeKind};
use crate::port::{Port, PortDirection, PortId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Graph category tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GraphKind {
    /// Top-level graph holding objects and composites
    Root,
    /// Object construction graph
    Object,
    /// Compositing graph
    Composite,
    /// Shading graph
    Shader,
    /// Nested per-element detail graph
    Detail,
}

/// A node graph.
///
/// Nodes are owned in insertion order. `active_node`, `last_output_node`
/// and `pending_connection` are non-owning references into the node
/// collection; deleting a node clears them when they pointed at it.
#[derive(Debug, Serialize, Deserialize)]
pub struct Graph {
    /// Graph category
    pub kind: GraphKind,
    /// Node owning this graph, if nested
    pub owner: Option<NodeId>,
    /// Nodes in the graph, in insertion order
    nodes: IndexMap<NodeId, Node>,
    /// Currently selected node
    pub active_node: Option<NodeId>,
    /// Pinned evaluation sink
    pub last_output_node: Option<NodeId>,
    /// Connection currently being dragged
    #[serde(skip)]
    pub pending_connection: Option<PendingConnection>,
    /// Editor view center
    pub center: [f32; 2],
    /// Editor view zoom factor
    pub zoom: f32,
}

impl Graph {
    /// Create a new empty graph
    pub fn new(kind: GraphKind) -> Self {
        Self {
            kind,
            owner: None,
            nodes: IndexMap::new(),
            active_node: None,
            last_output_node: None,
            pending_connection: None,
            center: [0.0, 0.0],
            zoom: 1.0,
        }
    }

    /// Create a node with a name unique within this graph and append it
    pub fn create_node(&mut self, name: &str, kind: NodeKind) -> NodeId {
        self.add_node(Node::new(name, kind))
    }

    /// Append a prepared node, disambiguating its name within this graph
    pub fn add_node(&mut self, mut node: Node) -> NodeId {
        node.name = self.unique_name(&node.name);
        node.parent = self.owner;
        let id = node.id;
        self.nodes.insert(id, node);
        id
    }

    /// Find a free name: the base if unused, otherwise the base with the
    /// lowest free `.NNN` suffix appended.
    fn unique_name(&self, base: &str) -> String {
        if !self.nodes.values().any(|n| n.name == base) {
            return base.to_string();
        }

        let mut index = 1usize;
        loop {
            let candidate = format!("{base}.{index:03}");
            if !self.nodes.values().any(|n| n.name == candidate) {
                return candidate;
            }
            index += 1;
        }
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get a mutable node by ID
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    /// Get all nodes, in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all nodes mutably, in insertion order
    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.values_mut()
    }

    /// Get all node IDs, in insertion order
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Find a node by ID, searching nested graphs depth-first
    pub fn find_node(&self, node_id: NodeId) -> Option<&Node> {
        if let Some(node) = self.nodes.get(&node_id) {
            return Some(node);
        }

        self.nodes
            .values()
            .find_map(|n| n.graph.as_ref().and_then(|g| g.find_node(node_id)))
    }

    /// Find a node by ID mutably, searching nested graphs depth-first
    pub fn find_node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        if self.nodes.contains_key(&node_id) {
            return self.nodes.get_mut(&node_id);
        }

        for node in self.nodes.values_mut() {
            if let Some(graph) = node.graph.as_mut() {
                if let Some(found) = graph.find_node_mut(node_id) {
                    return Some(found);
                }
            }
        }

        None
    }

    /// Resolve a nested graph by the chain of owning node ids
    pub fn graph_at_path(&self, path: &[NodeId]) -> Option<&Graph> {
        match path.split_first() {
            None => Some(self),
            Some((head, rest)) => self
                .nodes
                .get(head)?
                .graph
                .as_ref()?
                .graph_at_path(rest),
        }
    }

    /// Resolve a nested graph mutably by the chain of owning node ids
    pub fn graph_at_path_mut(&mut self, path: &[NodeId]) -> Option<&mut Graph> {
        match path.split_first() {
            None => Some(self),
            Some((head, rest)) => self
                .nodes
                .get_mut(head)?
                .graph
                .as_mut()?
                .graph_at_path_mut(rest),
        }
    }

    /// Get a port in this graph by ID
    pub fn port(&self, port_id: PortId) -> Option<&Port> {
        self.nodes.values().find_map(|n| n.port(port_id))
    }

    /// Get the node owning a port of this graph
    pub fn port_owner(&self, port_id: PortId) -> Option<NodeId> {
        self.port(port_id).map(|p| p.node)
    }

    /// Connect an output port to an input port.
    ///
    /// Both ports must live in this graph, on distinct nodes, with
    /// compatible types. An occupied single-connection input is rejected;
    /// callers replace a link by disconnecting it explicitly first.
    pub fn connect(&mut self, from: PortId, to: PortId) -> Result<(), ConnectError> {
        let from_port = self.port(from).ok_or(ConnectError::PortNotFound(from))?;
        let to_port = self.port(to).ok_or(ConnectError::PortNotFound(to))?;

        if from_port.direction != PortDirection::Output
            || to_port.direction != PortDirection::Input
        {
            return Err(ConnectError::WrongDirection);
        }

        if from_port.node == to_port.node {
            return Err(ConnectError::SameNode);
        }

        if !from_port.port_type.compatible_with(&to_port.port_type) {
            return Err(ConnectError::TypeMismatch);
        }

        if to_port.is_linked() && !to_port.multi_connect {
            return Err(ConnectError::InputOccupied(to));
        }

        let from_node = from_port.node;
        let to_node = to_port.node;

        // Symmetric link records on both sides
        if let Some(port) = self.nodes.get_mut(&from_node).and_then(|n| n.port_mut(from)) {
            port.links.push(to);
        }
        if let Some(port) = self.nodes.get_mut(&to_node).and_then(|n| n.port_mut(to)) {
            port.links.push(from);
        }

        Ok(())
    }

    /// Remove the pairing between an output and an input port.
    ///
    /// Returns whether the severed edge's downstream node still feeds the
    /// graph's designated sink, which is the caller's signal that a
    /// re-evaluation is required.
    pub fn disconnect(&mut self, from: PortId, to: PortId) -> Result<bool, ConnectError> {
        let from_port = self.port(from).ok_or(ConnectError::PortNotFound(from))?;
        let to_port = self.port(to).ok_or(ConnectError::PortNotFound(to))?;

        if !from_port.links.contains(&to) || !to_port.links.contains(&from) {
            return Err(ConnectError::NotConnected);
        }

        let from_node = from_port.node;
        let to_node = to_port.node;

        if let Some(port) = self.nodes.get_mut(&from_node).and_then(|n| n.port_mut(from)) {
            port.links.retain(|l| *l != to);
        }
        if let Some(port) = self.nodes.get_mut(&to_node).and_then(|n| n.port_mut(to)) {
            port.links.retain(|l| *l != from);
        }

        Ok(self.feeds_sink(to_node))
    }

    /// The node evaluation starts from: the pinned output node if set,
    /// otherwise the first node without outgoing connections.
    pub fn output_sink(&self) -> Option<NodeId> {
        self.last_output_node.or_else(|| {
            self.nodes
                .values()
                .find(|n| !n.has_outgoing_links())
                .map(|n| n.id)
        })
    }

    /// Whether a forward walk from `start` reaches the designated sink
    pub fn feeds_sink(&self, start: NodeId) -> bool {
        let Some(sink) = self.output_sink() else {
            return false;
        };

        let mut stack = vec![start];
        let mut visited = HashSet::new();

        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            if id == sink {
                return true;
            }
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            for output in &node.outputs {
                for linked in &output.links {
                    if let Some(port) = self.port(*linked) {
                        stack.push(port.node);
                    }
                }
            }
        }

        false
    }

    /// Delete a node: sever every port link first, then clear any
    /// graph-level reference to it, then remove it preserving the
    /// insertion order of the remaining nodes.
    pub fn delete_node(&mut self, node_id: NodeId) -> Option<Node> {
        let node = self.nodes.get(&node_id)?;

        let mut severs: Vec<(PortId, PortId)> = Vec::new();
        let mut own_ports: Vec<PortId> = Vec::new();
        for port in node.ports() {
            own_ports.push(port.id);
            for linked in &port.links {
                severs.push((*linked, port.id));
            }
        }

        for (other, own) in severs {
            let Some(owner) = self.port_owner(other) else {
                continue;
            };
            if owner == node_id {
                continue;
            }
            if let Some(port) = self.nodes.get_mut(&owner).and_then(|n| n.port_mut(other)) {
                port.links.retain(|l| *l != own);
            }
        }

        if self.active_node == Some(node_id) {
            self.active_node = None;
        }
        if self.last_output_node == Some(node_id) {
            self.last_output_node = None;
        }
        if let Some(pending) = &self.pending_connection {
            if pending.references_node(own_ports.into_iter()) {
                self.pending_connection = None;
            }
        }

        self.nodes.shift_remove(&node_id)
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new(GraphKind::Root)
    }
}
