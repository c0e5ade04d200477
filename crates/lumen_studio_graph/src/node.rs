// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the graph model.

use crate::graph::{Graph, GraphKind};
use crate::port::{Port, PortId, PortType};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::time::Duration;
use uuid::Uuid;

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Node category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Scene object owning a nested graph
    Object,
    /// Compositing stack owning a nested graph
    Composite,
    /// Shading network owning a nested graph
    Shader,
    /// Visualization/output target
    Render,
    /// Executable operator
    Operator,
    /// Placeholder for unrecognized nodes
    Invalid,
}

/// A node instance in the graph.
///
/// Node names are unique within the immediate owning graph only. The
/// opaque payload (the operator instance, for Operator-kind nodes) is
/// attached by the engine and is not serialized; `operator` keeps the
/// type name so the payload can be rebuilt from a factory after a load
/// or a history restore.
#[derive(Serialize, Deserialize)]
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    /// Display name, unique within the owning graph
    pub name: String,
    /// Node category
    pub kind: NodeKind,
    /// Position in the graph editor
    pub position: [f32; 2],
    /// Input ports, in declaration order
    pub inputs: Vec<Port>,
    /// Output ports, in declaration order
    pub outputs: Vec<Port>,
    /// Owned nested graph, if any
    pub graph: Option<Box<Graph>>,
    /// Node owning the graph this node lives in
    pub parent: Option<NodeId>,
    /// Operator type name used to rebuild the payload
    pub operator: Option<String>,
    /// Opaque user payload, attached and interpreted by the engine
    #[serde(skip)]
    pub payload: Option<Box<dyn Any + Send>>,
    /// Whether the node must be re-executed
    pub stale: bool,
    /// Bumped when a nested graph below this node changes
    pub modifications: u64,
    /// Wall-clock duration of the last execution
    pub last_eval: Duration,
    /// Number of executions so far
    pub eval_count: u64,
}

impl Node {
    /// Create a new node
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: NodeId::new(),
            name: name.into(),
            kind,
            position: [0.0, 0.0],
            inputs: Vec::new(),
            outputs: Vec::new(),
            graph: None,
            parent: None,
            operator: None,
            payload: None,
            stale: true,
            modifications: 0,
            last_eval: Duration::ZERO,
            eval_count: 0,
        }
    }

    /// Attach an owned nested graph of the given kind
    pub fn with_subgraph(mut self, kind: GraphKind) -> Self {
        let mut graph = Graph::new(kind);
        graph.owner = Some(self.id);
        self.graph = Some(Box::new(graph));
        self
    }

    /// Set the operator type name
    pub fn with_operator(mut self, operator: impl Into<String>) -> Self {
        self.operator = Some(operator.into());
        self
    }

    /// Append a new input port and return its id
    pub fn add_input(&mut self, name: impl Into<String>, port_type: PortType) -> PortId {
        let port = Port::input(self.id, name, port_type);
        let id = port.id;
        self.inputs.push(port);
        id
    }

    /// Append a new input port accepting multiple connections
    pub fn add_multi_input(&mut self, name: impl Into<String>, port_type: PortType) -> PortId {
        let port = Port::input(self.id, name, port_type).with_multi_connect();
        let id = port.id;
        self.inputs.push(port);
        id
    }

    /// Append a new output port and return its id
    pub fn add_output(&mut self, name: impl Into<String>, port_type: PortType) -> PortId {
        let port = Port::output(self.id, name, port_type);
        let id = port.id;
        self.outputs.push(port);
        id
    }

    /// Get an input port by index
    pub fn input(&self, index: usize) -> Option<&Port> {
        self.inputs.get(index)
    }

    /// Get an output port by index
    pub fn output(&self, index: usize) -> Option<&Port> {
        self.outputs.get(index)
    }

    /// Get a port by ID
    pub fn port(&self, port_id: PortId) -> Option<&Port> {
        self.inputs
            .iter()
            .find(|p| p.id == port_id)
            .or_else(|| self.outputs.iter().find(|p| p.id == port_id))
    }

    /// Get a mutable port by ID
    pub fn port_mut(&mut self, port_id: PortId) -> Option<&mut Port> {
        self.inputs
            .iter_mut()
            .find(|p| p.id == port_id)
            .or_else(|| self.outputs.iter_mut().find(|p| p.id == port_id))
    }

    /// Get all ports
    pub fn ports(&self) -> impl Iterator<Item = &Port> {
        self.inputs.iter().chain(self.outputs.iter())
    }

    /// Whether any output port is linked
    pub fn has_outgoing_links(&self) -> bool {
        self.outputs.iter().any(Port::is_linked)
    }

    /// Record the timing of one execution
    pub fn record_eval(&mut self, duration: Duration) {
        self.last_eval = duration;
        self.eval_count += 1;
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("inputs", &self.inputs.len())
            .field("outputs", &self.outputs.len())
            .field("stale", &self.stale)
            .finish_non_exhaustive()
    }
}
