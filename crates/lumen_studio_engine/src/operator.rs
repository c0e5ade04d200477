// SPDX-License-Identifier: MIT OR Apache-2.0
//! The operator capability and its type registry.
//!
//! Operators are the executable payload of Operator-kind nodes. The graph
//! model treats them as an opaque `dyn Any` payload; this module owns the
//! attach/detach helpers and the name-keyed factory registry used to build
//! them for new nodes and to rebuild them after a load or a history
//! restore.

use crate::eval::OperatorContext;
use crate::value::Value;
use indexmap::IndexMap;
use lumen_studio_graph::{Graph, Node, NodeId, NodeKind, PortType};

/// Outcome of one operator execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorStatus {
    /// The operator produced its result
    Success,
    /// The operator failed; its warnings say why
    Failure,
}

/// An executable graph operator.
///
/// Operators pull the upstream values they need through the context; an
/// input nothing is connected to resolves to `None`. Failures are not
/// propagated as errors: an operator records human-readable warnings on
/// itself and returns [`OperatorStatus::Failure`], and the evaluation
/// pass continues.
pub trait Operator: Send {
    /// Execute and produce this node's result
    fn execute(&mut self, ctx: &mut OperatorContext<'_, '_>) -> OperatorStatus;

    /// Clear accumulated warnings before a fresh execution
    fn reset_warnings(&mut self);

    /// Warnings accumulated by the last execution
    fn warnings(&self) -> &[String];

    /// The result of the last execution, for hand-off and diagnostics
    fn output(&self) -> Option<Value>;
}

/// Attach an operator as a node's payload
pub fn attach_operator(node: &mut Node, operator: Box<dyn Operator>) {
    node.payload = Some(Box::new(operator));
}

/// Take a node's operator out, leaving the payload empty.
///
/// A payload of a different type is left in place.
pub fn take_operator(node: &mut Node) -> Option<Box<dyn Operator>> {
    let payload = node.payload.take()?;
    match payload.downcast::<Box<dyn Operator>>() {
        Ok(operator) => Some(*operator),
        Err(other) => {
            node.payload = Some(other);
            None
        }
    }
}

/// Borrow a node's operator, if one is attached
pub fn operator_ref(node: &Node) -> Option<&dyn Operator> {
    node.payload
        .as_ref()
        .and_then(|p| p.downcast_ref::<Box<dyn Operator>>())
        .map(|b| b.as_ref())
}

/// Error when an operator type name is not registered
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown operator type: {0}")]
pub struct UnknownOperator(pub String);

/// An operator type: its port layout and instance factory
pub struct OperatorType {
    /// Unique type name
    pub name: String,
    /// Category for menu grouping
    pub category: String,
    /// Input ports the node is created with
    pub inputs: Vec<(String, PortType)>,
    /// Output ports the node is created with
    pub outputs: Vec<(String, PortType)>,
    /// Instance factory
    pub factory: fn() -> Box<dyn Operator>,
}

impl OperatorType {
    /// Create a new operator type
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        factory: fn() -> Box<dyn Operator>,
    ) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            factory,
        }
    }

    /// Declare an input port
    pub fn with_input(mut self, name: impl Into<String>, port_type: PortType) -> Self {
        self.inputs.push((name.into(), port_type));
        self
    }

    /// Declare an output port
    pub fn with_output(mut self, name: impl Into<String>, port_type: PortType) -> Self {
        self.outputs.push((name.into(), port_type));
        self
    }
}

/// Registry of available operator types, in registration order
pub struct OperatorRegistry {
    types: IndexMap<String, OperatorType>,
}

impl OperatorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            types: IndexMap::new(),
        }
    }

    /// Register an operator type, replacing any previous one of that name
    pub fn register(&mut self, operator_type: OperatorType) {
        self.types
            .insert(operator_type.name.clone(), operator_type);
    }

    /// Get a type by name
    pub fn get(&self, name: &str) -> Option<&OperatorType> {
        self.types.get(name)
    }

    /// Iterate over registered types
    pub fn types(&self) -> impl Iterator<Item = &OperatorType> {
        self.types.values()
    }

    /// Build an operator instance by type name
    pub fn create(&self, name: &str) -> Result<Box<dyn Operator>, UnknownOperator> {
        let ty = self
            .types
            .get(name)
            .ok_or_else(|| UnknownOperator(name.to_string()))?;
        Ok((ty.factory)())
    }

    /// Create a node of a registered type in a graph: ports from the type
    /// declaration, a fresh operator instance attached, the type name
    /// recorded for payload rebuilds.
    pub fn instantiate(
        &self,
        graph: &mut Graph,
        name: &str,
    ) -> Result<NodeId, UnknownOperator> {
        let ty = self
            .types
            .get(name)
            .ok_or_else(|| UnknownOperator(name.to_string()))?;

        let mut node = Node::new(&ty.name, NodeKind::Operator).with_operator(&ty.name);
        for (port_name, port_type) in &ty.inputs {
            node.add_input(port_name, *port_type);
        }
        for (port_name, port_type) in &ty.outputs {
            node.add_output(port_name, *port_type);
        }
        attach_operator(&mut node, (ty.factory)());

        Ok(graph.add_node(node))
    }

    /// Rebuild the operator payload of every node (and nested node) that
    /// records a registered type name. Used after deserializing a graph.
    pub fn rebuild_payloads(&self, graph: &mut Graph) {
        for node in graph.nodes_mut() {
            if node.payload.is_none() {
                if let Some(name) = node.operator.clone() {
                    if let Ok(operator) = self.create(&name) {
                        attach_operator(node, operator);
                    }
                }
            }
            if let Some(sub) = node.graph.as_mut() {
                self.rebuild_payloads(sub);
            }
        }
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
