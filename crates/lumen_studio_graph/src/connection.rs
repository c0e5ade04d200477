// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection errors and the transient connection being dragged.

use crate::node::NodeId;
use crate::port::PortId;
use serde::{Deserialize, Serialize};

/// A half-made connection being dragged in the editor.
///
/// Exactly one endpoint is set: dragging out of an output pins
/// `from_output`, dragging out of an input pins `to_input`. The free end
/// follows the pointer until the gesture finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingConnection {
    /// Pinned source output, if the drag started on an output
    pub from_output: Option<PortId>,
    /// Pinned target input, if the drag started on an input
    pub to_input: Option<PortId>,
    /// Current pointer position of the free end
    pub position: [f32; 2],
}

impl PendingConnection {
    /// Start a drag from an output port
    pub fn from_output(port: PortId, position: [f32; 2]) -> Self {
        Self {
            from_output: Some(port),
            to_input: None,
            position,
        }
    }

    /// Start a drag from an input port
    pub fn from_input(port: PortId, position: [f32; 2]) -> Self {
        Self {
            from_output: None,
            to_input: Some(port),
            position,
        }
    }

    /// Check whether the pending connection references a port of a node
    pub fn references_node(&self, ports: impl Iterator<Item = PortId>) -> bool {
        for id in ports {
            if self.from_output == Some(id) || self.to_input == Some(id) {
                return true;
            }
        }
        false
    }
}

/// Error when creating or removing a connection
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// Node not found in this graph
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeId),

    /// Port not found in this graph
    #[error("Port not found: {0:?}")]
    PortNotFound(PortId),

    /// Source must be an output, target an input
    #[error("Ports have the wrong direction for a connection")]
    WrongDirection,

    /// Both ports belong to the same node
    #[error("Cannot connect a node to itself")]
    SameNode,

    /// Port types differ and neither side is polymorphic
    #[error("Incompatible port types")]
    TypeMismatch,

    /// Single-connection input already has a link
    #[error("Input already connected: {0:?}")]
    InputOccupied(PortId),

    /// The two ports are not linked
    #[error("Ports are not connected")]
    NotConnected,
}
