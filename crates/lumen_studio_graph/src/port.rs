// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions for node inputs/outputs.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortId(pub Uuid);

impl PortId {
    /// Create a new random port ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PortId {
    fn default() -> Self {
        Self::new()
    }
}

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortDirection {
    /// Input port
    Input,
    /// Output port
    Output,
}

/// Data type that can flow through ports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortType {
    /// Raster image
    Image,
    /// Single-channel matte
    Mask,
    /// Geometry stream
    Geometry,
    /// Floating point value
    Float,
    /// Integer value
    Int,
    /// 2D vector
    Vec2,
    /// 3D vector
    Vec3,
    /// Color (RGBA)
    Color,
    /// String value
    Text,
    /// Adapts to whatever it is connected to
    Polymorphic,
}

impl PortType {
    /// Check if this type can connect to another type.
    ///
    /// Types must be equal unless either side is [`PortType::Polymorphic`];
    /// there are no implicit conversions.
    pub fn compatible_with(&self, other: &PortType) -> bool {
        if matches!(self, Self::Polymorphic) || matches!(other, Self::Polymorphic) {
            return true;
        }

        self == other
    }
}

/// A typed plug on a node.
///
/// Links are stored symmetrically: an output port records the input ports
/// it feeds, an input port records the output port feeding it (at most one
/// unless `multi_connect` is set).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Port {
    /// Unique port ID
    pub id: PortId,
    /// Port name
    pub name: String,
    /// Owning node
    pub node: NodeId,
    /// Port direction
    pub direction: PortDirection,
    /// Data type
    pub port_type: PortType,
    /// Whether multiple connections are allowed
    pub multi_connect: bool,
    /// Ids of the opposite-direction ports this port is linked to
    pub links: Vec<PortId>,
}

impl Port {
    /// Create a new input port
    pub fn input(node: NodeId, name: impl Into<String>, port_type: PortType) -> Self {
        Self {
            id: PortId::new(),
            name: name.into(),
            node,
            direction: PortDirection::Input,
            port_type,
            multi_connect: false,
            links: Vec::new(),
        }
    }

    /// Create a new output port
    pub fn output(node: NodeId, name: impl Into<String>, port_type: PortType) -> Self {
        Self {
            id: PortId::new(),
            name: name.into(),
            node,
            direction: PortDirection::Output,
            port_type,
            // Outputs always fan out
            multi_connect: true,
            links: Vec::new(),
        }
    }

    /// Allow multiple incoming connections on an input port
    pub fn with_multi_connect(mut self) -> Self {
        self.multi_connect = true;
        self
    }

    /// Check if the port has at least one link
    pub fn is_linked(&self) -> bool {
        !self.links.is_empty()
    }

    /// Get the number of links
    pub fn link_count(&self) -> usize {
        self.links.len()
    }
}
