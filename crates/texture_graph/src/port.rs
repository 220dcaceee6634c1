// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions for node inputs/outputs.

use serde::{Deserialize, Serialize};
use std::fmt;
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

/// How many edges a port accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortCapacity {
    /// At most one edge
    Single,
    /// Any number of edges
    Multi,
}

/// Element type of the per-pixel arrays flowing through a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    /// One `f32` per pixel
    Scalar,
    /// Four `f32` per pixel (RGBA)
    Vector4,
}

impl ElementType {
    /// Check if a producer of this type may feed a consumer of `other`.
    ///
    /// Only exact matches connect; channel splitting and merging is the job of
    /// the decompose/combine nodes.
    pub fn can_connect_to(self, other: ElementType) -> bool {
        self == other
    }

    /// Human readable name
    pub fn name(self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            Self::Vector4 => "vector4",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A port on a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    /// Unique port ID
    pub id: PortId,
    /// Port name, unique per direction within a node
    pub name: String,
    /// Port direction
    pub direction: PortDirection,
    /// Edge capacity
    pub capacity: PortCapacity,
    /// Declared element type
    pub element_type: ElementType,
}

impl Port {
    /// Create a new input port
    pub fn input(name: impl Into<String>, element_type: ElementType) -> Self {
        Self {
            id: PortId::new(),
            name: name.into(),
            direction: PortDirection::Input,
            capacity: PortCapacity::Single,
            element_type,
        }
    }

    /// Create a new output port
    pub fn output(name: impl Into<String>, element_type: ElementType) -> Self {
        Self {
            id: PortId::new(),
            name: name.into(),
            direction: PortDirection::Output,
            capacity: PortCapacity::Multi,
            element_type,
        }
    }

    /// Copy of this port with a freshly generated ID
    pub fn with_fresh_id(&self) -> Self {
        Self {
            id: PortId::new(),
            ..self.clone()
        }
    }

    /// Whether the port accepts more than one edge
    pub fn is_multi(&self) -> bool {
        self.capacity == PortCapacity::Multi
    }

    /// Check if a connection from this port to `other` is valid
    pub fn can_connect(&self, other: &Port) -> bool {
        self.direction == PortDirection::Output
            && other.direction == PortDirection::Input
            && self.element_type.can_connect_to(other.element_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capacities() {
        let input = Port::input("Color", ElementType::Vector4);
        let output = Port::output("Color", ElementType::Vector4);
        assert_eq!(input.capacity, PortCapacity::Single);
        assert!(output.is_multi());
        assert_ne!(input.id, output.id);
    }

    #[test]
    fn test_can_connect() {
        let color_out = Port::output("Color", ElementType::Vector4);
        let color_in = Port::input("Color", ElementType::Vector4);
        let red_in = Port::input("R", ElementType::Scalar);

        assert!(color_out.can_connect(&color_in));
        assert!(!color_out.can_connect(&red_in));
        // Direction matters
        assert!(!color_in.can_connect(&color_out));
    }

    #[test]
    fn test_fresh_id_keeps_shape() {
        let port = Port::input("A", ElementType::Scalar);
        let copy = port.with_fresh_id();
        assert_ne!(port.id, copy.id);
        assert_eq!(port.name, copy.name);
        assert_eq!(port.element_type, copy.element_type);
    }
}
