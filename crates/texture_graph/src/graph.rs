// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure containing nodes, connections and output dimensions.

use crate::connection::{Connection, ConnectionId, PortRef};
use crate::node::{Node, NodeId};
use crate::port::{PortDirection, PortId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Output image size shared by every array in the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    width: u32,
    height: u32,
}

impl Dimensions {
    /// Default edge length of new graphs
    pub const DEFAULT_SIZE: u32 = 2048;

    /// Create dimensions, rejecting zero sizes
    pub fn new(width: u32, height: u32) -> Result<Self, DimensionError> {
        if width == 0 || height == 0 {
            return Err(DimensionError { width, height });
        }
        Ok(Self { width, height })
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Length of every per-pixel array
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl Default for Dimensions {
    fn default() -> Self {
        Self {
            width: Self::DEFAULT_SIZE,
            height: Self::DEFAULT_SIZE,
        }
    }
}

/// Error when dimensions are not positive
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Dimensions must be positive, got {width}x{height}")]
pub struct DimensionError {
    /// Requested width
    pub width: u32,
    /// Requested height
    pub height: u32,
}

/// A texture graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    /// Graph name
    pub name: String,
    /// Output size
    dimensions: Dimensions,
    /// Nodes in the graph
    nodes: IndexMap<NodeId, Node>,
    /// Connections between nodes
    connections: IndexMap<ConnectionId, Connection>,
}

impl Graph {
    /// Create a new empty graph
    pub fn new(name: impl Into<String>, dimensions: Dimensions) -> Self {
        Self {
            name: name.into(),
            dimensions,
            nodes: IndexMap::new(),
            connections: IndexMap::new(),
        }
    }

    /// Output size
    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Change the output size
    pub fn set_dimensions(&mut self, dimensions: Dimensions) {
        self.dimensions = dimensions;
    }

    /// Add a node to the graph
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id;
        self.nodes.insert(id, node);
        id
    }

    /// Remove a node and its connections
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        self.connections.retain(|_, c| !c.involves_node(node_id));
        self.nodes.shift_remove(&node_id)
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get a mutable node by ID
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    /// Get all nodes
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Add a connection from an output port to an input port
    pub fn connect(
        &mut self,
        from_node: NodeId,
        from_port: PortId,
        to_node: NodeId,
        to_port: PortId,
    ) -> Result<ConnectionId, ConnectionError> {
        let source_node = self.nodes.get(&from_node)
            .ok_or(ConnectionError::NodeNotFound(from_node))?;
        let target_node = self.nodes.get(&to_node)
            .ok_or(ConnectionError::NodeNotFound(to_node))?;

        let source_port = source_node.port(&from_port)
            .ok_or(ConnectionError::PortNotFound(from_port))?;
        let target_port = target_node.port(&to_port)
            .ok_or(ConnectionError::PortNotFound(to_port))?;

        if source_port.direction != PortDirection::Output {
            return Err(ConnectionError::WrongDirection(from_port));
        }
        if target_port.direction != PortDirection::Input {
            return Err(ConnectionError::WrongDirection(to_port));
        }

        if !source_port.can_connect(target_port) {
            return Err(ConnectionError::IncompatiblePorts {
                from: source_port.element_type,
                to: target_port.element_type,
            });
        }

        if !target_port.is_multi() && self.connections_to(to_port).next().is_some() {
            return Err(ConnectionError::PortAlreadyConnected(to_port));
        }

        if from_node == to_node {
            return Err(ConnectionError::SelfLoop);
        }

        // Longer cycles are accepted here and reported by evaluation

        let connection = Connection::new(
            PortRef::new(from_node, from_port),
            PortRef::new(to_node, to_port),
        );
        let id = connection.id;
        self.connections.insert(id, connection);
        Ok(id)
    }

    /// Add a connection addressing ports by name
    pub fn connect_named(
        &mut self,
        from_node: NodeId,
        from_port: &str,
        to_node: NodeId,
        to_port: &str,
    ) -> Result<ConnectionId, ConnectionError> {
        let source = self.nodes.get(&from_node)
            .ok_or(ConnectionError::NodeNotFound(from_node))?;
        let target = self.nodes.get(&to_node)
            .ok_or(ConnectionError::NodeNotFound(to_node))?;
        let from_id = source.output_named(from_port)
            .ok_or_else(|| ConnectionError::PortNameNotFound(from_port.to_string()))?
            .id;
        let to_id = target.input_named(to_port)
            .ok_or_else(|| ConnectionError::PortNameNotFound(to_port.to_string()))?
            .id;
        self.connect(from_node, from_id, to_node, to_id)
    }

    /// Remove a connection
    pub fn disconnect(&mut self, connection_id: ConnectionId) -> Option<Connection> {
        self.connections.shift_remove(&connection_id)
    }

    /// Get all connections
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Get connections from a specific port
    pub fn connections_from(&self, port_id: PortId) -> impl Iterator<Item = &Connection> {
        self.connections.values().filter(move |c| c.from.port == port_id)
    }

    /// Get connections to a specific port
    pub fn connections_to(&self, port_id: PortId) -> impl Iterator<Item = &Connection> {
        self.connections.values().filter(move |c| c.to.port == port_id)
    }

    /// Get the number of connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Find the output port that actually produces the data of `input`.
    ///
    /// Chains of redirect nodes are followed to the first non-redirect
    /// producer. Returns `None` when the input, or any redirect on the way,
    /// is disconnected.
    pub fn resolve_source(&self, input: PortId) -> Result<Option<PortRef>, CycleError> {
        let mut visited = HashSet::new();
        let mut target = input;

        loop {
            let Some(connection) = self.connections_to(target).next() else {
                return Ok(None);
            };
            let from = connection.from;
            let Some(producer) = self.nodes.get(&from.node) else {
                return Ok(None);
            };
            if !producer.is_redirect() {
                return Ok(Some(from));
            }
            if !visited.insert(from.node) {
                return Err(CycleError(from.node));
            }
            let Some(redirect_input) = producer.input(0) else {
                return Ok(None);
            };
            target = redirect_input.id;
        }
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new("Untitled", Dimensions::default())
    }
}

/// Error when creating a connection
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConnectionError {
    /// Node not found
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeId),

    /// Port not found
    #[error("Port not found: {0:?}")]
    PortNotFound(PortId),

    /// No port with this name on the node
    #[error("Port not found: {0}")]
    PortNameNotFound(String),

    /// Edges run from an output to an input
    #[error("Port has the wrong direction: {0:?}")]
    WrongDirection(PortId),

    /// Incompatible port types
    #[error("Incompatible port types: {from} -> {to}")]
    IncompatiblePorts {
        /// Producer type
        from: crate::port::ElementType,
        /// Consumer type
        to: crate::port::ElementType,
    },

    /// Port is already connected
    #[error("Port already connected: {0:?}")]
    PortAlreadyConnected(PortId),

    /// Self-loop not allowed
    #[error("Self-loop not allowed")]
    SelfLoop,
}

/// Error when graph contains a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Graph contains a cycle through node {0}")]
pub struct CycleError(pub NodeId);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;
    use crate::port::ElementType;

    fn small() -> Dimensions {
        Dimensions::new(2, 2).unwrap()
    }

    #[test]
    fn test_dimensions() {
        assert!(Dimensions::new(0, 4).is_err());
        assert_eq!(Dimensions::new(4, 3).unwrap().pixel_count(), 12);
        assert_eq!(Dimensions::default().width(), 2048);
    }

    #[test]
    fn test_connect_validation() {
        let mut graph = Graph::new("test", small());
        let color = graph.add_node(Node::of_kind(NodeKind::ConstantColor));
        let math = graph.add_node(Node::of_kind(NodeKind::Math));
        let blend = graph.add_node(Node::of_kind(NodeKind::Blend));

        // Vector4 into a scalar input
        assert!(matches!(
            graph.connect_named(color, "Value", math, "A"),
            Err(ConnectionError::IncompatiblePorts { .. })
        ));

        graph.connect_named(color, "Value", blend, "A").unwrap();
        assert_eq!(
            graph.connect_named(color, "Value", blend, "A").unwrap_err(),
            ConnectionError::PortAlreadyConnected(graph.node(blend).unwrap().inputs[0].id)
        );

        // Outputs fan out
        graph.connect_named(color, "Value", blend, "B").unwrap();
        assert_eq!(graph.connection_count(), 2);
        let out = graph.node(color).unwrap().outputs[0].id;
        assert_eq!(graph.connections_from(out).count(), 2);

        assert!(matches!(
            graph.connect_named(blend, "Out", blend, "A"),
            Err(ConnectionError::PortAlreadyConnected(_))
        ));
        assert!(matches!(
            graph.connect_named(color, "Missing", blend, "A"),
            Err(ConnectionError::PortNameNotFound(_))
        ));
    }

    #[test]
    fn test_connect_rejects_reversed_ports() {
        let mut graph = Graph::new("test", small());
        let a = graph.add_node(Node::of_kind(NodeKind::ToneCurve));
        let b = graph.add_node(Node::of_kind(NodeKind::ToneCurve));
        let a_in = graph.node(a).unwrap().inputs[0].id;
        let b_in = graph.node(b).unwrap().inputs[0].id;
        assert_eq!(
            graph.connect(a, a_in, b, b_in),
            Err(ConnectionError::WrongDirection(a_in))
        );
    }

    #[test]
    fn test_remove_node_drops_connections() {
        let mut graph = Graph::new("test", small());
        let color = graph.add_node(Node::of_kind(NodeKind::ConstantColor));
        let export = graph.add_node(Node::of_kind(NodeKind::Export));
        graph.connect_named(color, "Value", export, "Color").unwrap();

        assert!(graph.remove_node(color).is_some());
        assert_eq!(graph.connection_count(), 0);
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn test_resolve_through_redirects() {
        let mut graph = Graph::new("test", small());
        let color = graph.add_node(Node::of_kind(NodeKind::ConstantColor));
        let first = graph.add_node(Node::redirect(ElementType::Vector4, ElementType::Vector4));
        let second = graph.add_node(Node::redirect(ElementType::Vector4, ElementType::Vector4));
        let export = graph.add_node(Node::of_kind(NodeKind::Export));
        graph.connect_named(color, "Value", first, "In").unwrap();
        graph.connect_named(first, "Out", second, "In").unwrap();
        graph.connect_named(second, "Out", export, "Color").unwrap();

        let input = graph.node(export).unwrap().inputs[0].id;
        let source = graph.resolve_source(input).unwrap().unwrap();
        assert_eq!(source.node, color);
        assert_eq!(source.port, graph.node(color).unwrap().outputs[0].id);
    }

    #[test]
    fn test_resolve_disconnected_redirect() {
        let mut graph = Graph::new("test", small());
        let redirect = graph.add_node(Node::redirect(ElementType::Vector4, ElementType::Vector4));
        let export = graph.add_node(Node::of_kind(NodeKind::Export));
        graph.connect_named(redirect, "Out", export, "Color").unwrap();

        let input = graph.node(export).unwrap().inputs[0].id;
        assert_eq!(graph.resolve_source(input), Ok(None));
    }

    #[test]
    fn test_resolve_redirect_loop() {
        let mut graph = Graph::new("test", small());
        let a = graph.add_node(Node::redirect(ElementType::Vector4, ElementType::Vector4));
        let b = graph.add_node(Node::redirect(ElementType::Vector4, ElementType::Vector4));
        let export = graph.add_node(Node::of_kind(NodeKind::Export));
        graph.connect_named(a, "Out", b, "In").unwrap();
        graph.connect_named(b, "Out", a, "In").unwrap();
        graph.connect_named(b, "Out", export, "Color").unwrap();

        let input = graph.node(export).unwrap().inputs[0].id;
        assert!(graph.resolve_source(input).is_err());
    }

    #[test]
    fn test_serialization() {
        let mut graph = Graph::new("Serialization Test", small());
        let color = graph.add_node(Node::of_kind(NodeKind::ConstantColor));
        let export = graph.add_node(Node::of_kind(NodeKind::Export));
        graph.connect_named(color, "Value", export, "Color").unwrap();

        let ron = ron::to_string(&graph).unwrap();
        let loaded: Graph = ron::from_str(&ron).unwrap();
        assert_eq!(loaded.name, graph.name);
        assert_eq!(loaded.dimensions(), graph.dimensions());
        assert_eq!(loaded.node(color), graph.node(color));
        assert_eq!(loaded.connection_count(), 1);
    }
}
