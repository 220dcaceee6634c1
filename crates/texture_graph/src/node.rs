// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the graph framework.

use crate::params::{Parameter, ParameterSet};
use crate::port::{ElementType, Port, PortId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
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

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The node catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Source bitmap bound by the host
    Import,
    /// Sink copying its input to a host-readable buffer
    Export,
    /// Uniform color
    ConstantColor,
    /// Uniform float broadcast to all four channels
    ConstantFloat,
    /// Color into R, G, B, A
    DecomposeChannels,
    /// R, G, B, A into color
    CombineChannels,
    /// Per-pixel arithmetic on scalars
    Math,
    /// Alpha compositing blend modes
    Blend,
    /// Height / normal map conversion
    BumpMap,
    /// Per-channel curve remapping
    ToneCurve,
    /// Zero-computation pass-through
    Redirect,
}

impl NodeKind {
    /// Every kind, in catalog order
    pub const ALL: [NodeKind; 11] = [
        Self::Import,
        Self::Export,
        Self::ConstantColor,
        Self::ConstantFloat,
        Self::DecomposeChannels,
        Self::CombineChannels,
        Self::Math,
        Self::Blend,
        Self::BumpMap,
        Self::ToneCurve,
        Self::Redirect,
    ];

    /// Stable string identifier
    pub fn id(self) -> &'static str {
        match self {
            Self::Import => "import_texture",
            Self::Export => "export_texture",
            Self::ConstantColor => "constant_color",
            Self::ConstantFloat => "constant_float",
            Self::DecomposeChannels => "decompose_channels",
            Self::CombineChannels => "combine_channels",
            Self::Math => "math",
            Self::Blend => "blend",
            Self::BumpMap => "bump_map",
            Self::ToneCurve => "tone_curve",
            Self::Redirect => "redirect",
        }
    }

    /// Look a kind up by its string identifier
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Node type category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeCategory {
    /// Sources (bitmaps, constants)
    Input,
    /// Sinks
    Output,
    /// Channel split/merge
    Channel,
    /// Arithmetic and compositing
    Math,
    /// Color and surface filters
    Filter,
    /// Graph plumbing
    Utility,
}

/// Node type definition
#[derive(Debug, Clone)]
pub struct NodeType {
    /// Catalog entry
    pub kind: NodeKind,
    /// Display name
    pub name: String,
    /// Category
    pub category: NodeCategory,
    /// Description
    pub description: String,
    /// Input port templates
    pub inputs: Vec<Port>,
    /// Output port templates
    pub outputs: Vec<Port>,
    /// Default parameter values
    pub parameters: ParameterSet,
}

/// A node instance in the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    /// Catalog entry driving `process`
    pub kind: NodeKind,
    /// Display name (can be customized)
    pub name: String,
    /// Position in the editor, opaque to evaluation
    pub position: [f32; 2],
    /// Input ports
    pub inputs: Vec<Port>,
    /// Output ports
    pub outputs: Vec<Port>,
    /// Parameter values read by `process`
    pub params: ParameterSet,
}

impl Node {
    /// Create a new node from a type definition, with fresh port IDs
    pub fn new(node_type: &NodeType) -> Self {
        Self {
            id: NodeId::new(),
            kind: node_type.kind,
            name: node_type.name.clone(),
            position: [0.0, 0.0],
            inputs: node_type.inputs.iter().map(Port::with_fresh_id).collect(),
            outputs: node_type.outputs.iter().map(Port::with_fresh_id).collect(),
            params: node_type.parameters.clone(),
        }
    }

    /// Create a node of a built-in kind with default parameters
    pub fn of_kind(kind: NodeKind) -> Self {
        Self::new(&crate::nodes::node_type(kind))
    }

    /// Create a redirect node relabeling a connection from `input_type` to `output_type`
    pub fn redirect(input_type: ElementType, output_type: ElementType) -> Self {
        let mut node = Self::of_kind(NodeKind::Redirect);
        node.inputs[0].element_type = input_type;
        node.outputs[0].element_type = output_type;
        node
    }

    /// Set the position
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = [x, y];
        self
    }

    /// Set a parameter value
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Parameter>) -> Self {
        self.params.insert(key, value);
        self
    }

    /// Whether evaluation resolves through this node instead of processing it
    pub fn is_redirect(&self) -> bool {
        self.kind == NodeKind::Redirect
    }

    /// Get an input port by index
    pub fn input(&self, index: usize) -> Option<&Port> {
        self.inputs.get(index)
    }

    /// Get an input port by name
    pub fn input_named(&self, name: &str) -> Option<&Port> {
        self.inputs.iter().find(|p| p.name == name)
    }

    /// Get an output port by name
    pub fn output_named(&self, name: &str) -> Option<&Port> {
        self.outputs.iter().find(|p| p.name == name)
    }

    /// Get a port by ID
    pub fn port(&self, port_id: &PortId) -> Option<&Port> {
        self.inputs.iter().find(|p| p.id == *port_id)
            .or_else(|| self.outputs.iter().find(|p| p.id == *port_id))
    }

    /// Get all ports
    pub fn ports(&self) -> impl Iterator<Item = &Port> {
        self.inputs.iter().chain(self.outputs.iter())
    }
}

/// Registry of available node types
pub struct NodeRegistry {
    /// Registered node types by kind
    types: IndexMap<NodeKind, NodeType>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            types: IndexMap::new(),
        }
    }

    /// Registry holding the whole built-in catalog
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for kind in NodeKind::ALL {
            registry.register(crate::nodes::node_type(kind));
        }
        registry
    }

    /// Register a node type
    pub fn register(&mut self, node_type: NodeType) {
        self.types.insert(node_type.kind, node_type);
    }

    /// Get a node type by kind
    pub fn get(&self, kind: NodeKind) -> Option<&NodeType> {
        self.types.get(&kind)
    }

    /// Get a node type by its string identifier
    pub fn find(&self, id: &str) -> Option<&NodeType> {
        NodeKind::from_id(id).and_then(|kind| self.get(kind))
    }

    /// Get all registered types
    pub fn types(&self) -> impl Iterator<Item = &NodeType> {
        self.types.values()
    }

    /// Get types by category
    pub fn types_in_category(&self, category: NodeCategory) -> impl Iterator<Item = &NodeType> {
        self.types.values().filter(move |t| t.category == category)
    }

    /// Create a node from a kind
    pub fn create_node(&self, kind: NodeKind) -> Option<Node> {
        self.get(kind).map(Node::new)
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
