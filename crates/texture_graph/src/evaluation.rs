// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph evaluation: per-pass result cache, visitation state and the pull
//! capability handed to nodes while they process.

use crate::bitmap::Bitmap;
use crate::graph::{ConnectionError, DimensionError, Dimensions, Graph};
use crate::node::{NodeId, NodeKind};
use crate::params::ParameterError;
use crate::port::PortId;
use crate::value::{coerce, Element, PixelBuffer, Rgba, TypeMismatch};
use crate::Node;
use std::collections::HashMap;
use std::sync::Arc;

/// Visitation state of a node during one pass.
///
/// A node without an entry is idle: it has not run this pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitState {
    /// `process` has been entered but has not returned
    Pending,
    /// Every output of the node is in the result cache
    Cached,
}

/// Arrays produced during the current pass, by output port
#[derive(Debug, Default)]
pub(crate) struct ResultCache {
    entries: HashMap<PortId, PixelBuffer>,
}

impl ResultCache {
    /// Get the array stored for a port
    pub fn get(&self, port: PortId) -> Option<&PixelBuffer> {
        self.entries.get(&port)
    }

    /// Whether a port has a stored array
    pub fn contains(&self, port: PortId) -> bool {
        self.entries.contains_key(&port)
    }

    /// Store the array of a port
    pub fn insert(&mut self, port: PortId, buffer: PixelBuffer) {
        self.entries.insert(port, buffer);
    }

    /// Drop the array of a port
    pub fn remove(&mut self, port: PortId) -> Option<PixelBuffer> {
        self.entries.remove(&port)
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of stored arrays
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Cache and visitation state of the current pass, plus lifetime counters
#[derive(Debug, Default)]
pub(crate) struct EvaluationState {
    pub(crate) cache: ResultCache,
    pub(crate) visits: HashMap<NodeId, VisitState>,
    pub(crate) process_counts: HashMap<NodeId, u64>,
    pub(crate) processed_this_pass: usize,
}

impl EvaluationState {
    /// Back to idle for a new pass
    pub(crate) fn reset(&mut self) {
        self.cache.clear();
        self.visits.clear();
        self.processed_this_pass = 0;
    }

    /// Forget everything a node produced this pass
    pub(crate) fn forget(&mut self, node: &Node) {
        for port in &node.outputs {
            self.cache.remove(port.id);
        }
        self.visits.remove(&node.id);
    }
}

/// A bitmap bound to an import node, with its resampled copy
#[derive(Debug)]
pub(crate) struct SourceBinding {
    bitmap: Arc<Bitmap>,
    resampled: Option<(Dimensions, Vec<Rgba>)>,
}

impl SourceBinding {
    pub(crate) fn new(bitmap: Arc<Bitmap>) -> Self {
        Self {
            bitmap,
            resampled: None,
        }
    }

    /// Drop the resampled copy
    pub(crate) fn invalidate(&mut self) {
        self.resampled = None;
    }

    /// Pixels at the given size, resampling only when the size changed
    fn pixels(&mut self, dimensions: Dimensions) -> Vec<Rgba> {
        match &self.resampled {
            Some((size, pixels)) if *size == dimensions => pixels.clone(),
            _ => {
                tracing::debug!(
                    from_width = self.bitmap.width(),
                    from_height = self.bitmap.height(),
                    to_width = dimensions.width(),
                    to_height = dimensions.height(),
                    "resampling source bitmap"
                );
                let pixels = self.bitmap.resample(dimensions.width(), dimensions.height());
                self.resampled = Some((dimensions, pixels.clone()));
                pixels
            }
        }
    }
}

/// State shared with the host: bound source bitmaps and export results
#[derive(Debug, Default)]
pub(crate) struct HostBindings {
    pub(crate) sources: HashMap<NodeId, SourceBinding>,
    pub(crate) exports: HashMap<NodeId, Vec<Rgba>>,
}

impl HostBindings {
    /// Drop every dimension-dependent copy
    pub(crate) fn invalidate_all(&mut self) {
        for binding in self.sources.values_mut() {
            binding.invalidate();
        }
        self.exports.clear();
    }
}

/// Pull capability passed to nodes while they process.
///
/// Nodes never reach the graph directly; they read their inputs through
/// [`EvaluationContext::pull`] and write their outputs through
/// [`EvaluationContext::store`].
pub struct EvaluationContext<'a> {
    graph: &'a Graph,
    state: &'a mut EvaluationState,
    bindings: &'a mut HostBindings,
}

impl<'a> EvaluationContext<'a> {
    pub(crate) fn new(
        graph: &'a Graph,
        state: &'a mut EvaluationState,
        bindings: &'a mut HostBindings,
    ) -> Self {
        Self {
            graph,
            state,
            bindings,
        }
    }

    /// Output size of the graph
    pub fn dimensions(&self) -> Dimensions {
        self.graph.dimensions()
    }

    /// Length every array must have
    pub fn pixel_count(&self) -> usize {
        self.graph.dimensions().pixel_count()
    }

    /// Run a node unless it already ran this pass
    pub(crate) fn run(&mut self, node_id: NodeId) -> Result<(), EvaluationError> {
        match self.state.visits.get(&node_id) {
            Some(VisitState::Cached) => {
                tracing::trace!(node = %node_id, "cache hit");
                return Ok(());
            }
            Some(VisitState::Pending) => return Err(EvaluationError::CycleDetected(node_id)),
            None => {}
        }

        let graph = self.graph;
        let node = graph.node(node_id).ok_or(EvaluationError::NodeNotFound(node_id))?;

        self.state.visits.insert(node_id, VisitState::Pending);
        *self.state.process_counts.entry(node_id).or_default() += 1;
        self.state.processed_this_pass += 1;
        tracing::debug!(node = %node.name, kind = %node.kind, "processing node");

        crate::nodes::process(node, self)?;

        if let Some(port) = node.outputs.iter().find(|p| !self.state.cache.contains(p.id)) {
            return Err(EvaluationError::MissingOutput {
                node: node_id,
                port: port.name.clone(),
            });
        }
        self.state.visits.insert(node_id, VisitState::Cached);
        Ok(())
    }

    /// Read the array feeding the input port `port_name` of `node`.
    ///
    /// The producing node runs first if it has not run this pass. A
    /// disconnected input yields an all-zero array.
    pub fn pull<T: Element>(&mut self, node: &Node, port_name: &str) -> Result<Vec<T>, EvaluationError> {
        let port = node.input_named(port_name).ok_or_else(|| EvaluationError::UnknownPort {
            node: node.id,
            port: port_name.to_string(),
        })?;
        if port.element_type != T::ELEMENT_TYPE {
            return Err(EvaluationError::TypeMismatch {
                port: port.id,
                mismatch: TypeMismatch {
                    expected: T::ELEMENT_TYPE,
                    found: port.element_type,
                },
            });
        }

        let expected = self.pixel_count();
        let source = self
            .graph
            .resolve_source(port.id)
            .map_err(|cycle| EvaluationError::CycleDetected(cycle.0))?;
        let Some(source) = source else {
            tracing::trace!(node = %node.name, port = port_name, "input disconnected, using zeros");
            let zeros = PixelBuffer::zeroed(port.element_type, expected);
            return coerce::<T>(&zeros).map_err(|mismatch| EvaluationError::TypeMismatch {
                port: port.id,
                mismatch,
            });
        };

        self.run(source.node)?;

        let buffer = self.state.cache.get(source.port).ok_or(EvaluationError::MissingOutput {
            node: source.node,
            port: format!("{:?}", source.port),
        })?;
        let values = coerce::<T>(buffer).map_err(|mismatch| EvaluationError::TypeMismatch {
            port: port.id,
            mismatch,
        })?;
        if values.len() != expected {
            return Err(EvaluationError::LengthMismatch {
                port: port.id,
                expected,
                actual: values.len(),
            });
        }
        Ok(values)
    }

    /// Store the array of the output port `port_name` of `node`
    pub fn store<T: Element>(&mut self, node: &Node, port_name: &str, values: Vec<T>) -> Result<(), EvaluationError> {
        let port = node.output_named(port_name).ok_or_else(|| EvaluationError::UnknownPort {
            node: node.id,
            port: port_name.to_string(),
        })?;
        if port.element_type != T::ELEMENT_TYPE {
            return Err(EvaluationError::TypeMismatch {
                port: port.id,
                mismatch: TypeMismatch {
                    expected: port.element_type,
                    found: T::ELEMENT_TYPE,
                },
            });
        }
        let expected = self.pixel_count();
        if values.len() != expected {
            return Err(EvaluationError::LengthMismatch {
                port: port.id,
                expected,
                actual: values.len(),
            });
        }
        self.state.cache.insert(port.id, T::into_buffer(values));
        Ok(())
    }

    /// Pixels of the bitmap bound to an import node, at the graph size
    pub fn source_pixels(&mut self, node: NodeId) -> Option<Vec<Rgba>> {
        let dimensions = self.dimensions();
        self.bindings
            .sources
            .get_mut(&node)
            .map(|binding| binding.pixels(dimensions))
    }

    /// Hand the final pixels of an export node to the host
    pub fn publish(&mut self, node: NodeId, pixels: Vec<Rgba>) -> Result<(), EvaluationError> {
        let expected = self.pixel_count();
        if pixels.len() != expected {
            return Err(EvaluationError::ExportLength {
                node,
                expected,
                actual: pixels.len(),
            });
        }
        self.bindings.exports.insert(node, pixels);
        Ok(())
    }
}

/// Error during evaluation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationError {
    /// A node was re-entered while it was still processing
    #[error("Graph contains a cycle through node {0}")]
    CycleDetected(NodeId),

    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// A node addressed a port it does not have
    #[error("Node {node} has no port named {port}")]
    UnknownPort {
        /// Node
        node: NodeId,
        /// Requested port name
        port: String,
    },

    /// Element types disagree
    #[error("Type mismatch on port {port:?}: {mismatch}")]
    TypeMismatch {
        /// Port where the mismatch was found
        port: PortId,
        /// Expected and found types
        #[source]
        mismatch: TypeMismatch,
    },

    /// An array does not have `width * height` elements
    #[error("Array on port {port:?} has {actual} elements, expected {expected}")]
    LengthMismatch {
        /// Port carrying the array
        port: PortId,
        /// `width * height`
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// An export produced a buffer of the wrong length
    #[error("Export {node} produced {actual} pixels, expected {expected}")]
    ExportLength {
        /// Export node
        node: NodeId,
        /// `width * height`
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// A node returned without storing one of its outputs
    #[error("Node {node} did not produce output {port}")]
    MissingOutput {
        /// Node
        node: NodeId,
        /// Port name
        port: String,
    },

    /// Mode parameter outside the known values
    #[error("Invalid {parameter} value {value} on node {node}")]
    InvalidMode {
        /// Node
        node: NodeId,
        /// Parameter key
        parameter: &'static str,
        /// Stored value
        value: i32,
    },

    /// A parameter is missing or has the wrong type
    #[error("Invalid parameter on node {node}: {error}")]
    Parameter {
        /// Node
        node: NodeId,
        /// Underlying error
        #[source]
        error: ParameterError,
    },

    /// Operation needs another kind of node
    #[error("Node {node} is not a {expected} node")]
    WrongKind {
        /// Node
        node: NodeId,
        /// Kind the operation needs
        expected: NodeKind,
    },

    /// Redirect nodes are resolved through, never processed
    #[error("Redirect node {0} cannot be processed")]
    NotProcessable(NodeId),

    /// Invalid graph size
    #[error(transparent)]
    Dimensions(#[from] DimensionError),

    /// Invalid topology edit
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

impl EvaluationError {
    /// Whether the error comes from the graph configuration rather than from
    /// an unknown node/port lookup
    pub fn is_invalid_configuration(&self) -> bool {
        !matches!(self, Self::NodeNotFound(_) | Self::Connection(_))
    }
}
