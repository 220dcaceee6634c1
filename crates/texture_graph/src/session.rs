// SPDX-License-Identifier: MIT OR Apache-2.0
//! Evaluation session: a graph together with its cache, dirty set and the
//! bitmaps bound by the host.

use crate::bitmap::Bitmap;
use crate::connection::{Connection, ConnectionId};
use crate::evaluation::{EvaluationContext, EvaluationError, EvaluationState, HostBindings, SourceBinding};
use crate::graph::{Dimensions, Graph};
use crate::node::{Node, NodeId, NodeKind};
use crate::params::{Parameter, ParameterSet};
use crate::port::PortId;
use crate::value::{PixelBuffer, Rgba};
use indexmap::IndexSet;
use std::fmt;
use std::sync::Arc;

/// Callback invoked whenever a node is marked dirty
pub type DirtyHook = Box<dyn FnMut(NodeId)>;

/// A graph being edited and evaluated
pub struct GraphSession {
    graph: Graph,
    state: EvaluationState,
    bindings: HostBindings,
    dirty: IndexSet<NodeId>,
    on_dirty: Option<DirtyHook>,
}

impl GraphSession {
    /// Wrap a graph
    pub fn new(graph: Graph) -> Self {
        Self {
            graph,
            state: EvaluationState::default(),
            bindings: HostBindings::default(),
            dirty: IndexSet::new(),
            on_dirty: None,
        }
    }

    /// The graph topology
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Register the callback run when a node is marked dirty
    pub fn on_dirty(&mut self, hook: impl FnMut(NodeId) + 'static) {
        self.on_dirty = Some(Box::new(hook));
    }

    /// Output size
    pub fn dimensions(&self) -> Dimensions {
        self.graph.dimensions()
    }

    /// Change the output size.
    ///
    /// Every cached array and resampled bitmap is dropped and every export
    /// node is marked dirty.
    pub fn set_dimensions(&mut self, width: u32, height: u32) -> Result<(), EvaluationError> {
        let dimensions = Dimensions::new(width, height)?;
        if dimensions == self.graph.dimensions() {
            return Ok(());
        }
        tracing::info!(width, height, "graph dimensions changed");
        self.graph.set_dimensions(dimensions);
        self.state.reset();
        self.bindings.invalidate_all();

        let exports: Vec<NodeId> = self
            .graph
            .nodes()
            .filter(|node| node.kind == NodeKind::Export)
            .map(|node| node.id)
            .collect();
        for node in exports {
            self.mark_dirty(node);
        }
        Ok(())
    }

    /// Add a node and mark it dirty
    pub fn add_node(&mut self, node: Node) -> NodeId {
        tracing::debug!(node = %node.name, kind = %node.kind, "node added");
        let id = self.graph.add_node(node);
        self.mark_dirty(id);
        id
    }

    /// Remove a node and its connections.
    ///
    /// Nodes that consumed its outputs are marked dirty.
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        let consumers: Vec<NodeId> = self
            .graph
            .connections()
            .filter(|c| c.from.node == node_id)
            .map(|c| c.to.node)
            .collect();

        let node = self.graph.remove_node(node_id)?;
        self.state.forget(&node);
        self.bindings.sources.remove(&node_id);
        self.bindings.exports.remove(&node_id);
        self.dirty.shift_remove(&node_id);
        tracing::debug!(node = %node.name, "node removed");

        for consumer in consumers {
            self.mark_dirty(consumer);
        }
        Some(node)
    }

    /// Connect an output port to an input port and mark the consumer dirty
    pub fn connect(
        &mut self,
        from_node: NodeId,
        from_port: PortId,
        to_node: NodeId,
        to_port: PortId,
    ) -> Result<ConnectionId, EvaluationError> {
        let id = self.graph.connect(from_node, from_port, to_node, to_port)?;
        self.mark_dirty(to_node);
        Ok(id)
    }

    /// Connect two ports by name and mark the consumer dirty
    pub fn connect_named(
        &mut self,
        from_node: NodeId,
        from_port: &str,
        to_node: NodeId,
        to_port: &str,
    ) -> Result<ConnectionId, EvaluationError> {
        let id = self.graph.connect_named(from_node, from_port, to_node, to_port)?;
        self.mark_dirty(to_node);
        Ok(id)
    }

    /// Remove a connection and mark the consumer dirty
    pub fn disconnect(&mut self, connection_id: ConnectionId) -> Option<Connection> {
        let connection = self.graph.disconnect(connection_id)?;
        self.mark_dirty(connection.to.node);
        Some(connection)
    }

    /// Parameters of a node
    pub fn parameters(&self, node_id: NodeId) -> Option<&ParameterSet> {
        self.graph.node(node_id).map(|node| &node.params)
    }

    /// Replace a parameter value and mark the node dirty.
    ///
    /// Returns the previous value.
    pub fn set_parameter(
        &mut self,
        node_id: NodeId,
        key: &str,
        value: impl Into<Parameter>,
    ) -> Result<Parameter, EvaluationError> {
        let node = self
            .graph
            .node_mut(node_id)
            .ok_or(EvaluationError::NodeNotFound(node_id))?;
        let previous = node
            .params
            .update(key, value.into())
            .map_err(|error| EvaluationError::Parameter { node: node_id, error })?;
        self.mark_dirty(node_id);
        Ok(previous)
    }

    /// Bind a bitmap to an import node
    pub fn bind_source_bitmap(&mut self, node_id: NodeId, bitmap: Arc<Bitmap>) -> Result<(), EvaluationError> {
        let node = self.graph.node(node_id).ok_or(EvaluationError::NodeNotFound(node_id))?;
        if node.kind != NodeKind::Import {
            return Err(EvaluationError::WrongKind {
                node: node_id,
                expected: NodeKind::Import,
            });
        }
        tracing::debug!(
            node = %node.name,
            width = bitmap.width(),
            height = bitmap.height(),
            "source bitmap bound"
        );
        self.bindings.sources.insert(node_id, SourceBinding::new(bitmap));
        self.mark_dirty(node_id);
        Ok(())
    }

    /// Unbind the bitmap of an import node; it then yields zeros
    pub fn unbind_source_bitmap(&mut self, node_id: NodeId) -> bool {
        let removed = self.bindings.sources.remove(&node_id).is_some();
        if removed {
            self.mark_dirty(node_id);
        }
        removed
    }

    /// Last pixels an export node produced
    pub fn read_output(&self, node_id: NodeId) -> Option<&[Rgba]> {
        self.bindings.exports.get(&node_id).map(Vec::as_slice)
    }

    /// Array cached for an output port during the last pass
    pub fn cached_output(&self, port: PortId) -> Option<&PixelBuffer> {
        self.state.cache.get(port)
    }

    /// Number of arrays in the result cache
    pub fn cache_len(&self) -> usize {
        self.state.cache.len()
    }

    /// How many times a node has been processed since the session started
    pub fn process_count(&self, node_id: NodeId) -> u64 {
        self.state.process_counts.get(&node_id).copied().unwrap_or(0)
    }

    /// Invalidate the cached outputs of a node
    pub fn mark_dirty(&mut self, node_id: NodeId) {
        let Some(node) = self.graph.node(node_id) else {
            tracing::warn!(node = %node_id, "cannot mark unknown node dirty");
            return;
        };
        self.state.forget(node);
        if let Some(binding) = self.bindings.sources.get_mut(&node_id) {
            binding.invalidate();
        }
        if self.dirty.insert(node_id) {
            tracing::trace!(node = %node.name, "node marked dirty");
        }
        if let Some(hook) = self.on_dirty.as_mut() {
            hook(node_id);
        }
    }

    /// Whether a node has been marked dirty since the last pass
    pub fn is_dirty(&self, node_id: NodeId) -> bool {
        self.dirty.contains(&node_id)
    }

    /// First export node of the graph
    pub fn default_sink(&self) -> Option<NodeId> {
        self.graph
            .nodes()
            .find(|node| node.kind == NodeKind::Export)
            .map(|node| node.id)
    }

    /// Run one evaluation pass toward an export node and return its pixels.
    ///
    /// The cache is emptied first, so each reachable node runs exactly once.
    /// On failure the partial cache is dropped and the error is returned.
    pub fn evaluate(&mut self, sink: NodeId) -> Result<Vec<Rgba>, EvaluationError> {
        let node = self.graph.node(sink).ok_or(EvaluationError::NodeNotFound(sink))?;
        if node.kind != NodeKind::Export {
            return Err(EvaluationError::WrongKind {
                node: sink,
                expected: NodeKind::Export,
            });
        }

        self.state.reset();
        self.dirty.clear();

        let dimensions = self.graph.dimensions();
        let _span = tracing::debug_span!("evaluate", sink = %node.name).entered();
        let result = EvaluationContext::new(&self.graph, &mut self.state, &mut self.bindings).run(sink);
        if let Err(err) = result {
            tracing::warn!(error = %err, "evaluation failed");
            self.state.reset();
            return Err(err);
        }

        let pixels = self
            .bindings
            .exports
            .get(&sink)
            .cloned()
            .ok_or_else(|| EvaluationError::MissingOutput {
                node: sink,
                port: "Color".to_string(),
            })?;
        tracing::debug!(
            processed = self.state.processed_this_pass,
            width = dimensions.width(),
            height = dimensions.height(),
            "evaluation pass complete"
        );
        Ok(pixels)
    }
}

impl fmt::Debug for GraphSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphSession")
            .field("graph", &self.graph.name)
            .field("dimensions", &self.graph.dimensions())
            .field("cached", &self.state.cache.len())
            .field("dirty", &self.dirty.len())
            .field("has_dirty_hook", &self.on_dirty.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::blend::BlendMode;
    use crate::nodes::math::MathMode;
    use crate::port::ElementType;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn session(width: u32, height: u32) -> GraphSession {
        GraphSession::new(Graph::new("test", Dimensions::new(width, height).unwrap()))
    }

    fn close(a: Rgba, b: Rgba) -> bool {
        a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() < 1e-5)
    }

    fn color(session: &mut GraphSession, value: Rgba) -> NodeId {
        session.add_node(Node::of_kind(NodeKind::ConstantColor).with_parameter("value", value))
    }

    fn export_of(session: &mut GraphSession, source: NodeId, port: &str) -> NodeId {
        let export = session.add_node(Node::of_kind(NodeKind::Export));
        session.connect_named(source, port, export, "Color").unwrap();
        export
    }

    #[test]
    fn test_each_node_runs_once_per_pass() {
        let mut s = session(2, 2);
        let c = color(&mut s, [0.2, 0.4, 0.6, 0.8]);
        let split = s.add_node(Node::of_kind(NodeKind::DecomposeChannels));
        let merge = s.add_node(Node::of_kind(NodeKind::CombineChannels));
        let blend = s.add_node(Node::of_kind(NodeKind::Blend));
        s.connect_named(c, "Value", split, "Color").unwrap();
        for channel in ["R", "G", "B", "A"] {
            s.connect_named(split, channel, merge, channel).unwrap();
        }
        s.connect_named(merge, "Color", blend, "A").unwrap();
        s.connect_named(c, "Value", blend, "B").unwrap();
        let export = export_of(&mut s, blend, "Out");

        s.evaluate(export).unwrap();
        assert_eq!(s.process_count(c), 1);
        assert_eq!(s.process_count(split), 1);
        assert_eq!(s.process_count(merge), 1);

        s.evaluate(export).unwrap();
        assert_eq!(s.process_count(c), 2);
        assert_eq!(s.process_count(split), 2);
    }

    #[test]
    fn test_decompose_then_combine_is_identity() {
        let mut s = session(2, 1);
        let c = color(&mut s, [0.1, 0.2, 0.3, 0.4]);
        let split = s.add_node(Node::of_kind(NodeKind::DecomposeChannels));
        let merge = s.add_node(Node::of_kind(NodeKind::CombineChannels));
        s.connect_named(c, "Value", split, "Color").unwrap();
        for channel in ["R", "G", "B", "A"] {
            s.connect_named(split, channel, merge, channel).unwrap();
        }
        let export = export_of(&mut s, merge, "Color");

        let pixels = s.evaluate(export).unwrap();
        assert_eq!(pixels, vec![[0.1, 0.2, 0.3, 0.4]; 2]);
        assert_eq!(s.read_output(export), Some(pixels.as_slice()));
    }

    #[test]
    fn test_decompose_then_combine_keeps_every_pixel() {
        let mut s = session(3, 1);
        let pixels = vec![[0.1, 0.2, 0.3, 0.4], [0.5, 0.6, 0.7, 0.8], [0.9, 0.0, 0.25, 1.0]];
        let import = s.add_node(Node::of_kind(NodeKind::Import));
        s.bind_source_bitmap(import, Arc::new(Bitmap::new(3, 1, pixels.clone()).unwrap()))
            .unwrap();
        let split = s.add_node(Node::of_kind(NodeKind::DecomposeChannels));
        let merge = s.add_node(Node::of_kind(NodeKind::CombineChannels));
        s.connect_named(import, "Color", split, "Color").unwrap();
        for channel in ["R", "G", "B", "A"] {
            s.connect_named(split, channel, merge, channel).unwrap();
        }
        let export = export_of(&mut s, merge, "Color");

        assert_eq!(s.evaluate(export).unwrap(), pixels);
    }

    #[test]
    fn test_mark_dirty_reruns_node() {
        let mut s = session(2, 2);
        let c = color(&mut s, [0.3, 0.6, 0.9, 1.0]);
        let export = export_of(&mut s, c, "Value");

        let first = s.evaluate(export).unwrap();
        let before = s.process_count(c);
        assert!(!s.is_dirty(c));

        s.mark_dirty(c);
        assert!(s.is_dirty(c));
        let second = s.evaluate(export).unwrap();
        assert_eq!(s.process_count(c), before + 1);
        assert_eq!(second, first);
        assert!(!s.is_dirty(c));
    }

    #[test]
    fn test_disconnected_inputs_are_zero() {
        let mut s = session(3, 1);
        let merge = s.add_node(Node::of_kind(NodeKind::CombineChannels));
        let export = export_of(&mut s, merge, "Color");
        assert_eq!(s.evaluate(export).unwrap(), vec![[0.0; 4]; 3]);

        let lonely = s.add_node(Node::of_kind(NodeKind::Export));
        assert_eq!(s.evaluate(lonely).unwrap(), vec![[0.0; 4]; 3]);
    }

    #[test]
    fn test_blend_normal_full_strength() {
        let mut s = session(1, 1);
        let a = color(&mut s, [0.9, 0.1, 0.3, 1.0]);
        let b = color(&mut s, [0.2, 0.7, 0.5, 0.0]);
        let blend = s.add_node(
            Node::of_kind(NodeKind::Blend)
                .with_parameter("mode", BlendMode::Normal)
                .with_parameter("strength", 1.0_f32),
        );
        s.connect_named(a, "Value", blend, "A").unwrap();
        s.connect_named(b, "Value", blend, "B").unwrap();
        let export = export_of(&mut s, blend, "Out");

        let pixels = s.evaluate(export).unwrap();
        assert!(close(pixels[0], [0.9, 0.1, 0.3, 1.0]));
    }

    #[test]
    fn test_divide_by_zero_follows_ieee() {
        let mut s = session(1, 1);
        let a = s.add_node(Node::of_kind(NodeKind::ConstantFloat).with_parameter("value", 1.0_f32));
        let b = s.add_node(Node::of_kind(NodeKind::ConstantFloat).with_parameter("value", 0.0_f32));
        let split_a = s.add_node(Node::of_kind(NodeKind::DecomposeChannels));
        let split_b = s.add_node(Node::of_kind(NodeKind::DecomposeChannels));
        let math = s.add_node(Node::of_kind(NodeKind::Math).with_parameter("mode", MathMode::Divide));
        let merge = s.add_node(Node::of_kind(NodeKind::CombineChannels));
        s.connect_named(a, "Value", split_a, "Color").unwrap();
        s.connect_named(b, "Value", split_b, "Color").unwrap();
        s.connect_named(split_a, "R", math, "A").unwrap();
        s.connect_named(split_b, "R", math, "B").unwrap();
        s.connect_named(math, "Out", merge, "R").unwrap();
        let export = export_of(&mut s, merge, "Color");

        let pixels = s.evaluate(export).unwrap();
        assert_eq!(pixels[0][0], f32::INFINITY);
        assert_eq!(pixels[0][1], 0.0);
    }

    #[test]
    fn test_parameter_change_dirties_and_reevaluates() {
        let mut s = session(2, 2);
        let c = color(&mut s, [1.0, 0.0, 0.0, 1.0]);
        let export = export_of(&mut s, c, "Value");
        let fired = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&fired);
        s.on_dirty(move |node| log.borrow_mut().push(node));

        let first = s.evaluate(export).unwrap();
        assert_eq!(s.evaluate(export).unwrap(), first);
        assert!(!s.is_dirty(c));

        let previous = s.set_parameter(c, "value", [0.0_f32, 1.0, 0.0, 1.0]).unwrap();
        assert_eq!(previous, Parameter::Vector4([1.0, 0.0, 0.0, 1.0]));
        assert!(s.is_dirty(c));
        assert_eq!(fired.borrow().as_slice(), &[c]);
        assert!(s.cached_output(s.graph().node(c).unwrap().outputs[0].id).is_none());

        let second = s.evaluate(export).unwrap();
        assert_eq!(second, vec![[0.0, 1.0, 0.0, 1.0]; 4]);
        assert!(!s.is_dirty(c));
    }

    #[test]
    fn test_parameter_type_is_enforced() {
        let mut s = session(1, 1);
        let c = color(&mut s, [1.0; 4]);
        assert!(matches!(
            s.set_parameter(c, "value", 2.0_f32),
            Err(EvaluationError::Parameter { .. })
        ));
        assert!(!s.is_dirty(c));
    }

    #[test]
    fn test_dimension_change_resizes_everything() {
        let mut s = session(2, 2);
        let import = s.add_node(Node::of_kind(NodeKind::Import));
        s.bind_source_bitmap(import, Arc::new(Bitmap::solid(4, 4, [0.5, 0.5, 0.5, 1.0]).unwrap()))
            .unwrap();
        let export = export_of(&mut s, import, "Color");
        assert_eq!(s.evaluate(export).unwrap().len(), 4);

        s.set_dimensions(3, 5).unwrap();
        assert!(s.is_dirty(export));
        assert_eq!(s.cache_len(), 0);
        assert!(s.read_output(export).is_none());

        let pixels = s.evaluate(export).unwrap();
        assert_eq!(pixels.len(), 15);
        assert!(pixels.iter().all(|p| close(*p, [0.5, 0.5, 0.5, 1.0])));

        assert!(matches!(s.set_dimensions(0, 5), Err(EvaluationError::Dimensions(_))));
    }

    #[test]
    fn test_unbound_import_yields_zeros() {
        let mut s = session(2, 1);
        let import = s.add_node(Node::of_kind(NodeKind::Import));
        let export = export_of(&mut s, import, "Color");
        assert_eq!(s.evaluate(export).unwrap(), vec![[0.0; 4]; 2]);

        s.bind_source_bitmap(import, Arc::new(Bitmap::solid(2, 1, [1.0; 4]).unwrap()))
            .unwrap();
        assert_eq!(s.evaluate(export).unwrap(), vec![[1.0; 4]; 2]);
        assert!(s.unbind_source_bitmap(import));
        assert_eq!(s.evaluate(export).unwrap(), vec![[0.0; 4]; 2]);

        let c = color(&mut s, [1.0; 4]);
        assert!(matches!(
            s.bind_source_bitmap(c, Arc::new(Bitmap::solid(1, 1, [1.0; 4]).unwrap())),
            Err(EvaluationError::WrongKind { .. })
        ));
    }

    #[test]
    fn test_cycle_is_reported() {
        let mut s = session(1, 1);
        let first = s.add_node(Node::of_kind(NodeKind::Blend));
        let second = s.add_node(Node::of_kind(NodeKind::Blend));
        s.connect_named(first, "Out", second, "A").unwrap();
        s.connect_named(second, "Out", first, "A").unwrap();
        let export = export_of(&mut s, second, "Out");

        let err = s.evaluate(export).unwrap_err();
        assert!(matches!(err, EvaluationError::CycleDetected(_)));
        assert!(err.is_invalid_configuration());
        assert_eq!(s.cache_len(), 0);
    }

    #[test]
    fn test_redirect_is_transparent() {
        let mut s = session(1, 1);
        let c = color(&mut s, [0.3, 0.3, 0.3, 1.0]);
        let redirect = s.add_node(Node::redirect(ElementType::Vector4, ElementType::Vector4));
        s.connect_named(c, "Value", redirect, "In").unwrap();
        let export = export_of(&mut s, redirect, "Out");

        assert_eq!(s.evaluate(export).unwrap(), vec![[0.3, 0.3, 0.3, 1.0]]);
        assert_eq!(s.process_count(redirect), 0);
    }

    #[test]
    fn test_retyping_redirect_is_a_type_mismatch() {
        let mut s = session(1, 1);
        let c = color(&mut s, [0.3, 0.3, 0.3, 1.0]);
        let redirect = s.add_node(Node::redirect(ElementType::Vector4, ElementType::Scalar));
        let merge = s.add_node(Node::of_kind(NodeKind::CombineChannels));
        s.connect_named(c, "Value", redirect, "In").unwrap();
        s.connect_named(redirect, "Out", merge, "R").unwrap();
        let export = export_of(&mut s, merge, "Color");

        assert!(matches!(
            s.evaluate(export),
            Err(EvaluationError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        let mut s = session(1, 1);
        let blend = s.add_node(Node::of_kind(NodeKind::Blend).with_parameter("mode", 42));
        let export = export_of(&mut s, blend, "Out");
        assert_eq!(
            s.evaluate(export).unwrap_err(),
            EvaluationError::InvalidMode {
                node: blend,
                parameter: "mode",
                value: 42,
            }
        );
    }

    #[test]
    fn test_sink_must_be_export() {
        let mut s = session(1, 1);
        let c = color(&mut s, [1.0; 4]);
        assert!(matches!(s.evaluate(c), Err(EvaluationError::WrongKind { .. })));
        assert!(matches!(
            s.evaluate(NodeId::new()),
            Err(EvaluationError::NodeNotFound(_))
        ));
        assert_eq!(s.default_sink(), None);
    }

    #[test]
    fn test_remove_node_dirties_consumers() {
        let mut s = session(1, 1);
        let c = color(&mut s, [1.0; 4]);
        let export = export_of(&mut s, c, "Value");
        s.evaluate(export).unwrap();

        assert!(s.remove_node(c).is_some());
        assert!(s.is_dirty(export));
        assert_eq!(s.graph().connection_count(), 0);
        assert_eq!(s.evaluate(export).unwrap(), vec![[0.0; 4]]);
    }

    #[test]
    fn test_disconnect_dirties_consumer() {
        let mut s = session(1, 1);
        let c = color(&mut s, [1.0; 4]);
        let export = s.add_node(Node::of_kind(NodeKind::Export));
        let id = s.connect_named(c, "Value", export, "Color").unwrap();
        assert_eq!(s.evaluate(export).unwrap(), vec![[1.0; 4]]);

        assert!(s.disconnect(id).is_some());
        assert!(s.is_dirty(export));
        assert_eq!(s.evaluate(export).unwrap(), vec![[0.0; 4]]);
    }
}
