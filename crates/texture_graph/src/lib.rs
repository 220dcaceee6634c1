// SPDX-License-Identifier: MIT OR Apache-2.0
//! Texture compositing node graph.
//!
//! Nodes produce one value per pixel on each of their output ports and are
//! connected through typed ports. Evaluation is demand driven: asking an
//! export node for its pixels pulls on its inputs, which run their producing
//! nodes at most once per pass.
//!
//! ## Architecture
//!
//! - [`Graph`] owns the topology: nodes, ports and connections
//! - [`GraphSession`] owns the per-pass cache, the dirty set and the bitmaps
//!   bound by the host, and runs evaluation passes
//! - [`nodes`] holds the built-in catalog
//!
//! ```no_run
//! use texture_graph::{Dimensions, Graph, GraphSession, Node, NodeKind};
//!
//! let mut graph = Graph::new("example", Dimensions::new(256, 256).unwrap());
//! let color = graph.add_node(Node::of_kind(NodeKind::ConstantColor));
//! let export = graph.add_node(Node::of_kind(NodeKind::Export));
//! graph.connect_named(color, "Value", export, "Color").unwrap();
//!
//! let mut session = GraphSession::new(graph);
//! let pixels = session.evaluate(export).unwrap();
//! assert_eq!(pixels.len(), 256 * 256);
//! ```

pub mod bitmap;
pub mod connection;
pub mod curve;
pub mod evaluation;
pub mod graph;
pub mod node;
pub mod nodes;
pub mod params;
pub mod port;
pub mod session;
pub mod value;

pub use bitmap::{Bitmap, BitmapError};
pub use connection::{Connection, ConnectionId, PortRef};
pub use curve::{Curve, CurveKey};
pub use evaluation::{EvaluationContext, EvaluationError, VisitState};
pub use graph::{ConnectionError, Dimensions, Graph};
pub use node::{Node, NodeCategory, NodeId, NodeKind, NodeRegistry, NodeType};
pub use params::{Parameter, ParameterError, ParameterSet};
pub use port::{ElementType, Port, PortCapacity, PortDirection, PortId};
pub use session::GraphSession;
pub use value::{PixelBuffer, Rgba};
