// SPDX-License-Identifier: MIT OR Apache-2.0
//! Project documents.
//!
//! A project describes a graph by name: nodes are addressed by a key chosen
//! in the document and ports by their names, so the file stays readable and
//! independent of the random ids the engine assigns.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use texture_graph::graph::DimensionError;
use texture_graph::nodes::{bump_map, io};
use texture_graph::{
    ConnectionError, Dimensions, ElementType, Graph, GraphSession, Node, NodeId, NodeKind, Parameter,
    ParameterError, ParameterSet,
};

/// Current project format version
pub const PROJECT_FORMAT_VERSION: u32 = 1;

/// Error loading or building a project
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    /// File could not be read or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Document is not valid RON
    #[error("Invalid project document: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Document could not be serialized
    #[error("Could not serialize project: {0}")]
    Serialize(#[from] ron::Error),

    /// Document was written by a newer version
    #[error("Project version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version in the document
        found: u32,
        /// Newest version this build reads
        supported: u32,
    },

    /// Node kind is not in the catalog
    #[error("Node '{key}' has unknown kind '{kind}'")]
    UnknownKind {
        /// Node key
        key: String,
        /// Kind identifier
        kind: String,
    },

    /// Two nodes share a key
    #[error("Duplicate node key '{0}'")]
    DuplicateKey(String),

    /// Connection names a node that does not exist
    #[error("Connection refers to unknown node '{0}'")]
    UnknownNode(String),

    /// Parameter override rejected
    #[error("Invalid parameter on node '{key}': {source}")]
    Parameter {
        /// Node key
        key: String,
        /// Underlying error
        source: ParameterError,
    },

    /// Connection rejected by the graph
    #[error("Cannot connect {from} to {to}: {source}")]
    Connection {
        /// `node.port` of the producer
        from: String,
        /// `node.port` of the consumer
        to: String,
        /// Underlying error
        source: ConnectionError,
    },

    /// Width or height is zero
    #[error(transparent)]
    Dimensions(#[from] DimensionError),

    /// Nothing to render
    #[error("Project has no export node")]
    NoExport,
}

/// A node in a project document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeEntry {
    /// Name used by connections
    pub key: String,
    /// Catalog identifier, e.g. `blend`
    pub kind: String,
    /// Values replacing the defaults of the kind
    #[serde(default, skip_serializing_if = "ParameterSet::is_empty")]
    pub parameters: ParameterSet,
    /// Editor position
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<[f32; 2]>,
    /// Input and output element types of a redirect node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retype: Option<(ElementType, ElementType)>,
}

impl NodeEntry {
    /// Entry with default parameters
    pub fn new(key: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            key: key.into(),
            kind: kind.id().to_string(),
            parameters: ParameterSet::new(),
            position: None,
            retype: None,
        }
    }

    /// Override a parameter
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Parameter>) -> Self {
        self.parameters.insert(name, value);
        self
    }

    fn to_node(&self) -> Result<Node, ProjectError> {
        let kind = NodeKind::from_id(&self.kind).ok_or_else(|| ProjectError::UnknownKind {
            key: self.key.clone(),
            kind: self.kind.clone(),
        })?;

        let mut node = match (kind, self.retype) {
            (NodeKind::Redirect, Some((input, output))) => Node::redirect(input, output),
            _ => Node::of_kind(kind),
        };
        node.name = self.key.clone();
        if let Some([x, y]) = self.position {
            node = node.with_position(x, y);
        }
        for (name, value) in self.parameters.iter() {
            node.params
                .update(name, value.clone())
                .map_err(|source| ProjectError::Parameter {
                    key: self.key.clone(),
                    source,
                })?;
        }
        Ok(node)
    }
}

/// A connection in a project document, as `(node key, port name)` pairs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionEntry {
    /// Producer
    pub from: (String, String),
    /// Consumer
    pub to: (String, String),
}

impl ConnectionEntry {
    /// Connect `from_node.from_port` to `to_node.to_port`
    pub fn new(from_node: &str, from_port: &str, to_node: &str, to_port: &str) -> Self {
        Self {
            from: (from_node.to_string(), from_port.to_string()),
            to: (to_node.to_string(), to_port.to_string()),
        }
    }
}

/// A project file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDocument {
    /// Format version
    pub version: u32,
    /// Graph name
    #[serde(default)]
    pub name: String,
    /// Output width
    pub width: u32,
    /// Output height
    pub height: u32,
    /// Rendered file, relative to the project file
    pub output: PathBuf,
    /// Nodes
    pub nodes: Vec<NodeEntry>,
    /// Connections
    #[serde(default)]
    pub connections: Vec<ConnectionEntry>,
}

impl ProjectDocument {
    /// Starter project turning `input.png` into a normal map
    pub fn template() -> Self {
        Self {
            version: PROJECT_FORMAT_VERSION,
            name: "normal_map".to_string(),
            width: 512,
            height: 512,
            output: PathBuf::from("normal.png"),
            nodes: vec![
                NodeEntry::new("source", NodeKind::Import)
                    .with(io::SOURCE, Parameter::Object(Some("input.png".to_string()))),
                NodeEntry::new("bump", NodeKind::BumpMap).with(bump_map::MODE, bump_map::BumpMapMode::Normal),
                NodeEntry::new("export", NodeKind::Export),
            ],
            connections: vec![
                ConnectionEntry::new("source", "Color", "bump", "Color"),
                ConnectionEntry::new("bump", "Color", "export", "Color"),
            ],
        }
    }

    /// Parse a document, rejecting newer format versions
    pub fn parse(content: &str) -> Result<Self, ProjectError> {
        let document: ProjectDocument = ron::from_str(content)?;
        if document.version > PROJECT_FORMAT_VERSION {
            return Err(ProjectError::UnsupportedVersion {
                found: document.version,
                supported: PROJECT_FORMAT_VERSION,
            });
        }
        Ok(document)
    }

    /// Load a document from a file
    pub fn load(path: &Path) -> Result<Self, ProjectError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Pretty-printed RON text
    pub fn to_ron(&self) -> Result<String, ProjectError> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        Ok(ron::ser::to_string_pretty(self, config)?)
    }

    /// Save the document to a file
    pub fn save(&self, path: &Path) -> Result<(), ProjectError> {
        std::fs::write(path, self.to_ron()?)?;
        Ok(())
    }

    /// Build the graph and an evaluation session for it
    pub fn build(&self) -> Result<Project, ProjectError> {
        let dimensions = Dimensions::new(self.width, self.height)?;
        let mut graph = Graph::new(self.name.clone(), dimensions);

        let mut keys = HashMap::new();
        for entry in &self.nodes {
            if keys.contains_key(&entry.key) {
                return Err(ProjectError::DuplicateKey(entry.key.clone()));
            }
            let id = graph.add_node(entry.to_node()?);
            keys.insert(entry.key.clone(), id);
        }

        for connection in &self.connections {
            let (from_key, from_port) = &connection.from;
            let (to_key, to_port) = &connection.to;
            let lookup = |key: &String| {
                keys.get(key)
                    .copied()
                    .ok_or_else(|| ProjectError::UnknownNode(key.clone()))
            };
            let from_node = lookup(from_key)?;
            let to_node = lookup(to_key)?;
            graph
                .connect_named(from_node, from_port, to_node, to_port)
                .map_err(|source| ProjectError::Connection {
                    from: format!("{from_key}.{from_port}"),
                    to: format!("{to_key}.{to_port}"),
                    source,
                })?;
        }

        let session = GraphSession::new(graph);
        let sink = session.default_sink().ok_or(ProjectError::NoExport)?;
        tracing::debug!(
            nodes = self.nodes.len(),
            connections = self.connections.len(),
            "project built"
        );
        Ok(Project { session, keys, sink })
    }
}

/// A built project, ready to render
#[derive(Debug)]
pub struct Project {
    /// Evaluation session
    pub session: GraphSession,
    /// Node ids by document key
    pub keys: HashMap<String, NodeId>,
    /// Export node to render
    pub sink: NodeId,
}

impl Project {
    /// Import nodes naming a source file, with the file name
    pub fn sources(&self) -> Vec<(NodeId, String)> {
        self.session
            .graph()
            .nodes()
            .filter(|node| node.kind == NodeKind::Import)
            .filter_map(|node| match node.params.object(io::SOURCE) {
                Ok(Some(source)) => Some((node.id, source.to_string())),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_round_trip() {
        let document = ProjectDocument::template();
        let text = document.to_ron().unwrap();
        let loaded = ProjectDocument::parse(&text).unwrap();
        assert_eq!(loaded, document);
    }

    #[test]
    fn test_build_template() {
        let project = ProjectDocument::template().build().unwrap();
        assert_eq!(project.session.graph().node_count(), 3);
        assert_eq!(project.session.graph().connection_count(), 2);
        assert_eq!(project.keys["export"], project.sink);
        assert_eq!(project.sources(), vec![(project.keys["source"], "input.png".to_string())]);
    }

    #[test]
    fn test_render_without_bitmaps() {
        let mut document = ProjectDocument::template();
        document.width = 2;
        document.height = 2;
        let mut project = document.build().unwrap();
        // Unbound import gives a flat height field
        let pixels = project.session.evaluate(project.sink).unwrap();
        assert_eq!(pixels, vec![[0.5, 0.5, 1.0, 1.0]; 4]);
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let mut document = ProjectDocument::template();
        document.version = PROJECT_FORMAT_VERSION + 1;
        let text = document.to_ron().unwrap();
        assert!(matches!(
            ProjectDocument::parse(&text),
            Err(ProjectError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn test_parse_handwritten_document() {
        let text = r#"
            (
                version: 1,
                width: 1,
                height: 1,
                output: "out.png",
                nodes: [
                    (key: "red", kind: "constant_color", parameters: {"value": Vector4((1.0, 0.0, 0.0, 1.0))}),
                    (key: "out", kind: "export_texture"),
                ],
                connections: [
                    (from: ("red", "Value"), to: ("out", "Color")),
                ],
            )
        "#;
        let mut project = ProjectDocument::parse(text).unwrap().build().unwrap();
        assert_eq!(project.session.evaluate(project.sink).unwrap(), vec![[1.0, 0.0, 0.0, 1.0]]);
    }

    #[test]
    fn test_demo_project_builds() {
        let document = ProjectDocument::parse(include_str!("../../../demos/tinted_normals.ron")).unwrap();
        let mut project = document.build().unwrap();
        assert_eq!(project.sources().len(), 1);

        project.session.set_dimensions(4, 4).unwrap();
        let pixels = project.session.evaluate(project.sink).unwrap();
        assert_eq!(pixels.len(), 16);
        assert!(pixels.iter().all(|p| p[3] == 1.0 && p.iter().all(|c| c.is_finite())));
    }

    #[test]
    fn test_build_errors() {
        let mut document = ProjectDocument::template();
        document.nodes[1].kind = "catenary".to_string();
        assert!(matches!(document.build(), Err(ProjectError::UnknownKind { .. })));

        let mut document = ProjectDocument::template();
        document.nodes[1] = NodeEntry::new("bump", NodeKind::BumpMap).with(bump_map::MODE, 0.5_f32);
        assert!(matches!(document.build(), Err(ProjectError::Parameter { .. })));

        let mut document = ProjectDocument::template();
        document.nodes.push(NodeEntry::new("bump", NodeKind::Blend));
        assert!(matches!(document.build(), Err(ProjectError::DuplicateKey(_))));

        let mut document = ProjectDocument::template();
        document.connections.push(ConnectionEntry::new("ghost", "Out", "export", "Color"));
        assert!(matches!(document.build(), Err(ProjectError::UnknownNode(_))));

        let mut document = ProjectDocument::template();
        document.connections.push(ConnectionEntry::new("source", "Color", "export", "Color"));
        assert!(matches!(document.build(), Err(ProjectError::Connection { .. })));

        let mut document = ProjectDocument::template();
        document.nodes.pop();
        document.connections.pop();
        assert!(matches!(document.build(), Err(ProjectError::NoExport)));

        let mut document = ProjectDocument::template();
        document.width = 0;
        assert!(matches!(document.build(), Err(ProjectError::Dimensions(_))));
    }
}
