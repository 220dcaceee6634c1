// SPDX-License-Identifier: MIT OR Apache-2.0
//! Import and export nodes: the boundary between the graph and the host.

use super::ParameterResultExt;
use crate::evaluation::{EvaluationContext, EvaluationError};
use crate::node::{Node, NodeCategory, NodeKind, NodeType};
use crate::params::{Parameter, ParameterSet};
use crate::port::{ElementType, Port};
use crate::value::Rgba;

/// Port carrying the color
pub const COLOR: &str = "Color";

/// Host key of the bitmap an import node reads
pub const SOURCE: &str = "source";

pub(super) fn import_type() -> NodeType {
    NodeType {
        kind: NodeKind::Import,
        name: "Import Texture".to_string(),
        category: NodeCategory::Input,
        description: "Bitmap supplied by the host, resampled to the graph size".to_string(),
        inputs: vec![],
        outputs: vec![Port::output(COLOR, ElementType::Vector4)],
        parameters: ParameterSet::new().with(SOURCE, Parameter::Object(None)),
    }
}

pub(super) fn export_type() -> NodeType {
    NodeType {
        kind: NodeKind::Export,
        name: "Export Texture".to_string(),
        category: NodeCategory::Output,
        description: "Copies its input into a buffer the host can read".to_string(),
        inputs: vec![Port::input(COLOR, ElementType::Vector4)],
        outputs: vec![],
        parameters: ParameterSet::new(),
    }
}

pub(super) fn process_import(node: &Node, ctx: &mut EvaluationContext<'_>) -> Result<(), EvaluationError> {
    let pixels = match ctx.source_pixels(node.id) {
        Some(pixels) => pixels,
        None => {
            let source = node.params.object(SOURCE).for_node(node.id)?;
            tracing::debug!(node = %node.name, source, "no bitmap bound, using zeros");
            vec![[0.0; 4]; ctx.pixel_count()]
        }
    };
    ctx.store::<Rgba>(node, COLOR, pixels)
}

pub(super) fn process_export(node: &Node, ctx: &mut EvaluationContext<'_>) -> Result<(), EvaluationError> {
    let pixels = ctx.pull::<Rgba>(node, COLOR)?;
    ctx.publish(node.id, pixels)
}
