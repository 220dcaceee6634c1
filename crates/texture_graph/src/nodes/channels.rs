// SPDX-License-Identifier: MIT OR Apache-2.0
//! Splitting colors into scalar channels and merging them back.

use crate::evaluation::{EvaluationContext, EvaluationError};
use crate::node::{Node, NodeCategory, NodeKind, NodeType};
use crate::params::ParameterSet;
use crate::port::{ElementType, Port};
use crate::value::Rgba;

/// Color port on both nodes
pub const COLOR: &str = "Color";

/// Channel ports, in RGBA order
pub const CHANNELS: [&str; 4] = ["R", "G", "B", "A"];

pub(super) fn decompose_type() -> NodeType {
    NodeType {
        kind: NodeKind::DecomposeChannels,
        name: "Decompose Channels".to_string(),
        category: NodeCategory::Channel,
        description: "Splits a color into its R, G, B and A channels".to_string(),
        inputs: vec![Port::input(COLOR, ElementType::Vector4)],
        outputs: CHANNELS
            .iter()
            .map(|name| Port::output(*name, ElementType::Scalar))
            .collect(),
        parameters: ParameterSet::new(),
    }
}

pub(super) fn combine_type() -> NodeType {
    NodeType {
        kind: NodeKind::CombineChannels,
        name: "Combine Channels".to_string(),
        category: NodeCategory::Channel,
        description: "Builds a color from four scalar channels".to_string(),
        inputs: CHANNELS
            .iter()
            .map(|name| Port::input(*name, ElementType::Scalar))
            .collect(),
        outputs: vec![Port::output(COLOR, ElementType::Vector4)],
        parameters: ParameterSet::new(),
    }
}

pub(super) fn process_decompose(node: &Node, ctx: &mut EvaluationContext<'_>) -> Result<(), EvaluationError> {
    let color = ctx.pull::<Rgba>(node, COLOR)?;
    for (index, name) in CHANNELS.iter().enumerate() {
        let channel: Vec<f32> = color.iter().map(|pixel| pixel[index]).collect();
        ctx.store(node, name, channel)?;
    }
    Ok(())
}

pub(super) fn process_combine(node: &Node, ctx: &mut EvaluationContext<'_>) -> Result<(), EvaluationError> {
    let [r, g, b, a] = CHANNELS;
    let r = ctx.pull::<f32>(node, r)?;
    let g = ctx.pull::<f32>(node, g)?;
    let b = ctx.pull::<f32>(node, b)?;
    let a = ctx.pull::<f32>(node, a)?;
    let color: Vec<Rgba> = (0..r.len()).map(|i| [r[i], g[i], b[i], a[i]]).collect();
    ctx.store(node, COLOR, color)
}
