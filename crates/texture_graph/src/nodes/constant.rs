// SPDX-License-Identifier: MIT OR Apache-2.0
//! Constant color and constant float sources.

use super::ParameterResultExt;
use crate::evaluation::{EvaluationContext, EvaluationError};
use crate::node::{Node, NodeCategory, NodeKind, NodeType};
use crate::params::ParameterSet;
use crate::port::{ElementType, Port};
use crate::value::Rgba;

/// Output port
pub const VALUE: &str = "Value";

/// Parameter holding the constant
pub const VALUE_PARAM: &str = "value";

pub(super) fn color_type() -> NodeType {
    NodeType {
        kind: NodeKind::ConstantColor,
        name: "Constant Color".to_string(),
        category: NodeCategory::Input,
        description: "Same color at every pixel".to_string(),
        inputs: vec![],
        outputs: vec![Port::output(VALUE, ElementType::Vector4)],
        parameters: ParameterSet::new().with(VALUE_PARAM, [1.0_f32; 4]),
    }
}

pub(super) fn float_type() -> NodeType {
    NodeType {
        kind: NodeKind::ConstantFloat,
        name: "Constant Float".to_string(),
        category: NodeCategory::Input,
        description: "Same value in every channel of every pixel".to_string(),
        inputs: vec![],
        // Broadcast to all four channels so it can feed color inputs directly
        outputs: vec![Port::output(VALUE, ElementType::Vector4)],
        parameters: ParameterSet::new().with(VALUE_PARAM, 1.0_f32),
    }
}

pub(super) fn process_color(node: &Node, ctx: &mut EvaluationContext<'_>) -> Result<(), EvaluationError> {
    let color = node.params.vector4(VALUE_PARAM).for_node(node.id)?;
    let pixels = vec![color; ctx.pixel_count()];
    ctx.store::<Rgba>(node, VALUE, pixels)
}

pub(super) fn process_float(node: &Node, ctx: &mut EvaluationContext<'_>) -> Result<(), EvaluationError> {
    let value = node.params.float(VALUE_PARAM).for_node(node.id)?;
    let pixels = vec![[value; 4]; ctx.pixel_count()];
    ctx.store::<Rgba>(node, VALUE, pixels)
}
