// SPDX-License-Identifier: MIT OR Apache-2.0
//! Remapping every channel through a tone curve.

use super::ParameterResultExt;
use crate::curve::Curve;
use crate::evaluation::{EvaluationContext, EvaluationError};
use crate::node::{Node, NodeCategory, NodeKind, NodeType};
use crate::params::ParameterSet;
use crate::port::{ElementType, Port};
use crate::value::Rgba;

/// Input and output port
pub const COLOR: &str = "Color";
/// Curve shared by the four channels
pub const CURVE: &str = "curve";

/// Apply the curve to each channel, alpha included
pub fn apply(curve: &Curve, pixel: Rgba) -> Rgba {
    pixel.map(|channel| curve.evaluate(channel))
}

pub(super) fn node_type() -> NodeType {
    NodeType {
        kind: NodeKind::ToneCurve,
        name: "Tone Curve".to_string(),
        category: NodeCategory::Filter,
        description: "Remaps each channel through a curve".to_string(),
        inputs: vec![Port::input(COLOR, ElementType::Vector4)],
        outputs: vec![Port::output(COLOR, ElementType::Vector4)],
        parameters: ParameterSet::new().with(CURVE, Curve::identity()),
    }
}

pub(super) fn process(node: &Node, ctx: &mut EvaluationContext<'_>) -> Result<(), EvaluationError> {
    let curve = node.params.curve(CURVE).for_node(node.id)?;
    let input = ctx.pull::<Rgba>(node, COLOR)?;
    let out: Vec<Rgba> = input.into_iter().map(|pixel| apply(curve, pixel)).collect();
    ctx.store(node, COLOR, out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::CurveKey;

    #[test]
    fn test_identity_passes_through() {
        let pixel = [0.1, 0.5, 0.9, 1.0];
        let out = apply(&Curve::identity(), pixel);
        for (a, b) in out.iter().zip(pixel.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_invert_curve() {
        let invert = Curve::linear(0.0, 1.0, 1.0, 0.0);
        let out = apply(&invert, [0.25, 0.0, 1.0, 0.5]);
        let expected = [0.75, 1.0, 0.0, 0.5];
        for (a, b) in out.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_values_outside_keys_clamp() {
        let curve = Curve::new(vec![CurveKey::new(0.2, 0.3), CurveKey::new(0.8, 0.6)]);
        assert_eq!(apply(&curve, [0.0, 1.0, -4.0, 9.0]), [0.3, 0.6, 0.3, 0.6]);
    }

    #[test]
    fn test_default_is_identity() {
        let node_type = node_type();
        assert_eq!(node_type.parameters.curve(CURVE).unwrap(), &Curve::identity());
    }
}
