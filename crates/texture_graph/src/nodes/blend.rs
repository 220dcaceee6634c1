// SPDX-License-Identifier: MIT OR Apache-2.0
//! Alpha-aware blending of two color arrays.
//!
//! `A` is the layer laid on top of the backdrop `B`. Channels are straight
//! (not premultiplied) alpha.

use super::ParameterResultExt;
use crate::evaluation::{EvaluationContext, EvaluationError};
use crate::node::{Node, NodeCategory, NodeKind, NodeType};
use crate::params::ParameterSet;
use crate::port::{ElementType, Port};
use crate::value::Rgba;

/// Top layer
pub const A: &str = "A";
/// Backdrop
pub const B: &str = "B";
/// Result
pub const OUT: &str = "Out";
/// Blend mode selector
pub const MODE: &str = "mode";
/// Blend strength in `[0, 1]`
pub const STRENGTH: &str = "strength";

int_mode! {
    /// Per-channel blend function
    BlendMode {
        /// `a`
        Normal = 0,
        /// `a + b`
        Addition = 1,
        /// `|a - b|`
        Difference = 2,
        /// `a * b`
        Multiply = 3,
        /// `1 - (1 - a)(1 - b)`
        Screen = 4,
        /// Multiply or screen depending on the backdrop
        Overlay = 5,
        /// Overlay with the layers swapped
        HardLight = 6,
        /// `(1 - 2b)a² + 2ba`
        SoftLight = 7,
        /// Color dodge
        Dodge = 8,
        /// Color burn
        Burn = 9,
    }
}

impl BlendMode {
    /// Blend one channel of the top layer `a` with the backdrop `b`
    pub fn apply(self, a: f32, b: f32) -> f32 {
        match self {
            Self::Normal => a,
            Self::Addition => a + b,
            Self::Difference => (a - b).abs(),
            Self::Multiply => a * b,
            Self::Screen => 1.0 - (1.0 - a) * (1.0 - b),
            Self::Overlay => overlay(a, b),
            Self::HardLight => overlay(b, a),
            Self::SoftLight => (1.0 - 2.0 * b) * a * a + 2.0 * b * a,
            Self::Dodge => safe_divide(b, 1.0 - a),
            Self::Burn => 1.0 - safe_divide(1.0 - b, a),
        }
    }
}

/// `a / b`, or zero when `b` is zero
fn safe_divide(a: f32, b: f32) -> f32 {
    if b == 0.0 {
        0.0
    } else {
        a / b
    }
}

fn overlay(a: f32, b: f32) -> f32 {
    if b > 0.5 {
        b * a * 2.0
    } else {
        1.0 - (1.0 - b) * (1.0 - a) * 2.0
    }
}

/// Linear interpolation with `t` clamped to `[0, 1]`
fn lerp(from: f32, to: f32, t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    from + (to - from) * t
}

/// Composite the top pixel `a` over the backdrop `b`.
///
/// The blend function sees the backdrop channel weighted by its alpha; the
/// result is divided back by the new alpha.
pub fn blend_pixel(mode: BlendMode, a: Rgba, b: Rgba, strength: f32) -> Rgba {
    let t = strength * a[3];
    let alpha = lerp(b[3], 1.0, t);
    let channel = |i: usize| safe_divide(lerp(b[i], mode.apply(a[i], b[i] * b[3]), t), alpha);
    [channel(0), channel(1), channel(2), alpha]
}

pub(super) fn node_type() -> NodeType {
    NodeType {
        kind: NodeKind::Blend,
        name: "Blend".to_string(),
        category: NodeCategory::Math,
        description: "Composites A over B with a blend mode".to_string(),
        inputs: vec![Port::input(A, ElementType::Vector4), Port::input(B, ElementType::Vector4)],
        outputs: vec![Port::output(OUT, ElementType::Vector4)],
        parameters: ParameterSet::new()
            .with(MODE, BlendMode::Normal)
            .with(STRENGTH, 1.0_f32),
    }
}

pub(super) fn process(node: &Node, ctx: &mut EvaluationContext<'_>) -> Result<(), EvaluationError> {
    let mode: BlendMode = super::mode(node, MODE)?;
    let strength = node.params.float(STRENGTH).for_node(node.id)?;
    let a = ctx.pull::<Rgba>(node, A)?;
    let b = ctx.pull::<Rgba>(node, B)?;
    let out: Vec<Rgba> = a
        .iter()
        .zip(&b)
        .map(|(&a, &b)| blend_pixel(mode, a, b, strength))
        .collect();
    ctx.store(node, OUT, out)
}
