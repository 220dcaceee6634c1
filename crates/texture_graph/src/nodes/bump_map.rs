// SPDX-License-Identifier: MIT OR Apache-2.0
//! Height map and normal map conversion.

use crate::evaluation::{EvaluationContext, EvaluationError};
use crate::node::{Node, NodeCategory, NodeKind, NodeType};
use crate::params::ParameterSet;
use crate::port::{ElementType, Port};
use crate::value::Rgba;
use glam::Vec3;

/// Input and output port
pub const COLOR: &str = "Color";
/// Conversion selector
pub const MODE: &str = "mode";

/// Horizontal/vertical step scale of the tangent vectors
const TANGENT_SCALE: f32 = 100.0;

int_mode! {
    /// What the bump map node produces
    BumpMapMode {
        /// Tangent-space normal map from the input's luminance
        Normal = 0,
        /// Greyscale height map
        Height = 1,
    }
}

/// Mean of the color channels, ignoring alpha
pub fn luminance(pixel: Rgba) -> f32 {
    (pixel[0] + pixel[1] + pixel[2]) / 3.0
}

/// Greyscale opaque pixel of the given height
pub fn height_pixel(pixel: Rgba) -> Rgba {
    let h = luminance(pixel);
    [h, h, h, 1.0]
}

/// Normal map of a row-major height field.
///
/// Neighbors wrap around both edges, so the image is treated as a torus.
/// Returns `None` when `heights` does not hold `width * height` samples.
pub fn normal_map(heights: &[f32], width: usize, height: usize) -> Option<Vec<Rgba>> {
    let len = heights.len();
    if len != width * height {
        return None;
    }
    if len == 0 {
        return Some(Vec::new());
    }

    let step_x = TANGENT_SCALE / width as f32;
    let step_y = TANGENT_SCALE / height as f32;

    let normals = (0..len)
        .map(|i| {
            let column = i % width;
            let up = heights[(i + len - width) % len];
            let down = heights[(i + width) % len];
            let right = heights[if column == width - 1 { i + 1 - width } else { i + 1 }];
            let left = heights[if column == 0 { i + width - 1 } else { i - 1 }];

            let vertical = Vec3::new(step_x, 0.0, down - up).normalize();
            let horizontal = Vec3::new(0.0, step_y, right - left).normalize();
            let n = vertical.cross(horizontal).normalize();
            [n.y * 0.5 + 0.5, n.x * 0.5 + 0.5, n.z * 0.5 + 0.5, 1.0]
        })
        .collect();
    Some(normals)
}

pub(super) fn node_type() -> NodeType {
    NodeType {
        kind: NodeKind::BumpMap,
        name: "Bump Map".to_string(),
        category: NodeCategory::Filter,
        description: "Converts a color into a height map or a normal map".to_string(),
        inputs: vec![Port::input(COLOR, ElementType::Vector4)],
        outputs: vec![Port::output(COLOR, ElementType::Vector4)],
        parameters: ParameterSet::new().with(MODE, BumpMapMode::Normal),
    }
}

pub(super) fn process(node: &Node, ctx: &mut EvaluationContext<'_>) -> Result<(), EvaluationError> {
    let mode: BumpMapMode = super::mode(node, MODE)?;
    let input = ctx.pull::<Rgba>(node, COLOR)?;
    let out: Vec<Rgba> = match mode {
        BumpMapMode::Height => input.into_iter().map(height_pixel).collect(),
        BumpMapMode::Normal => {
            let dimensions = ctx.dimensions();
            let heights: Vec<f32> = input.into_iter().map(luminance).collect();
            normal_map(&heights, dimensions.width() as usize, dimensions.height() as usize).ok_or(
                EvaluationError::LengthMismatch {
                    port: node.inputs[0].id,
                    expected: ctx.pixel_count(),
                    actual: heights.len(),
                },
            )?
        }
    };
    ctx.store(node, COLOR, out)
}
