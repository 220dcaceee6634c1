// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-pixel arithmetic on scalar arrays.

use crate::evaluation::{EvaluationContext, EvaluationError};
use crate::node::{Node, NodeCategory, NodeKind, NodeType};
use crate::params::ParameterSet;
use crate::port::{ElementType, Port};

/// First operand
pub const A: &str = "A";
/// Second operand
pub const B: &str = "B";
/// Result
pub const OUT: &str = "Out";
/// Operation selector
pub const MODE: &str = "mode";

int_mode! {
    /// Arithmetic operation of a math node
    MathMode {
        /// `a + b`
        Add = 0,
        /// `a - b`
        Subtract = 1,
        /// `a * b`
        Multiply = 2,
        /// `a / b`, IEEE semantics for zero divisors
        Divide = 3,
        /// Truncated remainder, sign of `a`
        Remainder = 4,
        /// `1 - a`, ignores `b`
        Reverse = 5,
    }
}

impl MathMode {
    /// Apply the operation to one pixel
    pub fn apply(self, a: f32, b: f32) -> f32 {
        match self {
            Self::Add => a + b,
            Self::Subtract => a - b,
            Self::Multiply => a * b,
            Self::Divide => a / b,
            Self::Remainder => a % b,
            Self::Reverse => 1.0 - a,
        }
    }
}

pub(super) fn node_type() -> NodeType {
    NodeType {
        kind: NodeKind::Math,
        name: "Math".to_string(),
        category: NodeCategory::Math,
        description: "Per-pixel arithmetic on two scalar inputs".to_string(),
        inputs: vec![Port::input(A, ElementType::Scalar), Port::input(B, ElementType::Scalar)],
        outputs: vec![Port::output(OUT, ElementType::Scalar)],
        parameters: ParameterSet::new().with(MODE, MathMode::Add),
    }
}

pub(super) fn process(node: &Node, ctx: &mut EvaluationContext<'_>) -> Result<(), EvaluationError> {
    let mode: MathMode = super::mode(node, MODE)?;
    let a = ctx.pull::<f32>(node, A)?;
    let b = ctx.pull::<f32>(node, B)?;
    let out: Vec<f32> = a.iter().zip(&b).map(|(&a, &b)| mode.apply(a, b)).collect();
    ctx.store(node, OUT, out)
}
