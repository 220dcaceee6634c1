// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in node catalog.
//!
//! Each module provides the type definition (ports and default parameters)
//! and the `process` body of one family of nodes.

/// Declare a mode enum stored as an integer parameter
macro_rules! int_mode {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident = $value:literal,)+ }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant = $value,)+
        }

        impl $name {
            /// Every mode, in parameter order
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            /// Display name
            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant),)+
                }
            }
        }

        impl TryFrom<i32> for $name {
            type Error = i32;

            fn try_from(value: i32) -> Result<Self, Self::Error> {
                match value {
                    $($value => Ok($name::$variant),)+
                    other => Err(other),
                }
            }
        }

        impl From<$name> for $crate::params::Parameter {
            fn from(mode: $name) -> Self {
                $crate::params::Parameter::Int(mode as i32)
            }
        }
    };
}

pub mod blend;
pub mod bump_map;
pub mod channels;
pub mod constant;
pub mod io;
pub mod math;
pub mod tone_curve;

use crate::evaluation::{EvaluationContext, EvaluationError};
use crate::node::{Node, NodeCategory, NodeId, NodeKind, NodeType};
use crate::params::{ParameterError, ParameterSet};
use crate::port::{ElementType, Port};

/// Type definition of a built-in kind
pub fn node_type(kind: NodeKind) -> NodeType {
    match kind {
        NodeKind::Import => io::import_type(),
        NodeKind::Export => io::export_type(),
        NodeKind::ConstantColor => constant::color_type(),
        NodeKind::ConstantFloat => constant::float_type(),
        NodeKind::DecomposeChannels => channels::decompose_type(),
        NodeKind::CombineChannels => channels::combine_type(),
        NodeKind::Math => math::node_type(),
        NodeKind::Blend => blend::node_type(),
        NodeKind::BumpMap => bump_map::node_type(),
        NodeKind::ToneCurve => tone_curve::node_type(),
        NodeKind::Redirect => redirect_type(),
    }
}

/// Run the `process` body of a node
pub(crate) fn process(node: &Node, ctx: &mut EvaluationContext<'_>) -> Result<(), EvaluationError> {
    match node.kind {
        NodeKind::Import => io::process_import(node, ctx),
        NodeKind::Export => io::process_export(node, ctx),
        NodeKind::ConstantColor => constant::process_color(node, ctx),
        NodeKind::ConstantFloat => constant::process_float(node, ctx),
        NodeKind::DecomposeChannels => channels::process_decompose(node, ctx),
        NodeKind::CombineChannels => channels::process_combine(node, ctx),
        NodeKind::Math => math::process(node, ctx),
        NodeKind::Blend => blend::process(node, ctx),
        NodeKind::BumpMap => bump_map::process(node, ctx),
        NodeKind::ToneCurve => tone_curve::process(node, ctx),
        NodeKind::Redirect => Err(EvaluationError::NotProcessable(node.id)),
    }
}

fn redirect_type() -> NodeType {
    NodeType {
        kind: NodeKind::Redirect,
        name: "Redirect".to_string(),
        category: NodeCategory::Utility,
        description: "Routes a connection without computing anything".to_string(),
        inputs: vec![Port::input("In", ElementType::Vector4)],
        outputs: vec![Port::output("Out", ElementType::Vector4)],
        parameters: ParameterSet::new(),
    }
}

/// Attach the node to parameter lookup errors
pub(crate) trait ParameterResultExt<T> {
    fn for_node(self, node: NodeId) -> Result<T, EvaluationError>;
}

impl<T> ParameterResultExt<T> for Result<T, ParameterError> {
    fn for_node(self, node: NodeId) -> Result<T, EvaluationError> {
        self.map_err(|error| EvaluationError::Parameter { node, error })
    }
}

/// Read an integer mode parameter and convert it to its enum
pub(crate) fn mode<M: TryFrom<i32>>(node: &Node, key: &'static str) -> Result<M, EvaluationError> {
    let value = node.params.int(key).for_node(node.id)?;
    M::try_from(value).map_err(|_| EvaluationError::InvalidMode {
        node: node.id,
        parameter: key,
        value,
    })
}
