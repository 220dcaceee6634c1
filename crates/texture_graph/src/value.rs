// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-pixel arrays carried between ports, and the coercion layer.
//!
//! Every cached array is stored together with its element type. Pulling an
//! array as a different element type is an error: channel splitting and
//! merging only happens inside the decompose/combine nodes.

use crate::port::ElementType;

/// RGBA color, one per pixel
pub type Rgba = [f32; 4];

/// A per-pixel array tagged with its element type
#[derive(Debug, Clone, PartialEq)]
pub enum PixelBuffer {
    /// One float per pixel
    Scalar(Vec<f32>),
    /// One RGBA vector per pixel
    Vector4(Vec<Rgba>),
}

impl PixelBuffer {
    /// All-zero buffer of the given type and length
    pub fn zeroed(element_type: ElementType, len: usize) -> Self {
        match element_type {
            ElementType::Scalar => Self::Scalar(vec![0.0; len]),
            ElementType::Vector4 => Self::Vector4(vec![[0.0; 4]; len]),
        }
    }

    /// Element type tag
    pub fn element_type(&self) -> ElementType {
        match self {
            Self::Scalar(_) => ElementType::Scalar,
            Self::Vector4(_) => ElementType::Vector4,
        }
    }

    /// Number of pixels
    pub fn len(&self) -> usize {
        match self {
            Self::Scalar(values) => values.len(),
            Self::Vector4(values) => values.len(),
        }
    }

    /// Whether the buffer holds no pixels
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Element types that can be stored in a [`PixelBuffer`]
pub trait Element: Copy + Default + 'static {
    /// Tag matching this Rust type
    const ELEMENT_TYPE: ElementType;

    /// Wrap values into a tagged buffer
    fn into_buffer(values: Vec<Self>) -> PixelBuffer;

    /// Borrow the values if the buffer holds this type
    fn from_buffer(buffer: &PixelBuffer) -> Option<&[Self]>;
}

impl Element for f32 {
    const ELEMENT_TYPE: ElementType = ElementType::Scalar;

    fn into_buffer(values: Vec<Self>) -> PixelBuffer {
        PixelBuffer::Scalar(values)
    }

    fn from_buffer(buffer: &PixelBuffer) -> Option<&[Self]> {
        match buffer {
            PixelBuffer::Scalar(values) => Some(values.as_slice()),
            PixelBuffer::Vector4(_) => None,
        }
    }
}

impl Element for Rgba {
    const ELEMENT_TYPE: ElementType = ElementType::Vector4;

    fn into_buffer(values: Vec<Self>) -> PixelBuffer {
        PixelBuffer::Vector4(values)
    }

    fn from_buffer(buffer: &PixelBuffer) -> Option<&[Self]> {
        match buffer {
            PixelBuffer::Vector4(values) => Some(values.as_slice()),
            PixelBuffer::Scalar(_) => None,
        }
    }
}

/// A buffer was requested as another element type than it holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("expected {expected} elements, found {found}")]
pub struct TypeMismatch {
    /// Requested element type
    pub expected: ElementType,
    /// Stored element type
    pub found: ElementType,
}

/// Convert a tagged buffer into a plain array of `T`.
///
/// Only exact type matches succeed; the values are copied.
pub fn coerce<T: Element>(buffer: &PixelBuffer) -> Result<Vec<T>, TypeMismatch> {
    T::from_buffer(buffer)
        .map(<[T]>::to_vec)
        .ok_or(TypeMismatch {
            expected: T::ELEMENT_TYPE,
            found: buffer.element_type(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match_coerces() {
        let buffer = PixelBuffer::Scalar(vec![0.25, 0.5]);
        let values: Vec<f32> = coerce(&buffer).unwrap();
        assert_eq!(values, vec![0.25, 0.5]);

        let buffer = <Rgba as Element>::into_buffer(vec![[1.0, 0.0, 0.0, 1.0]]);
        let values: Vec<Rgba> = coerce(&buffer).unwrap();
        assert_eq!(values, vec![[1.0, 0.0, 0.0, 1.0]]);
    }

    #[test]
    fn test_mismatch_is_rejected() {
        let buffer = PixelBuffer::Vector4(vec![[1.0; 4]; 3]);
        let err = coerce::<f32>(&buffer).unwrap_err();
        assert_eq!(err.expected, ElementType::Scalar);
        assert_eq!(err.found, ElementType::Vector4);

        let buffer = PixelBuffer::Scalar(vec![1.0; 3]);
        assert!(coerce::<Rgba>(&buffer).is_err());
    }

    #[test]
    fn test_zeroed() {
        let buffer = PixelBuffer::zeroed(ElementType::Vector4, 4);
        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.element_type(), ElementType::Vector4);
        assert_eq!(coerce::<Rgba>(&buffer).unwrap(), vec![[0.0; 4]; 4]);
        assert!(PixelBuffer::zeroed(ElementType::Scalar, 0).is_empty());
    }
}
