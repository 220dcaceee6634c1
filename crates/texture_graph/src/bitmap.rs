// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-memory RGBA bitmaps bound to import nodes by the host.

use crate::value::Rgba;
use image::imageops::{self, FilterType};
use image::ImageBuffer;

/// Error building a bitmap
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BitmapError {
    /// Width or height is zero
    #[error("Bitmap dimensions must be positive, got {width}x{height}")]
    EmptyDimensions {
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
    },

    /// Pixel count does not match the dimensions
    #[error("Bitmap of {width}x{height} needs {expected} pixels, got {actual}")]
    PixelCount {
        /// Bitmap width
        width: u32,
        /// Bitmap height
        height: u32,
        /// `width * height`
        expected: usize,
        /// Pixels supplied
        actual: usize,
    },
}

/// Straight-alpha RGBA float bitmap, rows top to bottom
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    pixels: Vec<Rgba>,
}

impl Bitmap {
    /// Create a bitmap from one RGBA value per pixel
    pub fn new(width: u32, height: u32, pixels: Vec<Rgba>) -> Result<Self, BitmapError> {
        if width == 0 || height == 0 {
            return Err(BitmapError::EmptyDimensions { width, height });
        }
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(BitmapError::PixelCount {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Create a bitmap from interleaved RGBA floats
    pub fn from_interleaved(width: u32, height: u32, samples: &[f32]) -> Result<Self, BitmapError> {
        if samples.len() % 4 != 0 {
            return Err(BitmapError::PixelCount {
                width,
                height,
                expected: width as usize * height as usize,
                actual: samples.len() / 4,
            });
        }
        let pixels = samples
            .chunks_exact(4)
            .map(|c| [c[0], c[1], c[2], c[3]])
            .collect();
        Self::new(width, height, pixels)
    }

    /// Bitmap filled with one color
    pub fn solid(width: u32, height: u32, color: Rgba) -> Result<Self, BitmapError> {
        Self::new(width, height, vec![color; width as usize * height as usize])
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixels, row-major
    pub fn pixels(&self) -> &[Rgba] {
        &self.pixels
    }

    /// Pixels as interleaved RGBA floats
    pub fn interleaved(&self) -> &[f32] {
        bytemuck::cast_slice(&self.pixels)
    }

    /// Resample to the given size with a bilinear filter.
    ///
    /// Returns a copy when the size already matches.
    pub fn resample(&self, width: u32, height: u32) -> Vec<Rgba> {
        if width == self.width && height == self.height {
            return self.pixels.clone();
        }

        let source: Option<ImageBuffer<image::Rgba<f32>, &[f32]>> =
            ImageBuffer::from_raw(self.width, self.height, self.interleaved());
        let Some(source) = source else {
            // Dimensions are validated on construction
            return vec![[0.0; 4]; width as usize * height as usize];
        };

        imageops::resize(&source, width, height, FilterType::Triangle)
            .into_raw()
            .chunks_exact(4)
            .map(|c| [c[0], c[1], c[2], c[3]])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_validation() {
        assert!(Bitmap::new(0, 4, vec![]).is_err());
        assert_eq!(
            Bitmap::new(2, 2, vec![[0.0; 4]; 3]),
            Err(BitmapError::PixelCount {
                width: 2,
                height: 2,
                expected: 4,
                actual: 3,
            })
        );
        assert!(Bitmap::from_interleaved(1, 1, &[0.0, 0.0, 0.0]).is_err());
    }

    #[test]
    fn test_interleaved_round_trip() {
        let bitmap = Bitmap::from_interleaved(2, 1, &[1.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.5]).unwrap();
        assert_eq!(bitmap.pixels(), &[[1.0, 0.0, 0.0, 1.0], [0.0, 1.0, 0.0, 0.5]]);
        assert_eq!(bitmap.interleaved().len(), 8);
    }

    #[test]
    fn test_resample_solid_stays_solid() {
        let color = [0.25, 0.5, 0.75, 1.0];
        let bitmap = Bitmap::solid(4, 4, color).unwrap();
        let resampled = bitmap.resample(8, 2);
        assert_eq!(resampled.len(), 16);
        for pixel in resampled {
            for (a, b) in pixel.iter().zip(color.iter()) {
                assert!((a - b).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_resample_same_size_copies() {
        let bitmap = Bitmap::new(2, 1, vec![[1.0; 4], [0.0; 4]]).unwrap();
        assert_eq!(bitmap.resample(2, 1), bitmap.pixels());
    }
}
