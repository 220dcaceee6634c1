// SPDX-License-Identifier: MIT OR Apache-2.0
//! Reading source bitmaps from disk and writing rendered textures.

use std::path::Path;
use texture_graph::{Bitmap, BitmapError, Rgba};

/// Error reading or writing an image file
#[derive(Debug, thiserror::Error)]
pub enum ImageIoError {
    /// Decoding or encoding failed
    #[error("Image error for {path}: {source}")]
    Image {
        /// File involved
        path: String,
        /// Underlying error
        source: image::ImageError,
    },

    /// Decoded image could not become a bitmap
    #[error(transparent)]
    Bitmap(#[from] BitmapError),

    /// Pixel count does not match the requested size
    #[error("Cannot write {actual} pixels as a {width}x{height} image")]
    Size {
        /// Target width
        width: u32,
        /// Target height
        height: u32,
        /// Pixels supplied
        actual: usize,
    },
}

/// Decode an image file into a float bitmap
pub fn load_bitmap(path: &Path) -> Result<Bitmap, ImageIoError> {
    let image = image::open(path).map_err(|source| ImageIoError::Image {
        path: path.display().to_string(),
        source,
    })?;
    let image = image.to_rgba32f();
    let (width, height) = image.dimensions();
    tracing::debug!(path = %path.display(), width, height, "loaded source image");
    Ok(Bitmap::from_interleaved(width, height, image.as_raw())?)
}

/// Quantize float pixels to 8-bit RGBA, clamping to `[0, 1]`
pub fn to_rgba8(width: u32, height: u32, pixels: &[Rgba]) -> Result<image::RgbaImage, ImageIoError> {
    let size_error = || ImageIoError::Size {
        width,
        height,
        actual: pixels.len(),
    };
    if pixels.len() != width as usize * height as usize {
        return Err(size_error());
    }
    let samples: Vec<u8> = bytemuck::cast_slice::<Rgba, f32>(pixels)
        .iter()
        .map(|&v| {
            let v = if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
            (v * 255.0).round() as u8
        })
        .collect();
    image::RgbaImage::from_raw(width, height, samples).ok_or_else(size_error)
}

/// Write float pixels as an 8-bit image; the format follows the extension
pub fn save_pixels(path: &Path, width: u32, height: u32, pixels: &[Rgba]) -> Result<(), ImageIoError> {
    to_rgba8(width, height, pixels)?
        .save(path)
        .map_err(|source| ImageIoError::Image {
            path: path.display().to_string(),
            source,
        })
}
