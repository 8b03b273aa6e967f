// SPDX-License-Identifier: MPL-2.0

//! Post-processing for captured frames
//!
//! RGBA to RGB conversion (drop alpha channel) and the horizontal flip that
//! keeps a photo consistent with a mirrored preview.

use crate::backends::camera::types::CameraFrame;
use crate::errors::CaptureError;
use image::RgbImage;
use image::imageops;
use tracing::debug;

/// Post-processing configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostProcessingConfig {
    /// Flip horizontally so the photo matches a mirror view
    pub mirror: bool,
}

/// Processed image data
pub struct ProcessedImage {
    pub image: RgbImage,
    pub width: u32,
    pub height: u32,
}

/// Post-processor for captured frames
pub struct PostProcessor {
    config: PostProcessingConfig,
}

impl PostProcessor {
    /// Create a new post-processor with the given configuration
    pub fn new(config: PostProcessingConfig) -> Self {
        Self { config }
    }

    /// Turn a raw RGBA frame into an RGB image
    ///
    /// A frame that was already flipped upstream is not flipped again.
    pub fn process(&self, frame: &CameraFrame) -> Result<ProcessedImage, CaptureError> {
        let mut image = Self::convert_rgba_to_rgb(&frame.data, frame.width, frame.height)?;

        if self.config.mirror && !frame.mirrored {
            imageops::flip_horizontal_in_place(&mut image);
        }

        debug!(
            width = frame.width,
            height = frame.height,
            mirror = self.config.mirror,
            "Post-processing complete"
        );

        Ok(ProcessedImage {
            width: frame.width,
            height: frame.height,
            image,
        })
    }

    /// Convert RGBA data to RGB image (drop alpha channel)
    fn convert_rgba_to_rgb(rgba_data: &[u8], width: u32, height: u32) -> Result<RgbImage, CaptureError> {
        let expected_size = (width * height * 4) as usize;
        if width == 0 || height == 0 || rgba_data.len() < expected_size {
            return Err(CaptureError::EncodeFailed(format!(
                "RGBA data too small: expected {}, got {}",
                expected_size,
                rgba_data.len()
            )));
        }

        let rgb_data: Vec<u8> = rgba_data
            .chunks_exact(4)
            .take((width * height) as usize)
            .flat_map(|rgba| [rgba[0], rgba[1], rgba[2]])
            .collect();

        RgbImage::from_raw(width, height, rgb_data).ok_or_else(|| {
            CaptureError::EncodeFailed("Failed to create RGB image from converted data".to_string())
        })
    }
}
