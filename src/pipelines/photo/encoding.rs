// SPDX-License-Identifier: GPL-3.0-only

//! Photo encoding
//!
//! This module handles encoding processed images to standard formats:
//! - JPEG (with quality control)
//! - PNG (lossless)

use super::processing::ProcessedImage;
use crate::config::PhotoOutputFormat;
use crate::errors::CaptureError;
use image::{ImageFormat, RgbImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use tracing::debug;

/// Supported encoding formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingFormat {
    /// JPEG format (lossy compression)
    Jpeg,
    /// PNG format (lossless compression)
    Png,
}

impl EncodingFormat {
    /// Get file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            EncodingFormat::Jpeg => "jpg",
            EncodingFormat::Png => "png",
        }
    }

    /// Format matching a file extension, case-insensitive
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(EncodingFormat::Jpeg),
            "png" => Some(EncodingFormat::Png),
            _ => None,
        }
    }

    fn to_image_format(self) -> ImageFormat {
        match self {
            EncodingFormat::Jpeg => ImageFormat::Jpeg,
            EncodingFormat::Png => ImageFormat::Png,
        }
    }
}

impl From<PhotoOutputFormat> for EncodingFormat {
    fn from(format: PhotoOutputFormat) -> Self {
        match format {
            PhotoOutputFormat::Jpeg => EncodingFormat::Jpeg,
            PhotoOutputFormat::Png => EncodingFormat::Png,
        }
    }
}

/// JPEG quality presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingQuality {
    /// Low quality (high compression)
    Low,
    /// Medium quality (balanced)
    Medium,
    /// High quality (low compression)
    #[default]
    High,
    /// Maximum quality (minimal compression)
    Maximum,
}

impl EncodingQuality {
    /// Get JPEG quality value (0-100)
    pub fn jpeg_quality(&self) -> u8 {
        match self {
            EncodingQuality::Low => 60,
            EncodingQuality::Medium => 80,
            EncodingQuality::High => 90,
            EncodingQuality::Maximum => 98,
        }
    }
}

/// Photo encoder
#[derive(Debug, Clone, Copy)]
pub struct PhotoEncoder {
    format: EncodingFormat,
    quality: EncodingQuality,
}

impl PhotoEncoder {
    /// Create a new encoder with JPEG format and high quality
    pub fn new() -> Self {
        Self {
            format: EncodingFormat::Jpeg,
            quality: EncodingQuality::High,
        }
    }

    pub fn with(format: EncodingFormat, quality: EncodingQuality) -> Self {
        Self { format, quality }
    }

    /// Set encoding format
    pub fn set_format(&mut self, format: EncodingFormat) {
        self.format = format;
    }

    /// Set encoding quality (only affects JPEG)
    pub fn set_quality(&mut self, quality: EncodingQuality) {
        self.quality = quality;
    }

    pub fn format(&self) -> EncodingFormat {
        self.format
    }

    /// Encode a processed image
    pub fn encode(&self, processed: &ProcessedImage) -> Result<Vec<u8>, CaptureError> {
        let data = match self.format {
            EncodingFormat::Jpeg => Self::encode_jpeg(&processed.image, self.quality)?,
            EncodingFormat::Png => Self::encode_png(&processed.image)?,
        };

        debug!(
            format = ?self.format,
            width = processed.width,
            height = processed.height,
            size = data.len(),
            "Encoding complete"
        );
        Ok(data)
    }

    /// Re-encode already encoded image bytes into this encoder's format
    pub fn transcode(&self, data: &[u8], from: EncodingFormat) -> Result<Vec<u8>, CaptureError> {
        if from == self.format {
            return Ok(data.to_vec());
        }

        let decoded = image::load_from_memory_with_format(data, from.to_image_format())
            .map_err(|e| CaptureError::EncodeFailed(format!("Failed to decode photo: {}", e)))?;
        let image = decoded.to_rgb8();
        let processed = ProcessedImage {
            width: image.width(),
            height: image.height(),
            image,
        };
        self.encode(&processed)
    }

    /// Encode image as JPEG
    fn encode_jpeg(image: &RgbImage, quality: EncodingQuality) -> Result<Vec<u8>, CaptureError> {
        let mut buffer = Vec::new();
        let mut cursor = Cursor::new(&mut buffer);

        let mut encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality.jpeg_quality());

        encoder
            .encode(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ExtendedColorType::Rgb8,
            )
            .map_err(|e| CaptureError::EncodeFailed(format!("JPEG encoding failed: {}", e)))?;

        Ok(buffer)
    }

    /// Encode image as PNG
    fn encode_png(image: &RgbImage) -> Result<Vec<u8>, CaptureError> {
        let mut buffer = Vec::new();

        image
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .map_err(|e| CaptureError::EncodeFailed(format!("PNG encoding failed: {}", e)))?;

        Ok(buffer)
    }
}

impl Default for PhotoEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> ProcessedImage {
        let image = RgbImage::from_fn(width, height, |x, y| image::Rgb([(x * 10) as u8, (y * 10) as u8, 50]));
        ProcessedImage {
            image,
            width,
            height,
        }
    }

    #[test]
    fn test_format_extensions() {
        assert_eq!(EncodingFormat::Jpeg.extension(), "jpg");
        assert_eq!(EncodingFormat::Png.extension(), "png");
        assert_eq!(EncodingFormat::from_extension("JPEG"), Some(EncodingFormat::Jpeg));
        assert_eq!(EncodingFormat::from_extension("gif"), None);
    }

    #[test]
    fn test_jpeg_quality_values() {
        assert_eq!(EncodingQuality::Low.jpeg_quality(), 60);
        assert_eq!(EncodingQuality::Medium.jpeg_quality(), 80);
        assert_eq!(EncodingQuality::default().jpeg_quality(), 90);
        assert_eq!(EncodingQuality::Maximum.jpeg_quality(), 98);
    }

    #[test]
    fn test_encoded_bytes_have_signature() {
        let jpeg = PhotoEncoder::new().encode(&gradient(8, 4)).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

        let png = PhotoEncoder::with(EncodingFormat::Png, EncodingQuality::High)
            .encode(&gradient(8, 4))
            .unwrap();
        assert_eq!(&png[1..4], b"PNG");
    }

    #[test]
    fn test_transcode_png_to_jpeg() {
        let png = PhotoEncoder::with(EncodingFormat::Png, EncodingQuality::High)
            .encode(&gradient(8, 4))
            .unwrap();
        let jpeg = PhotoEncoder::new().transcode(&png, EncodingFormat::Png).unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 4));
    }

    #[test]
    fn test_transcode_garbage_is_encode_failure() {
        let result = PhotoEncoder::new().transcode(b"nope", EncodingFormat::Png);
        assert!(matches!(result, Err(CaptureError::EncodeFailed(_))));
    }
}
