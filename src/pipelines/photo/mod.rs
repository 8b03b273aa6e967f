// SPDX-License-Identifier: MPL-2.0

//! Photo pipeline
//!
//! ```text
//! Camera Input → Still Frame → Post-Processing → Encoding → Photo Sink
//!                     (session worker)                    (blocking pool)
//! ```
//!
//! # Pipeline Stages
//!
//! 1. **Capture**: the session worker pulls a still from the active input
//! 2. **Post-Processing**: RGBA to RGB, horizontal flip when mirrored
//! 3. **Encoding**: JPEG or PNG
//! 4. **Sink**: photo library folder or save dialog, off the caller's task

pub mod encoding;
pub mod processing;
pub mod sink;

pub use encoding::{EncodingFormat, EncodingQuality, PhotoEncoder};
pub use processing::{PostProcessingConfig, PostProcessor, ProcessedImage};
pub use sink::{DialogSink, LibrarySink, PhotoSink, SaveOutcome, resolve_dialog_path};

use crate::backends::camera::types::CameraFrame;
use crate::errors::CaptureError;
use std::sync::Arc;
use tracing::info;

/// An encoded still ready to be saved
#[derive(Clone)]
pub struct CapturedPhoto {
    /// Encoded image bytes
    pub data: Arc<[u8]>,
    pub format: EncodingFormat,
    pub width: u32,
    pub height: u32,
    /// Whether the image was flipped to match a mirrored preview
    pub mirrored: bool,
    /// Device the still came from
    pub device_id: String,
}

impl std::fmt::Debug for CapturedPhoto {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapturedPhoto")
            .field("bytes", &self.data.len())
            .field("format", &self.format)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("mirrored", &self.mirrored)
            .field("device_id", &self.device_id)
            .finish()
    }
}

/// Post-processing and encoding in one step
pub struct PhotoPipeline {
    encoder: PhotoEncoder,
}

impl PhotoPipeline {
    pub fn new(encoder: PhotoEncoder) -> Self {
        Self { encoder }
    }

    /// Turn a raw still into an encoded photo
    pub fn develop(
        &self,
        frame: &CameraFrame,
        mirrored: bool,
        device_id: &str,
    ) -> Result<CapturedPhoto, CaptureError> {
        let processed = PostProcessor::new(PostProcessingConfig { mirror: mirrored }).process(frame)?;
        let data = self.encoder.encode(&processed)?;

        Ok(CapturedPhoto {
            data: Arc::from(data),
            format: self.encoder.format(),
            width: processed.width,
            height: processed.height,
            mirrored,
            device_id: device_id.to_string(),
        })
    }

    /// Hand a photo to a sink on the blocking pool
    pub async fn save(
        photo: CapturedPhoto,
        sink: Arc<dyn PhotoSink>,
    ) -> Result<SaveOutcome, CaptureError> {
        info!(sink = sink.name(), device = %photo.device_id, "Saving photo");

        tokio::task::spawn_blocking(move || sink.save(&photo))
            .await
            .map_err(|e| CaptureError::SaveFailed(format!("Save task error: {}", e)))?
    }
}

impl Default for PhotoPipeline {
    fn default() -> Self {
        Self::new(PhotoEncoder::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::virtual_camera::test_pattern;

    #[test]
    fn test_develop_mirrored_png() {
        let frame = CameraFrame::from_rgba(4, 2, test_pattern(4, 2), 7);
        let pipeline = PhotoPipeline::new(PhotoEncoder::with(EncodingFormat::Png, EncodingQuality::High));
        let photo = pipeline.develop(&frame, true, "cam").unwrap();

        assert_eq!((photo.width, photo.height), (4, 2));
        assert!(photo.mirrored);
        let decoded = image::load_from_memory(&photo.data).unwrap().to_rgb8();
        // Leftmost pixel now carries the rightmost red value
        assert_eq!(decoded.get_pixel(0, 0)[0], 255);
        assert_eq!(decoded.get_pixel(3, 0)[0], 0);
    }

    #[test]
    fn test_save_runs_on_blocking_pool() {
        let dir = std::env::temp_dir().join(format!("mirror-pipeline-{}", uuid::Uuid::new_v4()));
        let frame = CameraFrame::from_rgba(4, 2, test_pattern(4, 2), 1);
        let photo = PhotoPipeline::default().develop(&frame, false, "cam").unwrap();

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let outcome = runtime
            .block_on(PhotoPipeline::save(photo, Arc::new(LibrarySink::new(&dir))))
            .unwrap();
        assert!(matches!(outcome, SaveOutcome::Saved(ref path) if path.exists()));
        std::fs::remove_dir_all(dir).unwrap();
    }
}
