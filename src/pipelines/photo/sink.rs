// SPDX-License-Identifier: MPL-2.0

//! Photo sinks
//!
//! Where a captured photo ends up: the photo library folder, or a file the
//! user picks in a save dialog.

use super::CapturedPhoto;
use super::encoding::{EncodingFormat, PhotoEncoder};
use crate::constants::app_info;
use crate::errors::CaptureError;
use crate::storage;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Result of handing a photo to a sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(PathBuf),
    /// The user dismissed the dialog
    Cancelled,
}

/// Destination for captured photos
pub trait PhotoSink: Send + Sync {
    fn name(&self) -> &'static str;

    /// Persist `photo`; blocks for file I/O and dialogs
    fn save(&self, photo: &CapturedPhoto) -> Result<SaveOutcome, CaptureError>;
}

/// Writes photos into a library folder with timestamped names
#[derive(Debug, Clone)]
pub struct LibrarySink {
    dir: PathBuf,
}

impl LibrarySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Sink for `<Pictures>/Mirror`
    pub fn in_pictures() -> Result<Self, CaptureError> {
        storage::photo_library_dir()
            .map(Self::new)
            .ok_or_else(|| CaptureError::SaveFailed("No pictures directory for this user".into()))
    }

    fn ensure_writable(&self) -> Result<(), CaptureError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            CaptureError::SaveFailed(format!("Cannot create {}: {}", self.dir.display(), e))
        })?;

        let metadata = std::fs::metadata(&self.dir)?;
        if metadata.permissions().readonly() {
            return Err(CaptureError::SaveFailed(format!(
                "{} is not writable",
                self.dir.display()
            )));
        }
        Ok(())
    }
}

impl PhotoSink for LibrarySink {
    fn name(&self) -> &'static str {
        "library"
    }

    fn save(&self, photo: &CapturedPhoto) -> Result<SaveOutcome, CaptureError> {
        self.ensure_writable()?;

        let path = storage::unique_photo_path(&self.dir, photo.format.extension());
        std::fs::write(&path, &photo.data[..]).map_err(|e| {
            CaptureError::SaveFailed(format!("Failed to write {}: {}", path.display(), e))
        })?;

        info!(path = %path.display(), bytes = photo.data.len(), "Photo saved to library");
        Ok(SaveOutcome::Saved(path))
    }
}

/// Asks the user where to save with a native save dialog
#[derive(Debug, Clone, Default)]
pub struct DialogSink {
    start_dir: Option<PathBuf>,
}

impl DialogSink {
    pub fn new() -> Self {
        Self {
            start_dir: storage::photo_library_dir().filter(|dir| dir.exists()),
        }
    }
}

/// Final path and format for a file chosen in the dialog
///
/// The chosen extension decides the format; a missing or unknown
/// extension keeps the photo's own format and gets its extension added.
pub fn resolve_dialog_path(path: PathBuf, photo_format: EncodingFormat) -> (PathBuf, EncodingFormat) {
    let chosen = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(EncodingFormat::from_extension);

    match chosen {
        Some(format) => (path, format),
        None => {
            let mut name = path.into_os_string();
            name.push(".");
            name.push(photo_format.extension());
            (PathBuf::from(name), photo_format)
        }
    }
}

impl PhotoSink for DialogSink {
    fn name(&self) -> &'static str {
        "dialog"
    }

    fn save(&self, photo: &CapturedPhoto) -> Result<SaveOutcome, CaptureError> {
        let default_name = storage::photo_file_name(
            chrono::Utc::now().timestamp(),
            EncodingFormat::Jpeg.extension(),
        );

        let mut dialog = rfd::FileDialog::new()
            .set_title(app_info::SAVE_DIALOG_TITLE)
            .add_filter("JPEG image", &["jpg", "jpeg"])
            .add_filter("PNG image", &["png"])
            .set_file_name(&default_name);
        if let Some(dir) = &self.start_dir {
            dialog = dialog.set_directory(dir);
        }

        let Some(chosen) = dialog.save_file() else {
            debug!("Save dialog cancelled");
            return Ok(SaveOutcome::Cancelled);
        };

        let (path, format) = resolve_dialog_path(chosen, photo.format);
        let data = if format == photo.format {
            photo.data.to_vec()
        } else {
            warn!(from = ?photo.format, to = ?format, "Re-encoding photo for chosen file type");
            PhotoEncoder::with(format, Default::default()).transcode(&photo.data, photo.format)?
        };

        std::fs::write(&path, data).map_err(|e| {
            CaptureError::SaveFailed(format!("Failed to write {}: {}", path.display(), e))
        })?;

        info!(path = %path.display(), "Photo saved via dialog");
        Ok(SaveOutcome::Saved(path))
    }
}
