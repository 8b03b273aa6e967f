// SPDX-License-Identifier: MPL-2.0

//! Error types for the mirror camera
//!
//! [`CaptureError`] is the set of failures surfaced to whoever drives the
//! capture session. Every variant has a user-visible message; none of them
//! are retried automatically.

use crate::backends::camera::types::BackendError;
use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Capture session failures
    Capture(CaptureError),
    /// Configuration / preference store errors
    Config(String),
    /// Storage/filesystem errors
    Storage(String),
    /// Generic error with message
    Other(String),
}

/// Failures reported by the capture session controller and the photo sinks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// Camera access has not been authorized
    PermissionDenied,
    /// No capture device is attached
    NoDeviceAvailable,
    /// The selected device cannot be opened or went away
    DeviceUnavailable(String),
    /// The device failed to produce a still image
    CaptureFailed(String),
    /// The raw capture could not be turned into a standard image
    EncodeFailed(String),
    /// Persisting the photo failed
    SaveFailed(String),
}

impl CaptureError {
    /// Message suitable for showing to the user
    pub fn user_message(&self) -> String {
        match self {
            CaptureError::PermissionDenied => {
                "Camera access denied. Grant access to use the mirror.".to_string()
            }
            CaptureError::NoDeviceAvailable => "No camera found.".to_string(),
            CaptureError::DeviceUnavailable(device) => {
                format!("Camera {} is not available.", device)
            }
            CaptureError::CaptureFailed(msg) => format!("Failed to capture photo: {}", msg),
            CaptureError::EncodeFailed(_) => "Failed to process photo data".to_string(),
            CaptureError::SaveFailed(msg) => format!("Failed to save: {}", msg),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Capture(e) => write!(f, "Capture error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::PermissionDenied => write!(f, "Camera permission denied"),
            CaptureError::NoDeviceAvailable => write!(f, "No camera device available"),
            CaptureError::DeviceUnavailable(device) => {
                write!(f, "Camera device unavailable: {}", device)
            }
            CaptureError::CaptureFailed(msg) => write!(f, "Capture failed: {}", msg),
            CaptureError::EncodeFailed(msg) => write!(f, "Encoding failed: {}", msg),
            CaptureError::SaveFailed(msg) => write!(f, "Save failed: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for CaptureError {}

impl From<CaptureError> for AppError {
    fn from(err: CaptureError) -> Self {
        AppError::Capture(err)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

// Disconnects and missing devices are the same thing from the caller's side
impl From<BackendError> for CaptureError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::DeviceNotFound(device) | BackendError::Disconnected(device) => {
                CaptureError::DeviceUnavailable(device)
            }
            BackendError::PermissionDenied(_) => CaptureError::PermissionDenied,
            other => CaptureError::CaptureFailed(other.to_string()),
        }
    }
}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        CaptureError::SaveFailed(err.to_string())
    }
}

impl From<image::ImageError> for CaptureError {
    fn from(err: image::ImageError) -> Self {
        CaptureError::EncodeFailed(err.to_string())
    }
}
