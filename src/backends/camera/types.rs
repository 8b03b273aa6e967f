// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Camera backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraBackendType {
    /// Video4Linux2 capture devices (Linux)
    V4l2,
    /// Synthetic devices producing a test pattern
    Virtual,
}

impl Default for CameraBackendType {
    fn default() -> Self {
        if cfg!(target_os = "linux") {
            CameraBackendType::V4l2
        } else {
            CameraBackendType::Virtual
        }
    }
}

impl std::fmt::Display for CameraBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraBackendType::V4l2 => write!(f, "V4L2"),
            CameraBackendType::Virtual => write!(f, "virtual"),
        }
    }
}

/// Where a camera faces relative to the screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePosition {
    Front,
    Back,
    #[default]
    Unspecified,
}

impl std::fmt::Display for DevicePosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DevicePosition::Front => write!(f, "front"),
            DevicePosition::Back => write!(f, "back"),
            DevicePosition::Unspecified => write!(f, "unspecified"),
        }
    }
}

/// Device information from V4L2 capability
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Driver name (V4L2 driver)
    pub driver: String,
    /// Bus the device hangs off (e.g. `usb-0000:00:14.0-6`)
    pub bus_info: String,
    /// Device node (e.g., /dev/video0)
    pub path: String,
}

/// Snapshot of a physical camera taken at enumeration time
///
/// Two descriptors are equal when their ids are equal; the rest is metadata
/// that may legitimately differ between enumerations.
#[derive(Debug, Clone)]
pub struct DeviceDescriptor {
    /// Opaque id, stable across enumerations and restarts
    pub id: String,
    /// Human readable name
    pub name: String,
    pub position: DevicePosition,
    /// V4L2 details, diagnostics only
    pub device_info: Option<DeviceInfo>,
}

impl DeviceDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, position: DevicePosition) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            position,
            device_info: None,
        }
    }
}

impl PartialEq for DeviceDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for DeviceDescriptor {}

impl std::hash::Hash for DeviceDescriptor {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Pixel formats negotiated with capture hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Motion JPEG, each buffer is a complete JPEG image
    MJPG,
    /// Packed 4:2:2 (Y0 U Y1 V)
    YUYV,
    /// Packed 4:2:2 (U Y0 V Y1)
    UYVY,
    /// 32-bit RGBA, the format every frame leaves the backend in
    RGBA,
}

impl PixelFormat {
    /// Map a V4L2 FourCC to a format we can decode
    pub fn from_fourcc(fourcc: &[u8; 4]) -> Option<Self> {
        match fourcc {
            b"MJPG" | b"JPEG" => Some(Self::MJPG),
            b"YUYV" | b"YUY2" => Some(Self::YUYV),
            b"UYVY" => Some(Self::UYVY),
            b"AB24" | b"RGBA" => Some(Self::RGBA),
            _ => None,
        }
    }

    pub fn fourcc(&self) -> [u8; 4] {
        match self {
            Self::MJPG => *b"MJPG",
            Self::YUYV => *b"YUYV",
            Self::UYVY => *b"UYVY",
            Self::RGBA => *b"AB24",
        }
    }

    /// Negotiation preference, lower is better
    pub fn preference(&self) -> u8 {
        match self {
            Self::MJPG => 0,
            Self::YUYV => 1,
            Self::UYVY => 2,
            Self::RGBA => 3,
        }
    }
}

/// Camera format specification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraFormat {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
}

impl std::fmt::Display for CameraFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{} {:?}", self.width, self.height, self.pixel_format)
    }
}

/// A single RGBA frame from the camera
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA pixels (`width * 4` bytes per row)
    pub data: Arc<[u8]>,
    /// Frame counter of the producing input
    pub sequence: u64,
    /// True once a horizontal flip has been applied
    pub mirrored: bool,
    /// Timestamp when frame was captured
    pub captured_at: Instant,
}

impl CameraFrame {
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>, sequence: u64) -> Self {
        Self {
            width,
            height,
            data: Arc::from(data.into_boxed_slice()),
            sequence,
            mirrored: false,
            captured_at: Instant::now(),
        }
    }

    /// Row stride in bytes
    pub fn stride(&self) -> u32 {
        self.width * 4
    }

    /// Return a horizontally flipped copy of this frame
    pub fn flip_horizontal(&self) -> Self {
        let row = self.stride() as usize;
        let mut flipped = Vec::with_capacity(self.data.len());
        for line in self.data.chunks_exact(row) {
            for pixel in line.chunks_exact(4).rev() {
                flipped.extend_from_slice(pixel);
            }
        }

        Self {
            width: self.width,
            height: self.height,
            data: Arc::from(flipped.into_boxed_slice()),
            sequence: self.sequence,
            mirrored: !self.mirrored,
            captured_at: self.captured_at,
        }
    }
}

/// Flash setting for still capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlashMode {
    #[default]
    Off,
    On,
    Auto,
}

/// Per-shot still capture settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PhotoSettings {
    pub flash: FlashMode,
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for backend operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Backend is not available on this system
    NotAvailable(String),
    /// The OS refused access to the device
    PermissionDenied(String),
    /// Failed to initialize the device
    InitializationFailed(String),
    /// Camera device not found
    DeviceNotFound(String),
    /// Device went away while in use
    Disconnected(String),
    /// Format not supported
    FormatNotSupported(String),
    /// No frame arrived in time
    Timeout,
    /// Input is not streaming
    NotStreaming,
    /// General I/O error
    IoError(String),
    /// Other errors
    Other(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::NotAvailable(msg) => write!(f, "Backend not available: {}", msg),
            BackendError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            BackendError::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::Disconnected(msg) => write!(f, "Device disconnected: {}", msg),
            BackendError::FormatNotSupported(msg) => write!(f, "Format not supported: {}", msg),
            BackendError::Timeout => write!(f, "Timed out waiting for a frame"),
            BackendError::NotStreaming => write!(f, "Input is not streaming"),
            BackendError::IoError(msg) => write!(f, "I/O error: {}", msg),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}
