// SPDX-License-Identifier: MPL-2.0

//! Camera backend abstraction
//!
//! A backend answers two questions: which cameras are attached, and how to
//! open one of them as a session input.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────┐
//! │ CaptureSessionController │  ← selection, lifecycle, worker queue
//! └────────────┬─────────────┘
//!              │
//!              ▼
//! ┌──────────────────────────┐
//! │   CameraBackend trait    │  ← enumerate + open
//! └────────────┬─────────────┘
//!              │
//!        ┌─────┴──────┐
//!        ▼            ▼
//!    ┌──────┐    ┌─────────┐
//!    │ V4L2 │    │ Virtual │
//!    └──────┘    └─────────┘
//! ```
//!
//! The concrete backend is picked once, from [`CameraBackendType`], rather
//! than branching on the platform throughout the session code.

pub mod format_converters;
pub mod types;
#[cfg(target_os = "linux")]
pub mod v4l2;
#[cfg(target_os = "linux")]
pub mod v4l2_utils;
pub mod virtual_camera;

pub use types::*;

use std::sync::Arc;
use tracing::warn;

/// Device discovery and input creation
///
/// Shared between the caller's thread (enumeration) and the session worker
/// (opening inputs), hence `Send + Sync`.
pub trait CameraBackend: Send + Sync {
    /// Enumerate attached video capture devices
    ///
    /// Must be cheap enough to call repeatedly for hot-plug detection and
    /// return devices in a stable order.
    fn enumerate_cameras(&self) -> Vec<DeviceDescriptor>;

    /// Open a device for capture
    ///
    /// The returned input is not streaming yet; call [`CameraInput::start`].
    fn open(&self, device: &DeviceDescriptor) -> BackendResult<Box<dyn CameraInput>>;

    /// Get the backend type identifier
    fn backend_type(&self) -> CameraBackendType;

    /// Check if this backend is usable on the current system
    fn is_available(&self) -> bool;
}

/// An opened camera attached to a session
///
/// Owned exclusively by the session worker. Dropping an input releases the
/// underlying device.
pub trait CameraInput: Send {
    /// Descriptor the input was opened from
    fn descriptor(&self) -> &DeviceDescriptor;

    /// Negotiated format
    fn format(&self) -> CameraFormat;

    /// Start streaming frames
    fn start(&mut self) -> BackendResult<()>;

    /// Stop streaming; the device stays open
    fn stop(&mut self) -> BackendResult<()>;

    fn is_streaming(&self) -> bool;

    /// Block until the next live frame is available
    ///
    /// Returns [`BackendError::Timeout`] when nothing arrived in time and
    /// [`BackendError::Disconnected`] when the device is gone.
    fn next_frame(&mut self) -> BackendResult<CameraFrame>;

    /// Capture a still image with the given settings
    fn capture_still(&mut self, settings: &PhotoSettings) -> BackendResult<CameraFrame>;
}

/// Get a backend instance for the requested type
///
/// Falls back to the virtual backend when the requested one is not built
/// for this platform.
pub fn get_backend_for_type(backend_type: CameraBackendType) -> Arc<dyn CameraBackend> {
    match backend_type {
        #[cfg(target_os = "linux")]
        CameraBackendType::V4l2 => Arc::new(v4l2::V4l2Backend::new()),
        #[cfg(not(target_os = "linux"))]
        CameraBackendType::V4l2 => {
            warn!("V4L2 backend not available on this platform, using virtual cameras");
            Arc::new(virtual_camera::VirtualBackend::with_default_devices())
        }
        CameraBackendType::Virtual => Arc::new(virtual_camera::VirtualBackend::with_default_devices()),
    }
}

/// Get the default backend for this platform
pub fn get_backend() -> Arc<dyn CameraBackend> {
    let backend = get_backend_for_type(CameraBackendType::default());
    if !backend.is_available() {
        warn!(backend = %backend.backend_type(), "Default camera backend reports unavailable");
    }
    backend
}
