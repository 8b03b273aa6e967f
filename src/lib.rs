// SPDX-License-Identifier: MPL-2.0

//! Mirror - a camera used as a mirror
//!
//! This library provides the capture session behind the `mirror` binary:
//! device discovery and selection, a serialized session worker, horizontal
//! mirroring, still capture and saving.
//!
//! # Architecture
//!
//! - [`backends`]: Camera device backends and the camera permission gate
//! - [`session`]: The capture session controller and its worker
//! - [`pipelines`]: Photo post-processing, encoding and sinks
//! - [`config`]: Preference store and typed preferences
//! - [`storage`]: Photo library paths
//!
//! # Example
//!
//! ```no_run
//! use mirror::backends::camera::virtual_camera::VirtualBackend;
//! use mirror::backends::permission::StaticPermission;
//! use mirror::config::MemoryPreferenceStore;
//! use mirror::session::{CaptureSessionController, DEFAULT_WAIT, SessionPhase};
//! use std::sync::Arc;
//!
//! let controller = CaptureSessionController::new(
//!     Arc::new(VirtualBackend::with_default_devices()),
//!     Arc::new(StaticPermission::authorized()),
//!     Arc::new(MemoryPreferenceStore::new()),
//! )?;
//! controller.activate()?;
//! controller.wait_for_phase(SessionPhase::Running, DEFAULT_WAIT);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod pipelines;
pub mod session;
pub mod storage;

// Re-export commonly used types
pub use backends::camera::types::{CameraFrame, DeviceDescriptor, DevicePosition};
pub use config::{Config, PreferenceStore};
pub use errors::{AppError, AppResult, CaptureError};
pub use pipelines::photo::CapturedPhoto;
pub use session::{CaptureSessionController, SessionEvent, SessionPhase, SessionSnapshot};
