// SPDX-License-Identifier: GPL-3.0-only

//! Video4Linux2 camera backend

mod capture;
mod enumeration;

pub use capture::{V4l2Input, choose_format, map_io_error};
pub use enumeration::{ProbedNode, build_descriptors, enumerate_v4l2_cameras};

use super::types::*;
use super::v4l2_utils::video_nodes;
use super::{CameraBackend, CameraInput};
use tracing::{info, warn};

/// Backend over `/dev/video*` capture nodes
#[derive(Debug, Default)]
pub struct V4l2Backend;

impl V4l2Backend {
    pub fn new() -> Self {
        Self
    }
}

impl CameraBackend for V4l2Backend {
    fn enumerate_cameras(&self) -> Vec<DeviceDescriptor> {
        enumerate_v4l2_cameras()
    }

    fn open(&self, device: &DeviceDescriptor) -> BackendResult<Box<dyn CameraInput>> {
        // Node numbers move on replug, so resolve the id against a fresh scan
        let current = enumerate_v4l2_cameras()
            .into_iter()
            .find(|d| d.id == device.id)
            .ok_or_else(|| {
                warn!(id = %device.id, "Camera no longer present");
                BackendError::DeviceNotFound(device.id.clone())
            })?;

        let path = current
            .device_info
            .as_ref()
            .map(|info| info.path.clone())
            .ok_or_else(|| BackendError::DeviceNotFound(device.id.clone()))?;

        let input = V4l2Input::open(&current, &path)?;
        info!(device = %current, path = %path, "V4L2 input opened");
        Ok(Box::new(input))
    }

    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::V4l2
    }

    fn is_available(&self) -> bool {
        !video_nodes().is_empty()
    }
}
