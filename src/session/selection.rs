// SPDX-License-Identifier: MPL-2.0

//! Default camera selection
//!
//! Name matching is a heuristic that depends on how drivers label their
//! devices, so the hint lists are user preferences rather than constants.

use crate::backends::camera::types::{DeviceDescriptor, DevicePosition};
use crate::errors::CaptureError;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Name hints steering the fallback choice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionPolicy {
    /// Substrings marking a built-in camera
    pub preferred_name_hints: Vec<String>,
    /// Substrings marking a linked or networked camera
    pub deprioritized_name_hints: Vec<String>,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            preferred_name_hints: vec!["facetime".into(), "built-in".into(), "integrated".into()],
            deprioritized_name_hints: vec!["continuity".into(), "iphone".into()],
        }
    }
}

impl SelectionPolicy {
    fn matches(hints: &[String], name: &str) -> bool {
        let name = name.to_lowercase();
        hints
            .iter()
            .filter(|hint| !hint.is_empty())
            .any(|hint| name.contains(&hint.to_lowercase()))
    }

    pub fn is_preferred(&self, device: &DeviceDescriptor) -> bool {
        Self::matches(&self.preferred_name_hints, &device.name)
    }

    pub fn is_deprioritized(&self, device: &DeviceDescriptor) -> bool {
        Self::matches(&self.deprioritized_name_hints, &device.name)
    }
}

/// Pick the device a session should use
///
/// The persisted id wins when it is still attached. Otherwise, in order:
/// a front camera, a camera named like a built-in one, any camera that is
/// not a linked device, and finally the first camera listed. Linked
/// devices never win over an ordinary one.
pub fn choose_device<'a>(
    devices: &'a [DeviceDescriptor],
    persisted: Option<&str>,
    policy: &SelectionPolicy,
) -> Result<&'a DeviceDescriptor, CaptureError> {
    if let Some(id) = persisted
        && let Some(device) = devices.iter().find(|d| d.id == id)
    {
        debug!(device = %device, "Using persisted camera");
        return Ok(device);
    }

    let ordinary = || devices.iter().filter(|d| !policy.is_deprioritized(d));

    let chosen = ordinary()
        .find(|d| d.position == DevicePosition::Front)
        .or_else(|| ordinary().find(|d| policy.is_preferred(d)))
        .or_else(|| ordinary().next())
        .or_else(|| devices.first())
        .ok_or(CaptureError::NoDeviceAvailable)?;

    debug!(device = %chosen, persisted, "Fallback camera chosen");
    Ok(chosen)
}
