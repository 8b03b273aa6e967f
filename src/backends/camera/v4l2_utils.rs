// SPDX-License-Identifier: GPL-3.0-only

//! Shared V4L2 utility functions
//!
//! Raw `VIDIOC_QUERYCAP` access. The `v4l` crate reports the aggregate
//! capability flags, which on multi-node devices (UVC capture + metadata)
//! do not tell the two nodes apart; `device_caps` does.

use super::types::DeviceInfo;
use std::os::unix::io::{AsRawFd, RawFd};
use tracing::debug;

/// VIDIOC_QUERYCAP ioctl number
const VIDIOC_QUERYCAP: libc::c_ulong = 0x80685600;

/// V4L2 capability flag for single-planar video capture
const V4L2_CAP_VIDEO_CAPTURE: u32 = 0x00000001;
/// V4L2 capability flag for streaming I/O
const V4L2_CAP_STREAMING: u32 = 0x04000000;
/// Set when `device_caps` is filled in
const V4L2_CAP_DEVICE_CAPS: u32 = 0x80000000;

/// V4L2 capability structure for VIDIOC_QUERYCAP ioctl
#[repr(C)]
struct V4l2Capability {
    driver: [u8; 16],
    card: [u8; 32],
    bus_info: [u8; 32],
    version: u32,
    capabilities: u32,
    device_caps: u32,
    reserved: [u32; 3],
}

/// Decoded capabilities of one device node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeCapabilities {
    pub driver: String,
    pub card: String,
    pub bus_info: String,
    /// Node supports streaming video capture (not a metadata node)
    pub is_video_capture: bool,
}

/// Query V4L2 capabilities for an open file descriptor.
fn query_v4l2_cap(fd: RawFd) -> Option<V4l2Capability> {
    let mut cap: V4l2Capability = unsafe { std::mem::zeroed() };
    let result = unsafe { libc::ioctl(fd, VIDIOC_QUERYCAP as _, &mut cap as *mut V4l2Capability) };
    if result < 0 { None } else { Some(cap) }
}

/// NUL-terminated C string field to String
fn c_field(bytes: &[u8]) -> String {
    let len = bytes.iter().position(|&c| c == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..len]).trim().to_string()
}

/// Query a device node's capabilities
///
/// Returns None if the node cannot be opened or the ioctl fails.
pub fn query_node(device_path: &str) -> Option<NodeCapabilities> {
    let file = std::fs::File::open(device_path).ok()?;
    let cap = query_v4l2_cap(file.as_raw_fd())?;

    // Use device_caps if available, otherwise capabilities
    let caps = if cap.capabilities & V4L2_CAP_DEVICE_CAPS != 0 && cap.device_caps != 0 {
        cap.device_caps
    } else {
        cap.capabilities
    };

    let node = NodeCapabilities {
        driver: c_field(&cap.driver),
        card: c_field(&cap.card),
        bus_info: c_field(&cap.bus_info),
        is_video_capture: caps & V4L2_CAP_VIDEO_CAPTURE != 0 && caps & V4L2_CAP_STREAMING != 0,
    };

    debug!(device_path, card = %node.card, driver = %node.driver, capture = node.is_video_capture, "Queried V4L2 node");
    Some(node)
}

/// Build DeviceInfo from a queried node
pub fn build_device_info(device_path: &str, node: &NodeCapabilities) -> DeviceInfo {
    DeviceInfo {
        driver: node.driver.clone(),
        bus_info: node.bus_info.clone(),
        path: device_path.to_string(),
    }
}

/// Check whether the current process may open a device node read/write
pub fn is_accessible(device_path: &str) -> bool {
    let Ok(c_path) = std::ffi::CString::new(device_path) else {
        return false;
    };
    unsafe { libc::access(c_path.as_ptr(), libc::R_OK | libc::W_OK) == 0 }
}

/// List `/dev/video*` nodes ordered by their index
pub fn video_nodes() -> Vec<String> {
    let mut nodes: Vec<(u32, String)> = std::fs::read_dir("/dev")
        .into_iter()
        .flatten()
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            let index = name.strip_prefix("video")?.parse::<u32>().ok()?;
            Some((index, format!("/dev/{}", name)))
        })
        .collect();

    nodes.sort_by_key(|(index, _)| *index);
    nodes.into_iter().map(|(_, path)| path).collect()
}

/// Read the `removable` attribute of the USB port a node hangs off
///
/// Laptop webcams sit on ports the firmware marks `fixed`; plugged-in
/// cameras report `removable` or `unknown`. Non-USB nodes return None.
pub fn usb_port_removable(device_path: &str) -> Option<String> {
    let name = device_path.rsplit('/').next()?;
    let interface = std::fs::canonicalize(format!("/sys/class/video4linux/{}/device", name)).ok()?;
    let value = std::fs::read_to_string(interface.parent()?.join("removable")).ok()?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
