// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 camera enumeration
//!
//! Walks `/dev/video*`, keeps the nodes that can stream video capture and
//! turns them into descriptors with ids that survive renumbering of the
//! device nodes (bus + card name rather than `/dev/videoN`).

use super::super::types::{DeviceDescriptor, DevicePosition};
use super::super::v4l2_utils::{
    NodeCapabilities, build_device_info, query_node, usb_port_removable, video_nodes,
};
use std::collections::HashMap;
use tracing::{debug, info};

/// A queried device node before ids are assigned
#[derive(Debug, Clone)]
pub struct ProbedNode {
    pub path: String,
    pub caps: NodeCapabilities,
    /// USB port `removable` attribute, if any
    pub removable: Option<String>,
}

/// Enumerate cameras using V4L2
pub fn enumerate_v4l2_cameras() -> Vec<DeviceDescriptor> {
    let probed: Vec<ProbedNode> = video_nodes()
        .into_iter()
        .filter_map(|path| {
            let Some(caps) = query_node(&path) else {
                debug!(path = %path, "Skipping node that could not be queried");
                return None;
            };
            let removable = usb_port_removable(&path);
            Some(ProbedNode {
                path,
                caps,
                removable,
            })
        })
        .collect();

    let cameras = build_descriptors(probed);
    info!(count = cameras.len(), "V4L2 cameras enumerated");
    cameras
}

/// Turn probed nodes into descriptors
///
/// Metadata nodes are dropped. Nodes sharing bus and card (IR + RGB sensors
/// on one module) get a `#n` suffix in node order.
pub fn build_descriptors(nodes: Vec<ProbedNode>) -> Vec<DeviceDescriptor> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut cameras = Vec::new();

    for node in nodes {
        if !node.caps.is_video_capture {
            debug!(path = %node.path, "Skipping non-capture node");
            continue;
        }

        let base_id = stable_id(&node.caps, &node.path);
        let count = seen.entry(base_id.clone()).or_insert(0);
        *count += 1;
        let id = if *count == 1 {
            base_id
        } else {
            format!("{}#{}", base_id, count)
        };

        let position = match node.removable.as_deref() {
            Some("fixed") => DevicePosition::Front,
            _ => DevicePosition::Unspecified,
        };

        let name = if node.caps.card.is_empty() {
            node.path.clone()
        } else {
            node.caps.card.clone()
        };

        debug!(id = %id, name = %name, path = %node.path, position = %position, "Found video camera");

        cameras.push(DeviceDescriptor {
            id,
            name,
            position,
            device_info: Some(build_device_info(&node.path, &node.caps)),
        });
    }

    cameras
}

/// Id derived from bus and card; falls back to the node path
fn stable_id(caps: &NodeCapabilities, path: &str) -> String {
    if caps.bus_info.is_empty() {
        format!("v4l2:{}", path)
    } else {
        format!("v4l2:{}:{}", caps.bus_info, caps.card)
    }
}
