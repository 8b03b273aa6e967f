// SPDX-License-Identifier: MPL-2.0

//! Camera access authorization
//!
//! On Linux there is no consent prompt: access is granted by the
//! permissions on the device nodes (usually membership of the `video`
//! group). The gate reports that as an [`AuthorizationStatus`] so the
//! session can refuse to configure anything before access is confirmed.

use crate::backends::camera::CameraBackendType;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use tracing::{info, warn};

/// Whether the process may use cameras
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthorizationStatus {
    /// The user has not been asked yet
    #[default]
    NotDetermined,
    Authorized,
    Denied,
}

impl std::fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthorizationStatus::NotDetermined => write!(f, "not determined"),
            AuthorizationStatus::Authorized => write!(f, "authorized"),
            AuthorizationStatus::Denied => write!(f, "denied"),
        }
    }
}

/// Answers whether camera access is authorized and can ask for it
pub trait PermissionGate: Send + Sync {
    /// Current status, without prompting
    fn status(&self) -> AuthorizationStatus;

    /// Ask for access; returns whether access is now granted
    ///
    /// May block while the user answers a prompt.
    fn request_access(&self) -> bool;
}

/// Gate backed by access checks on `/dev/video*`
#[cfg(target_os = "linux")]
#[derive(Debug, Default)]
pub struct DeviceNodePermission;

#[cfg(target_os = "linux")]
impl PermissionGate for DeviceNodePermission {
    fn status(&self) -> AuthorizationStatus {
        use crate::backends::camera::v4l2_utils::{is_accessible, video_nodes};

        let nodes = video_nodes();
        if nodes.is_empty() {
            // Nothing to deny yet; enumeration will report no devices
            return AuthorizationStatus::Authorized;
        }

        if nodes.iter().any(|node| is_accessible(node)) {
            AuthorizationStatus::Authorized
        } else {
            AuthorizationStatus::Denied
        }
    }

    fn request_access(&self) -> bool {
        let granted = self.status() == AuthorizationStatus::Authorized;
        if !granted {
            warn!(
                "Camera device nodes are not accessible; add your user to the 'video' group and log in again"
            );
        }
        granted
    }
}

/// Gate with a fixed answer
///
/// Used with the virtual backend and in tests. `request_access` flips
/// `NotDetermined` to the configured answer, like a user answering a prompt.
#[derive(Debug)]
pub struct StaticPermission {
    status: AtomicU8,
    grant_on_request: bool,
}

impl StaticPermission {
    pub fn new(status: AuthorizationStatus, grant_on_request: bool) -> Self {
        Self {
            status: AtomicU8::new(encode(status)),
            grant_on_request,
        }
    }

    pub fn authorized() -> Self {
        Self::new(AuthorizationStatus::Authorized, true)
    }

    pub fn denied() -> Self {
        Self::new(AuthorizationStatus::Denied, false)
    }

    /// Change the status, e.g. after the user revoked access in settings
    pub fn set_status(&self, status: AuthorizationStatus) {
        self.status.store(encode(status), Ordering::SeqCst);
    }
}

impl PermissionGate for StaticPermission {
    fn status(&self) -> AuthorizationStatus {
        decode(self.status.load(Ordering::SeqCst))
    }

    fn request_access(&self) -> bool {
        match self.status() {
            AuthorizationStatus::Authorized => true,
            AuthorizationStatus::Denied => false,
            AuthorizationStatus::NotDetermined => {
                let answer = if self.grant_on_request {
                    AuthorizationStatus::Authorized
                } else {
                    AuthorizationStatus::Denied
                };
                info!(answer = %answer, "Camera access requested");
                self.set_status(answer);
                self.grant_on_request
            }
        }
    }
}

fn encode(status: AuthorizationStatus) -> u8 {
    match status {
        AuthorizationStatus::NotDetermined => 0,
        AuthorizationStatus::Authorized => 1,
        AuthorizationStatus::Denied => 2,
    }
}

fn decode(value: u8) -> AuthorizationStatus {
    match value {
        1 => AuthorizationStatus::Authorized,
        2 => AuthorizationStatus::Denied,
        _ => AuthorizationStatus::NotDetermined,
    }
}

/// Gate matching a backend type
pub fn get_permission_gate(backend_type: CameraBackendType) -> Arc<dyn PermissionGate> {
    match backend_type {
        #[cfg(target_os = "linux")]
        CameraBackendType::V4l2 => Arc::new(DeviceNodePermission),
        _ => Arc::new(StaticPermission::authorized()),
    }
}
