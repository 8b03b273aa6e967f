// SPDX-License-Identifier: MPL-2.0

//! Capture session controller
//!
//! The public face of the session. Calls return immediately; anything that
//! touches the session itself is queued on the session worker and its
//! outcome arrives as a [`SessionEvent`] or a completion callback.

use super::queue::{PhotoCompletion, PhotoRequest, SessionCommand, SessionQueue};
use super::state::{SessionEvent, SessionPhase, SessionSnapshot, Shared};
use super::worker::SessionWorker;
use crate::backends::camera::types::{CameraFrame, DeviceDescriptor, PhotoSettings};
use crate::backends::camera::CameraBackend;
use crate::backends::permission::{AuthorizationStatus, PermissionGate};
use crate::config::{self, Config, PreferenceStore};
use crate::constants::{FRAME_CHANNEL_CAPACITY, keys, timing};
use crate::errors::{AppError, AppResult, CaptureError};
use crate::pipelines::photo::CapturedPhoto;
use futures::channel::{mpsc, oneshot};
use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Owns the capture session and everything around it
///
/// `Send + Sync`; share it behind an `Arc` if several threads drive it.
pub struct CaptureSessionController {
    backend: Arc<dyn CameraBackend>,
    permission: Arc<dyn PermissionGate>,
    store: Arc<dyn PreferenceStore>,
    shared: Arc<Shared>,
    queue: Mutex<Option<SessionQueue>>,
    config: Config,
}

impl CaptureSessionController {
    /// Create a controller and its worker; nothing is opened until
    /// [`activate`](Self::activate)
    pub fn new(
        backend: Arc<dyn CameraBackend>,
        permission: Arc<dyn PermissionGate>,
        store: Arc<dyn PreferenceStore>,
    ) -> AppResult<Self> {
        let config = Config::load(store.as_ref());
        info!(
            backend = %backend.backend_type(),
            selected = ?config.selected_camera_id,
            mirrored = config.mirrored,
            "Creating capture session controller"
        );

        let mut initial = SessionSnapshot::new(config.mirrored);
        initial.authorization = permission.status();
        let shared = Arc::new(Shared::new(initial));

        let worker = SessionWorker::new(
            Arc::clone(&backend),
            Arc::clone(&store),
            config.selection_policy.clone(),
            Arc::clone(&shared),
        );
        let queue = SessionQueue::spawn(worker)
            .map_err(|e| AppError::Other(format!("Failed to start session queue: {}", e)))?;

        Ok(Self {
            backend,
            permission,
            store,
            shared,
            queue: Mutex::new(Some(queue)),
            config,
        })
    }

    fn queue(&self) -> MutexGuard<'_, Option<SessionQueue>> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a command; hands it back when the worker has shut down
    fn send(&self, command: SessionCommand) -> Result<(), SessionCommand> {
        match self.queue().as_ref() {
            Some(queue) => queue.send(command),
            None => Err(command),
        }
    }

    fn publish_failure(&self, failure: CaptureError) {
        warn!(error = %failure, "Session request failed");
        self.shared.publish(SessionEvent::Failure(failure));
    }

    /// Check camera authorization, prompting when undecided
    fn ensure_authorized(&self) -> Result<(), CaptureError> {
        let granted = match self.permission.status() {
            AuthorizationStatus::Authorized => true,
            AuthorizationStatus::NotDetermined => self.permission.request_access(),
            AuthorizationStatus::Denied => false,
        };
        let status = self.permission.status();
        self.shared.update(|s| s.authorization = status);

        if granted {
            Ok(())
        } else {
            self.publish_failure(CaptureError::PermissionDenied);
            Err(CaptureError::PermissionDenied)
        }
    }

    /// Confirm authorization, then enumerate, configure and start
    pub fn activate(&self) -> Result<(), CaptureError> {
        self.ensure_authorized()?;
        info!("Activating capture session");
        self.send(SessionCommand::Configure {
            requested: None,
            exclude: None,
        })
        .map_err(|_| CaptureError::CaptureFailed("session has shut down".into()))
    }

    /// Attached video capture devices, queried now
    ///
    /// Leaves the session untouched.
    pub fn enumerate_devices(&self) -> Vec<DeviceDescriptor> {
        self.backend.enumerate_cameras()
    }

    /// Make `id` the active camera and restart the session around it
    ///
    /// Unknown ids are rejected and the current camera stays active.
    pub fn select_device(&self, id: &str) -> Result<(), CaptureError> {
        let devices = self.enumerate_devices();
        let Some(device) = devices.iter().find(|d| d.id == id) else {
            warn!(id, "Rejecting selection of unknown camera");
            let failure = CaptureError::DeviceUnavailable(id.to_string());
            self.publish_failure(failure.clone());
            return Err(failure);
        };

        info!(device = %device, "Camera selected");
        if let Err(e) = self.store.set(keys::SELECTED_CAMERA_ID, Value::String(id.to_string())) {
            warn!(error = %e, "Failed to persist camera selection");
        }

        if self.shared.snapshot().authorization != AuthorizationStatus::Authorized {
            debug!("Not authorized yet, selection applies on activation");
            return Ok(());
        }

        self.send(SessionCommand::Configure {
            requested: Some(id.to_string()),
            exclude: None,
        })
        .map_err(|_| CaptureError::CaptureFailed("session has shut down".into()))
    }

    /// Persisted camera choice, whether or not it is attached
    pub fn selected_device_id(&self) -> Option<String> {
        config::read(self.store.as_ref(), keys::SELECTED_CAMERA_ID)
    }

    /// Mirror preview and photos; applied without restarting the session
    pub fn set_mirrored(&self, mirrored: bool) {
        if let Err(e) = self.store.set(keys::MIRRORED, Value::Bool(mirrored)) {
            warn!(error = %e, "Failed to persist mirror setting");
        }

        let changed = self.shared.update(|s| {
            let changed = s.mirrored != mirrored;
            s.mirrored = mirrored;
            changed
        });
        if changed {
            info!(mirrored, "Mirroring changed");
            self.shared.publish(SessionEvent::MirrorChanged(mirrored));
        }

        let _ = self.send(SessionCommand::ApplyMirror(mirrored));
    }

    /// Flip the mirror setting; returns the new value
    pub fn toggle_mirrored(&self) -> bool {
        let mirrored = !self.is_mirrored();
        self.set_mirrored(mirrored);
        mirrored
    }

    pub fn is_mirrored(&self) -> bool {
        self.shared.snapshot().mirrored
    }

    /// Start the session; no-op when already running
    pub fn start(&self) -> Result<(), CaptureError> {
        self.ensure_authorized()?;
        self.send(SessionCommand::Start)
            .map_err(|_| CaptureError::CaptureFailed("session has shut down".into()))
    }

    /// Stop the session; no-op when not running
    pub fn stop(&self) {
        let _ = self.send(SessionCommand::Stop);
    }

    /// Preferences loaded when the controller was created
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Photo request built from the stored preferences, flash off
    pub fn default_photo_request(&self) -> PhotoRequest {
        PhotoRequest {
            settings: PhotoSettings::default(),
            format: self.config.photo_format.into(),
            quality: self.config.jpeg_quality,
        }
    }

    /// Capture a still with the stored preferences
    pub fn capture_photo(&self, completion: impl FnOnce(Result<CapturedPhoto, CaptureError>) + Send + 'static) {
        self.capture_with(self.default_photo_request(), completion);
    }

    /// Capture a still; `completion` runs on the session worker
    ///
    /// A session that is stopped or mid-reconfiguration fails the request
    /// right away.
    pub fn capture_with(
        &self,
        request: PhotoRequest,
        completion: impl FnOnce(Result<CapturedPhoto, CaptureError>) + Send + 'static,
    ) {
        let rejection = match self.shared.phase() {
            SessionPhase::Stopped => Some(CaptureError::CaptureFailed("session is stopped".into())),
            SessionPhase::Configuring => Some(CaptureError::DeviceUnavailable(
                "session is being reconfigured".into(),
            )),
            SessionPhase::Idle | SessionPhase::Running => None,
        };
        if let Some(failure) = rejection {
            self.publish_failure(failure.clone());
            completion(Err(failure));
            return;
        }

        let completion: PhotoCompletion = Box::new(completion);
        if let Err(SessionCommand::Capture { completion, .. }) =
            self.send(SessionCommand::Capture { request, completion })
        {
            let failure = CaptureError::CaptureFailed("session has shut down".into());
            self.publish_failure(failure.clone());
            completion(Err(failure));
        }
    }

    /// Capture a still with the stored preferences, as a future
    pub fn capture_photo_async(
        &self,
    ) -> impl Future<Output = Result<CapturedPhoto, CaptureError>> + Send + 'static {
        self.capture_with_async(self.default_photo_request())
    }

    pub fn capture_with_async(
        &self,
        request: PhotoRequest,
    ) -> impl Future<Output = Result<CapturedPhoto, CaptureError>> + Send + 'static {
        let (tx, rx) = oneshot::channel();
        self.capture_with(request, move |result| {
            let _ = tx.send(result);
        });
        async move {
            rx.await
                .unwrap_or_else(|_| Err(CaptureError::CaptureFailed("capture was dropped".into())))
        }
    }

    /// Re-enumerate devices on the worker, e.g. after a hot-plug
    pub fn refresh_devices(&self) {
        let _ = self.send(SessionCommand::RefreshDevices);
    }

    /// Read-only copy of the session state
    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.snapshot()
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<SessionEvent> {
        self.shared.subscribe()
    }

    /// Live preview frames, mirrored when mirroring is on
    ///
    /// Frames only flow while the session runs; a slow reader misses frames
    /// rather than stalling the session.
    pub fn subscribe_frames(&self) -> mpsc::Receiver<CameraFrame> {
        self.shared.subscribe_frames(FRAME_CHANNEL_CAPACITY)
    }

    /// Block until everything queued so far has been handled
    pub fn flush(&self, timeout: Duration) -> bool {
        let (tx, rx) = std::sync::mpsc::channel();
        if self.send(SessionCommand::Flush(tx)).is_err() {
            return false;
        }
        rx.recv_timeout(timeout).is_ok()
    }

    /// Block until the session reaches `phase`
    pub fn wait_for_phase(&self, phase: SessionPhase, timeout: Duration) -> bool {
        self.shared.wait_for(timeout, |s| s.phase == phase)
    }

    /// Drain the queue, stop the session and join the worker
    pub fn shutdown(&self) {
        let queue = self.queue().take();
        if let Some(mut queue) = queue {
            info!("Shutting down capture session");
            let _ = queue.send(SessionCommand::Stop);
            queue.shutdown();
        }
    }
}

impl Drop for CaptureSessionController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Default timeout for [`CaptureSessionController::flush`] and
/// [`CaptureSessionController::wait_for_phase`]
pub const DEFAULT_WAIT: Duration = timing::DEFAULT_WAIT;
