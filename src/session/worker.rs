// SPDX-License-Identifier: MPL-2.0

//! Session worker
//!
//! Runs on the session queue thread and owns the [`CaptureGraph`]. Between
//! commands it pumps preview frames (only while running and watched) and
//! polls the device list for hot-plug changes.

use super::graph::{CaptureGraph, OutputKind};
use super::queue::{PhotoCompletion, PhotoRequest, SessionCommand};
use super::selection::{SelectionPolicy, choose_device};
use super::state::{SessionEvent, SessionPhase, Shared};
use crate::backends::camera::types::{BackendError, DeviceDescriptor};
use crate::backends::camera::CameraBackend;
use crate::config::{self, PreferenceStore};
use crate::constants::{keys, timing};
use crate::errors::CaptureError;
use crate::pipelines::photo::{CapturedPhoto, PhotoEncoder, PhotoPipeline};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::thread;
use std::time::Instant;
use tracing::{debug, error, info, warn};

pub(crate) struct SessionWorker {
    backend: Arc<dyn CameraBackend>,
    store: Arc<dyn PreferenceStore>,
    policy: SelectionPolicy,
    shared: Arc<Shared>,
    graph: CaptureGraph,
    /// Last requested lifecycle direction
    want_running: bool,
    last_poll: Instant,
    frames_pumped: u64,
    /// Set when the active device vanished mid-operation
    lost_device: Option<String>,
}

impl SessionWorker {
    pub fn new(
        backend: Arc<dyn CameraBackend>,
        store: Arc<dyn PreferenceStore>,
        policy: SelectionPolicy,
        shared: Arc<Shared>,
    ) -> Self {
        let mirrored = shared.snapshot().mirrored;
        Self {
            backend,
            store,
            policy,
            shared,
            graph: CaptureGraph::new(mirrored),
            want_running: false,
            last_poll: Instant::now(),
            frames_pumped: 0,
            lost_device: None,
        }
    }

    /// Worker loop; returns on `Shutdown` or when every sender is gone
    pub fn run(mut self, commands: Receiver<SessionCommand>) {
        debug!("Session worker started");

        loop {
            let next = if self.should_pump() {
                match commands.try_recv() {
                    Ok(command) => Some(command),
                    Err(TryRecvError::Empty) => None,
                    Err(TryRecvError::Disconnected) => break,
                }
            } else {
                match commands.recv_timeout(timing::IDLE_TICK) {
                    Ok(command) => Some(command),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            };

            match next {
                Some(SessionCommand::Shutdown) => break,
                Some(command) => self.handle(command),
                None => {}
            }

            self.recover_lost_device();
            self.poll_devices_if_due();

            if self.should_pump() {
                self.pump_frame();
            }
        }

        self.teardown();
        debug!("Session worker exiting");
    }

    fn handle(&mut self, command: SessionCommand) {
        debug!(?command, "Handling session command");
        match command {
            SessionCommand::Configure { requested, exclude } => {
                self.want_running = true;
                self.configure(requested, exclude);
            }
            SessionCommand::Start => {
                self.want_running = true;
                self.start();
            }
            SessionCommand::Stop => {
                self.want_running = false;
                self.stop();
            }
            SessionCommand::ApplyMirror(mirrored) => {
                self.graph.set_mirrored(mirrored);
                debug!(mirrored, "Mirroring applied to session output");
            }
            SessionCommand::Capture {
                request,
                completion,
            } => self.capture(request, completion),
            SessionCommand::RefreshDevices => self.refresh_devices(),
            SessionCommand::Flush(ack) => {
                let _ = ack.send(());
            }
            SessionCommand::Shutdown => {}
        }
    }

    /// Rebuild the graph around a device and start it
    fn configure(&mut self, requested: Option<String>, exclude: Option<String>) {
        if self.shared.phase() == SessionPhase::Stopped {
            self.shared.set_phase(SessionPhase::Idle);
        }
        self.shared.set_phase(SessionPhase::Configuring);

        self.graph.stop_running();
        if let Err(e) = self.graph.begin_configuration() {
            error!(error = %e, "Could not open graph configuration");
            return;
        }
        // Release the old device before the new one is opened
        if let Err(e) = self.graph.remove_all() {
            warn!(error = %e, "Failed to clear session graph");
        }

        let devices = self.update_devices();
        let candidates: Vec<DeviceDescriptor> = devices
            .iter()
            .filter(|d| Some(d.id.as_str()) != exclude.as_deref())
            .cloned()
            .collect();

        let target = match requested {
            Some(id) => match candidates.iter().find(|d| d.id == id) {
                Some(device) => Ok(device.clone()),
                None => {
                    warn!(id = %id, "Requested camera vanished, falling back");
                    self.fail(CaptureError::DeviceUnavailable(id));
                    self.fallback(&candidates)
                }
            },
            None => self.fallback(&candidates),
        };

        let device = match target {
            Ok(device) => device,
            Err(e) => {
                self.finish_empty(e);
                return;
            }
        };

        info!(device = %device, "Configuring session");
        let input = match self.backend.open(&device) {
            Ok(input) => input,
            Err(e) => {
                error!(device = %device, error = %e, "Failed to open camera");
                let failure = match e {
                    BackendError::PermissionDenied(_) => CaptureError::PermissionDenied,
                    _ => CaptureError::DeviceUnavailable(device.name.clone()),
                };
                self.finish_empty(failure);
                return;
            }
        };

        let mirrored = self.shared.snapshot().mirrored;
        let attached = self
            .graph
            .add_input(input)
            .and_then(|_| self.graph.add_output(OutputKind::FrameStream))
            .and_then(|_| self.graph.add_output(OutputKind::PhotoSink));
        self.graph.set_mirrored(mirrored);

        if let Err(e) = attached {
            error!(error = %e, "Failed to assemble session graph");
            let _ = self.graph.remove_all();
            self.finish_empty(CaptureError::DeviceUnavailable(device.name.clone()));
            return;
        }
        if let Err(e) = self.graph.commit_configuration() {
            error!(error = %e, "Failed to commit session graph");
        }

        self.set_active(Some(device.clone()));
        self.start_graph();
    }

    /// Persisted choice or policy fallback; never writes the preference
    fn fallback(&self, candidates: &[DeviceDescriptor]) -> Result<DeviceDescriptor, CaptureError> {
        let persisted: Option<String> = config::read(self.store.as_ref(), keys::SELECTED_CAMERA_ID);
        choose_device(candidates, persisted.as_deref(), &self.policy).cloned()
    }

    /// Close a configuration pass that ended without a device
    fn finish_empty(&mut self, failure: CaptureError) {
        if self.graph.is_configuring()
            && let Err(e) = self.graph.commit_configuration()
        {
            warn!(error = %e, "Failed to commit empty graph");
        }
        self.set_active(None);
        self.shared.set_phase(SessionPhase::Stopped);
        self.fail(failure);
    }

    fn start(&mut self) {
        match self.shared.phase() {
            SessionPhase::Running => debug!("Session already running"),
            SessionPhase::Stopped if self.graph.has_input() => self.start_graph(),
            _ => self.configure(None, None),
        }
    }

    fn start_graph(&mut self) {
        match self.graph.start_running() {
            Ok(()) => {
                self.last_poll = Instant::now();
                self.shared.set_phase(SessionPhase::Running);
            }
            Err(e) => {
                error!(error = %e, "Failed to start session");
                self.shared.set_phase(SessionPhase::Stopped);
                let device = self
                    .graph
                    .active_device()
                    .map(|d| d.name.clone())
                    .unwrap_or_default();
                self.fail(CaptureError::DeviceUnavailable(device));
            }
        }
    }

    fn stop(&mut self) {
        match self.shared.phase() {
            SessionPhase::Running | SessionPhase::Configuring => {
                self.graph.stop_running();
                self.shared.set_phase(SessionPhase::Stopped);
                info!("Session stopped");
            }
            phase => debug!(%phase, "Stop ignored"),
        }
    }

    fn capture(&mut self, request: PhotoRequest, completion: PhotoCompletion) {
        let result = self.take_photo(request);
        match &result {
            Ok(photo) => {
                info!(photo = ?photo, "Photo captured");
                self.shared.publish(SessionEvent::PhotoCaptured(photo.clone()));
            }
            Err(e) => {
                warn!(error = %e, "Photo capture failed");
                self.shared.publish(SessionEvent::Failure(e.clone()));
            }
        }
        completion(result);
    }

    fn take_photo(&mut self, request: PhotoRequest) -> Result<CapturedPhoto, CaptureError> {
        match self.shared.phase() {
            SessionPhase::Running => {}
            SessionPhase::Configuring => {
                return Err(CaptureError::DeviceUnavailable(
                    "session is being reconfigured".into(),
                ));
            }
            phase => {
                return Err(CaptureError::CaptureFailed(format!("session is {}", phase)));
            }
        }

        if !self.graph.has_output(OutputKind::PhotoSink) {
            return Err(CaptureError::DeviceUnavailable("no photo output attached".into()));
        }
        let mirrored = self.graph.mirrored();
        let Some(input) = self.graph.input_mut() else {
            return Err(CaptureError::DeviceUnavailable("no camera attached".into()));
        };
        let device = input.descriptor().clone();

        let frame = match input.capture_still(&request.settings) {
            Ok(frame) => frame,
            Err(BackendError::Disconnected(id)) => {
                self.lost_device = Some(id);
                return Err(CaptureError::DeviceUnavailable(device.name));
            }
            Err(e) => return Err(CaptureError::CaptureFailed(e.to_string())),
        };

        let pipeline = PhotoPipeline::new(PhotoEncoder::with(request.format, request.quality));
        pipeline.develop(&frame, mirrored, &device.id)
    }

    fn should_pump(&self) -> bool {
        self.graph.is_running() && self.shared.has_frame_subscribers()
    }

    fn pump_frame(&mut self) {
        let mirrored = self.graph.mirrored();
        let Some(input) = self.graph.input_mut() else {
            return;
        };

        match input.next_frame() {
            Ok(frame) => {
                let frame = if mirrored { frame.flip_horizontal() } else { frame };
                self.frames_pumped += 1;
                if self.frames_pumped % timing::FRAME_LOG_INTERVAL == 0 {
                    debug!(frames = self.frames_pumped, "Preview frames delivered");
                }
                self.shared.send_frame(&frame);
            }
            Err(BackendError::Timeout) => debug!("Frame timeout"),
            Err(BackendError::Disconnected(id)) => {
                warn!(id = %id, "Camera disconnected while streaming");
                self.lost_device = Some(id);
            }
            Err(e) => {
                warn!(error = %e, "Failed to read frame");
                thread::sleep(timing::IDLE_TICK);
            }
        }
    }

    /// Enumerate and publish the device list if it changed
    fn update_devices(&mut self) -> Vec<DeviceDescriptor> {
        let devices = self.backend.enumerate_cameras();
        let changed = self.shared.update(|s| {
            let same = s.devices.len() == devices.len()
                && s.devices.iter().zip(&devices).all(|(a, b)| a.id == b.id && a.name == b.name);
            if !same {
                s.devices = devices.clone();
            }
            !same
        });
        if changed {
            info!(count = devices.len(), "Camera list changed");
            self.shared.publish(SessionEvent::DevicesChanged(devices.clone()));
        }
        devices
    }

    fn poll_devices_if_due(&mut self) {
        if self.shared.phase() == SessionPhase::Idle
            || self.last_poll.elapsed() < timing::DEVICE_POLL_INTERVAL
        {
            return;
        }
        self.refresh_devices();
    }

    /// Re-enumerate; losing the active device triggers a fallback
    fn refresh_devices(&mut self) {
        self.last_poll = Instant::now();
        let devices = self.update_devices();

        if let Some(active) = self.graph.active_device()
            && !devices.iter().any(|d| d.id == active.id)
        {
            self.lost_device = Some(active.id.clone());
            self.recover_lost_device();
        }
    }

    fn recover_lost_device(&mut self) {
        let Some(id) = self.lost_device.take() else {
            return;
        };
        let name = self
            .graph
            .active_device()
            .filter(|d| d.id == id)
            .map(|d| d.name.clone())
            .unwrap_or_else(|| id.clone());

        warn!(id = %id, "Active camera lost");
        self.fail(CaptureError::DeviceUnavailable(name));

        if self.want_running {
            self.configure(None, Some(id));
        } else {
            // Not running: release the dead input and wait for a start
            self.graph.stop_running();
            if self.graph.begin_configuration().is_ok() {
                let _ = self.graph.remove_all();
                let _ = self.graph.commit_configuration();
            }
            self.set_active(None);
        }
    }

    fn set_active(&mut self, device: Option<DeviceDescriptor>) {
        let id = device.as_ref().map(|d| d.id.clone());
        let changed = self.shared.update(|s| {
            let changed = s.active_device_id != id;
            s.active_device_id = id;
            changed
        });
        if changed {
            self.shared.publish(SessionEvent::ActiveDeviceChanged(device));
        }
    }

    fn fail(&self, failure: CaptureError) {
        warn!(error = %failure, "Session failure");
        self.shared.publish(SessionEvent::Failure(failure));
    }

    fn teardown(&mut self) {
        self.graph.stop_running();
        if self.graph.begin_configuration().is_ok() {
            let _ = self.graph.remove_all();
            let _ = self.graph.commit_configuration();
        }
        if matches!(
            self.shared.phase(),
            SessionPhase::Running | SessionPhase::Configuring
        ) {
            self.shared.set_phase(SessionPhase::Stopped);
        }
        info!("Session torn down");
    }
}
