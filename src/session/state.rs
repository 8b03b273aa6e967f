// SPDX-License-Identifier: MPL-2.0

//! Observable session state
//!
//! The worker is the only writer. Everyone else reads snapshots or listens
//! to [`SessionEvent`]s, so no caller ever touches the live session.

use crate::backends::camera::types::{CameraFrame, DeviceDescriptor};
use crate::backends::permission::AuthorizationStatus;
use crate::errors::CaptureError;
use crate::pipelines::photo::CapturedPhoto;
use futures::channel::mpsc;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Lifecycle phase of the capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// Nothing configured yet
    #[default]
    Idle,
    /// Inputs and outputs are being rebuilt
    Configuring,
    /// Frames are flowing
    Running,
    /// Stopped by request or after a failure
    Stopped,
}

impl SessionPhase {
    /// Whether the session may move from `self` to `next`
    ///
    /// `Stopped -> Idle` is the teardown step taken before a stopped
    /// session is configured again.
    pub fn can_transition_to(self, next: SessionPhase) -> bool {
        use SessionPhase::*;
        matches!(
            (self, next),
            (Idle, Configuring)
                | (Configuring, Configuring)
                | (Configuring, Running)
                | (Configuring, Stopped)
                | (Running, Configuring)
                | (Running, Stopped)
                | (Stopped, Running)
                | (Stopped, Idle)
        )
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionPhase::Idle => write!(f, "idle"),
            SessionPhase::Configuring => write!(f, "configuring"),
            SessionPhase::Running => write!(f, "running"),
            SessionPhase::Stopped => write!(f, "stopped"),
        }
    }
}

/// Read-only copy of the session state
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    /// Device attached to the session, if any
    pub active_device_id: Option<String>,
    pub mirrored: bool,
    /// Devices seen by the last enumeration the session performed
    pub devices: Vec<DeviceDescriptor>,
    pub authorization: AuthorizationStatus,
}

impl SessionSnapshot {
    pub fn new(mirrored: bool) -> Self {
        Self {
            phase: SessionPhase::Idle,
            active_device_id: None,
            mirrored,
            devices: Vec::new(),
            authorization: AuthorizationStatus::NotDetermined,
        }
    }

    pub fn is_running(&self) -> bool {
        self.phase == SessionPhase::Running
    }

    /// Descriptor of the active device
    pub fn active_device(&self) -> Option<&DeviceDescriptor> {
        let id = self.active_device_id.as_deref()?;
        self.devices.iter().find(|d| d.id == id)
    }
}

/// State change notifications
#[derive(Debug, Clone)]
pub enum SessionEvent {
    StateChanged(SessionPhase),
    DevicesChanged(Vec<DeviceDescriptor>),
    ActiveDeviceChanged(Option<DeviceDescriptor>),
    MirrorChanged(bool),
    PhotoCaptured(CapturedPhoto),
    Failure(CaptureError),
}

/// State shared between the controller and the worker
pub(crate) struct Shared {
    state: Mutex<SessionSnapshot>,
    changed: Condvar,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<SessionEvent>>>,
    frame_subscribers: Mutex<Vec<mpsc::Sender<CameraFrame>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl Shared {
    pub fn new(initial: SessionSnapshot) -> Self {
        Self {
            state: Mutex::new(initial),
            changed: Condvar::new(),
            subscribers: Mutex::new(Vec::new()),
            frame_subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        lock(&self.state).clone()
    }

    /// Mutate the state and wake anyone waiting on it
    pub fn update<R>(&self, f: impl FnOnce(&mut SessionSnapshot) -> R) -> R {
        let result = f(&mut lock(&self.state));
        self.changed.notify_all();
        result
    }

    pub fn phase(&self) -> SessionPhase {
        lock(&self.state).phase
    }

    /// Move to `next`, publishing `StateChanged` when the phase differs
    pub fn set_phase(&self, next: SessionPhase) {
        let previous = self.update(|s| std::mem::replace(&mut s.phase, next));
        if previous == next && next != SessionPhase::Configuring {
            return;
        }
        if !previous.can_transition_to(next) {
            warn!(from = %previous, to = %next, "Unexpected session transition");
        }
        debug!(from = %previous, to = %next, "Session phase changed");
        self.publish(SessionEvent::StateChanged(next));
    }

    /// Block until `pred` holds or `timeout` passes
    pub fn wait_for(&self, timeout: Duration, pred: impl Fn(&SessionSnapshot) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = lock(&self.state);
        while !pred(&state) {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            state = match self.changed.wait_timeout(state, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        true
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded();
        lock(&self.subscribers).push(tx);
        rx
    }

    /// Deliver an event to every live subscriber
    pub fn publish(&self, event: SessionEvent) {
        let mut subscribers = lock(&self.subscribers);
        subscribers.retain(|tx| tx.unbounded_send(event.clone()).is_ok());
    }

    pub fn subscribe_frames(&self, capacity: usize) -> mpsc::Receiver<CameraFrame> {
        let (tx, rx) = mpsc::channel(capacity);
        lock(&self.frame_subscribers).push(tx);
        rx
    }

    pub fn has_frame_subscribers(&self) -> bool {
        let mut subscribers = lock(&self.frame_subscribers);
        subscribers.retain(|tx| !tx.is_closed());
        !subscribers.is_empty()
    }

    /// Hand a frame to every frame subscriber; full channels skip it
    pub fn send_frame(&self, frame: &CameraFrame) {
        let mut subscribers = lock(&self.frame_subscribers);
        subscribers.retain_mut(|tx| match tx.try_send(frame.clone()) {
            Ok(()) => true,
            Err(e) => !e.is_disconnected(),
        });
    }
}
