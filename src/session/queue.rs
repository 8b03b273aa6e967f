// SPDX-License-Identifier: MPL-2.0

//! Serialized session queue
//!
//! Every mutation of the capture session is a [`SessionCommand`] handled,
//! in submission order, by one named worker thread. A reconfiguration
//! requested while another is in flight simply waits its turn.

use super::worker::SessionWorker;
use crate::backends::camera::types::PhotoSettings;
use crate::constants::SESSION_QUEUE_NAME;
use crate::errors::CaptureError;
use crate::pipelines::photo::{CapturedPhoto, EncodingFormat, EncodingQuality};
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Callback receiving the outcome of a still capture
pub type PhotoCompletion = Box<dyn FnOnce(Result<CapturedPhoto, CaptureError>) + Send + 'static>;

/// How a still should be taken and encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhotoRequest {
    pub settings: PhotoSettings,
    pub format: EncodingFormat,
    pub quality: EncodingQuality,
}

impl Default for PhotoRequest {
    fn default() -> Self {
        Self {
            settings: PhotoSettings::default(),
            format: EncodingFormat::Jpeg,
            quality: EncodingQuality::default(),
        }
    }
}

pub(crate) enum SessionCommand {
    /// Rebuild the graph around `requested` (or the policy's choice,
    /// skipping `exclude`) and start it
    Configure {
        requested: Option<String>,
        exclude: Option<String>,
    },
    Start,
    Stop,
    ApplyMirror(bool),
    Capture {
        request: PhotoRequest,
        completion: PhotoCompletion,
    },
    RefreshDevices,
    /// Acknowledged once everything queued before it has run
    Flush(Sender<()>),
    Shutdown,
}

impl std::fmt::Debug for SessionCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionCommand::Configure { requested, exclude } => f
                .debug_struct("Configure")
                .field("requested", requested)
                .field("exclude", exclude)
                .finish(),
            SessionCommand::Start => write!(f, "Start"),
            SessionCommand::Stop => write!(f, "Stop"),
            SessionCommand::ApplyMirror(m) => write!(f, "ApplyMirror({})", m),
            SessionCommand::Capture { request, .. } => {
                f.debug_struct("Capture").field("request", request).finish()
            }
            SessionCommand::RefreshDevices => write!(f, "RefreshDevices"),
            SessionCommand::Flush(_) => write!(f, "Flush"),
            SessionCommand::Shutdown => write!(f, "Shutdown"),
        }
    }
}

/// Handle to the worker thread
pub(crate) struct SessionQueue {
    sender: Sender<SessionCommand>,
    thread_handle: Option<JoinHandle<()>>,
}

impl SessionQueue {
    /// Spawn the worker thread
    pub fn spawn(worker: SessionWorker) -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::channel();

        info!(name = SESSION_QUEUE_NAME, "Starting session queue");
        let thread_handle = thread::Builder::new()
            .name(SESSION_QUEUE_NAME.to_string())
            .spawn(move || worker.run(receiver))?;

        Ok(Self {
            sender,
            thread_handle: Some(thread_handle),
        })
    }

    /// Queue a command; hands it back if the worker is gone
    pub fn send(&self, command: SessionCommand) -> Result<(), SessionCommand> {
        debug!(?command, "Queueing session command");
        self.sender.send(command).map_err(|e| e.0)
    }

    /// Ask the worker to finish queued work and exit, then wait for it
    pub fn shutdown(&mut self) {
        let Some(handle) = self.thread_handle.take() else {
            return;
        };
        let _ = self.sender.send(SessionCommand::Shutdown);

        debug!(name = SESSION_QUEUE_NAME, "Waiting for session queue to finish");
        if handle.thread().id() == thread::current().id() {
            // Dropped from a completion running on the worker itself
            warn!("Session queue shut down from its own thread, not joining");
            return;
        }
        if let Err(e) = handle.join() {
            warn!("Session queue thread panicked: {:?}", e);
        } else {
            info!(name = SESSION_QUEUE_NAME, "Session queue stopped");
        }
    }
}

impl Drop for SessionQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}
