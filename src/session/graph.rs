// SPDX-License-Identifier: MPL-2.0

//! Capture graph
//!
//! One input and up to two outputs, rebuilt inside a begin/commit bracket.
//! The graph lives on the session worker; nothing else can reach it.

use crate::backends::camera::types::{BackendError, DeviceDescriptor};
use crate::backends::camera::CameraInput;
use std::fmt;
use tracing::{debug, warn};

/// Outputs a session can feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// Live frames for preview
    FrameStream,
    /// Still photo capture
    PhotoSink,
}

/// Maximum outputs attached at once
pub const MAX_OUTPUTS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Mutation outside a begin/commit bracket
    NotConfiguring,
    AlreadyConfiguring,
    /// The graph already holds an input
    InputAlreadyAttached,
    /// Starting without an input or outputs
    Incomplete,
    DuplicateOutput(OutputKind),
    TooManyOutputs,
    Backend(BackendError),
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphError::NotConfiguring => write!(f, "Graph is not being configured"),
            GraphError::AlreadyConfiguring => write!(f, "Graph configuration already open"),
            GraphError::InputAlreadyAttached => write!(f, "Graph already has an input"),
            GraphError::Incomplete => write!(f, "Graph has no input or no outputs"),
            GraphError::DuplicateOutput(kind) => write!(f, "Output {:?} already attached", kind),
            GraphError::TooManyOutputs => write!(f, "At most {} outputs allowed", MAX_OUTPUTS),
            GraphError::Backend(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for GraphError {}

impl From<BackendError> for GraphError {
    fn from(err: BackendError) -> Self {
        GraphError::Backend(err)
    }
}

#[derive(Default)]
pub struct CaptureGraph {
    input: Option<Box<dyn CameraInput>>,
    outputs: Vec<OutputKind>,
    configuring: bool,
    running: bool,
    /// Connection-level mirroring, applied to every frame leaving the graph
    mirrored: bool,
}

impl CaptureGraph {
    pub fn new(mirrored: bool) -> Self {
        Self {
            mirrored,
            ..Default::default()
        }
    }

    pub fn begin_configuration(&mut self) -> Result<(), GraphError> {
        if self.configuring {
            return Err(GraphError::AlreadyConfiguring);
        }
        self.configuring = true;
        Ok(())
    }

    pub fn commit_configuration(&mut self) -> Result<(), GraphError> {
        if !self.configuring {
            return Err(GraphError::NotConfiguring);
        }
        self.configuring = false;
        debug!(
            input = self.input.as_ref().map(|i| i.descriptor().id.as_str()),
            outputs = ?self.outputs,
            "Graph configuration committed"
        );
        Ok(())
    }

    pub fn is_configuring(&self) -> bool {
        self.configuring
    }

    pub fn add_input(&mut self, input: Box<dyn CameraInput>) -> Result<(), GraphError> {
        if !self.configuring {
            return Err(GraphError::NotConfiguring);
        }
        if self.input.is_some() {
            return Err(GraphError::InputAlreadyAttached);
        }
        self.input = Some(input);
        Ok(())
    }

    pub fn add_output(&mut self, kind: OutputKind) -> Result<(), GraphError> {
        if !self.configuring {
            return Err(GraphError::NotConfiguring);
        }
        if self.outputs.contains(&kind) {
            return Err(GraphError::DuplicateOutput(kind));
        }
        if self.outputs.len() >= MAX_OUTPUTS {
            return Err(GraphError::TooManyOutputs);
        }
        self.outputs.push(kind);
        Ok(())
    }

    /// Detach the input and every output, releasing the device
    pub fn remove_all(&mut self) -> Result<(), GraphError> {
        if !self.configuring {
            return Err(GraphError::NotConfiguring);
        }
        self.stop_running();
        self.outputs.clear();
        if let Some(input) = self.input.take() {
            debug!(device = %input.descriptor(), "Input detached");
        }
        Ok(())
    }

    pub fn has_input(&self) -> bool {
        self.input.is_some()
    }

    pub fn has_output(&self, kind: OutputKind) -> bool {
        self.outputs.contains(&kind)
    }

    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    pub fn active_device(&self) -> Option<&DeviceDescriptor> {
        self.input.as_ref().map(|i| i.descriptor())
    }

    pub fn input_mut(&mut self) -> Option<&mut (dyn CameraInput + 'static)> {
        self.input.as_deref_mut()
    }

    pub fn set_mirrored(&mut self, mirrored: bool) {
        self.mirrored = mirrored;
    }

    pub fn mirrored(&self) -> bool {
        self.mirrored
    }

    /// Start frames flowing; only outside a configuration bracket
    pub fn start_running(&mut self) -> Result<(), GraphError> {
        if self.configuring {
            return Err(GraphError::AlreadyConfiguring);
        }
        if self.running {
            return Ok(());
        }
        let input = self.input.as_mut().ok_or(GraphError::Incomplete)?;
        if self.outputs.is_empty() {
            return Err(GraphError::Incomplete);
        }
        input.start()?;
        self.running = true;
        Ok(())
    }

    pub fn stop_running(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        if let Some(input) = self.input.as_mut()
            && let Err(e) = input.stop()
        {
            warn!(error = %e, "Failed to stop input");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::CameraBackend;
    use crate::backends::camera::virtual_camera::VirtualBackend;

    fn open_first(backend: &VirtualBackend) -> Box<dyn CameraInput> {
        let device = backend.enumerate_cameras()[0].clone();
        backend.open(&device).unwrap()
    }

    #[test]
    fn test_mutation_requires_bracket() {
        let backend = VirtualBackend::with_default_devices();
        let mut graph = CaptureGraph::new(false);
        assert_eq!(
            graph.add_input(open_first(&backend)),
            Err(GraphError::NotConfiguring)
        );
        assert_eq!(graph.add_output(OutputKind::PhotoSink), Err(GraphError::NotConfiguring));
        assert_eq!(graph.commit_configuration(), Err(GraphError::NotConfiguring));
    }

    #[test]
    fn test_single_input_two_outputs() {
        let backend = VirtualBackend::with_default_devices();
        let mut graph = CaptureGraph::new(false);
        graph.begin_configuration().unwrap();
        graph.add_input(open_first(&backend)).unwrap();
        assert_eq!(
            graph.add_input(open_first(&backend)),
            Err(GraphError::InputAlreadyAttached)
        );
        graph.add_output(OutputKind::FrameStream).unwrap();
        assert_eq!(
            graph.add_output(OutputKind::FrameStream),
            Err(GraphError::DuplicateOutput(OutputKind::FrameStream))
        );
        graph.add_output(OutputKind::PhotoSink).unwrap();
        graph.commit_configuration().unwrap();

        assert_eq!(graph.output_count(), 2);
        assert_eq!(backend.open_inputs(), 1);
    }

    #[test]
    fn test_start_needs_complete_graph() {
        let backend = VirtualBackend::with_default_devices();
        let mut graph = CaptureGraph::new(true);
        assert_eq!(graph.start_running(), Err(GraphError::Incomplete));

        graph.begin_configuration().unwrap();
        graph.add_input(open_first(&backend)).unwrap();
        graph.add_output(OutputKind::FrameStream).unwrap();
        assert_eq!(graph.start_running(), Err(GraphError::AlreadyConfiguring));
        graph.commit_configuration().unwrap();

        graph.start_running().unwrap();
        assert!(graph.is_running());
        assert!(graph.input_mut().unwrap().is_streaming());
    }

    #[test]
    fn test_remove_all_releases_device() {
        let backend = VirtualBackend::with_default_devices();
        let mut graph = CaptureGraph::new(false);
        graph.begin_configuration().unwrap();
        graph.add_input(open_first(&backend)).unwrap();
        graph.add_output(OutputKind::PhotoSink).unwrap();
        graph.commit_configuration().unwrap();
        graph.start_running().unwrap();

        graph.begin_configuration().unwrap();
        graph.remove_all().unwrap();
        graph.commit_configuration().unwrap();

        assert!(!graph.has_input());
        assert!(!graph.is_running());
        assert_eq!(backend.open_inputs(), 0);
    }
}
