// SPDX-License-Identifier: GPL-3.0-only

//! Virtual camera backend
//!
//! Synthetic cameras producing a deterministic test pattern. Used when no
//! real hardware is wanted (`--backend virtual`) and by the test suite,
//! which plugs, unplugs and breaks devices at will.
//!
//! The pattern is asymmetric left to right, so a mirrored frame can be told
//! apart from an unmirrored one by comparing against [`test_pattern`].

use super::types::*;
use super::{CameraBackend, CameraInput};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default frame size of virtual devices
pub const DEFAULT_WIDTH: u32 = 64;
pub const DEFAULT_HEIGHT: u32 = 48;

/// Render the test pattern for a `width` x `height` frame
///
/// Red ramps with x, green ramps with y, blue is constant.
pub fn test_pattern(width: u32, height: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            data.push(((x * 255) / width.max(2).saturating_sub(1)).min(255) as u8);
            data.push(((y * 255) / height.max(2).saturating_sub(1)).min(255) as u8);
            data.push(96);
            data.push(255);
        }
    }
    data
}

#[derive(Debug)]
struct VirtualState {
    devices: Vec<DeviceDescriptor>,
    failing_open: HashSet<String>,
    failing_capture: HashSet<String>,
    width: u32,
    height: u32,
    frame_interval: Duration,
    open_delay: Duration,
    open_inputs: usize,
    max_open_inputs: usize,
    open_log: Vec<String>,
    last_photo_settings: Option<PhotoSettings>,
}

/// Backend serving synthetic devices
///
/// Cloning shares the device table, so a test can keep a handle while the
/// session owns another.
#[derive(Debug, Clone)]
pub struct VirtualBackend {
    state: Arc<Mutex<VirtualState>>,
}

impl VirtualBackend {
    /// Backend with the given devices attached
    pub fn new(devices: Vec<DeviceDescriptor>) -> Self {
        Self {
            state: Arc::new(Mutex::new(VirtualState {
                devices,
                failing_open: HashSet::new(),
                failing_capture: HashSet::new(),
                width: DEFAULT_WIDTH,
                height: DEFAULT_HEIGHT,
                frame_interval: Duration::from_millis(33),
                open_delay: Duration::ZERO,
                open_inputs: 0,
                max_open_inputs: 0,
                open_log: Vec::new(),
                last_photo_settings: None,
            })),
        }
    }

    /// A built-in front camera and an external one
    pub fn with_default_devices() -> Self {
        Self::new(vec![
            DeviceDescriptor::new("virtual:front", "Virtual Front Camera", DevicePosition::Front),
            DeviceDescriptor::new("virtual:external", "Virtual External Camera", DevicePosition::Unspecified),
        ])
    }

    fn lock(&self) -> MutexGuard<'_, VirtualState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Attach a device; replaces one with the same id
    pub fn plug(&self, device: DeviceDescriptor) {
        let mut state = self.lock();
        info!(device = %device, "Virtual device plugged");
        state.devices.retain(|d| d.id != device.id);
        state.devices.push(device);
    }

    /// Detach a device; open inputs on it start failing with `Disconnected`
    pub fn unplug(&self, id: &str) {
        let mut state = self.lock();
        info!(id, "Virtual device unplugged");
        state.devices.retain(|d| d.id != id);
    }

    /// Make `open` fail for a device
    pub fn fail_open(&self, id: &str, failing: bool) {
        let mut state = self.lock();
        if failing {
            state.failing_open.insert(id.to_string());
        } else {
            state.failing_open.remove(id);
        }
    }

    /// Make still capture fail for a device
    pub fn fail_capture(&self, id: &str, failing: bool) {
        let mut state = self.lock();
        if failing {
            state.failing_capture.insert(id.to_string());
        } else {
            state.failing_capture.remove(id);
        }
    }

    /// Frame size for inputs opened from now on
    pub fn set_frame_size(&self, width: u32, height: u32) {
        let mut state = self.lock();
        state.width = width.max(1);
        state.height = height.max(1);
    }

    /// Delay applied inside `open`, simulating slow hardware
    pub fn set_open_delay(&self, delay: Duration) {
        self.lock().open_delay = delay;
    }

    /// Number of inputs currently open
    pub fn open_inputs(&self) -> usize {
        self.lock().open_inputs
    }

    /// Highest number of inputs ever open at once
    pub fn max_open_inputs(&self) -> usize {
        self.lock().max_open_inputs
    }

    /// Ids of every device opened, in order
    pub fn open_log(&self) -> Vec<String> {
        self.lock().open_log.clone()
    }

    /// Settings passed to the most recent still capture
    pub fn last_photo_settings(&self) -> Option<PhotoSettings> {
        self.lock().last_photo_settings
    }

    fn is_attached(&self, id: &str) -> bool {
        self.lock().devices.iter().any(|d| d.id == id)
    }
}

impl CameraBackend for VirtualBackend {
    fn enumerate_cameras(&self) -> Vec<DeviceDescriptor> {
        self.lock().devices.clone()
    }

    fn open(&self, device: &DeviceDescriptor) -> BackendResult<Box<dyn CameraInput>> {
        let delay = self.lock().open_delay;
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        let mut state = self.lock();
        state.open_log.push(device.id.clone());

        let Some(current) = state.devices.iter().find(|d| d.id == device.id).cloned() else {
            warn!(id = %device.id, "Virtual device not attached");
            return Err(BackendError::DeviceNotFound(device.id.clone()));
        };
        if state.failing_open.contains(&device.id) {
            warn!(id = %device.id, "Virtual device refused to open");
            return Err(BackendError::InitializationFailed(format!(
                "{} could not be opened",
                device.id
            )));
        }

        state.open_inputs += 1;
        state.max_open_inputs = state.max_open_inputs.max(state.open_inputs);
        debug!(device = %current, open_inputs = state.open_inputs, "Virtual input opened");

        Ok(Box::new(VirtualInput {
            descriptor: current,
            backend: self.clone(),
            format: CameraFormat {
                width: state.width,
                height: state.height,
                pixel_format: PixelFormat::RGBA,
            },
            frame_interval: state.frame_interval,
            streaming: false,
            sequence: 0,
            last_frame_at: None,
        }))
    }

    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::Virtual
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// Input opened from a [`VirtualBackend`]
pub struct VirtualInput {
    descriptor: DeviceDescriptor,
    backend: VirtualBackend,
    format: CameraFormat,
    frame_interval: Duration,
    streaming: bool,
    sequence: u64,
    last_frame_at: Option<Instant>,
}

impl VirtualInput {
    fn check_attached(&self) -> BackendResult<()> {
        if self.backend.is_attached(&self.descriptor.id) {
            Ok(())
        } else {
            Err(BackendError::Disconnected(self.descriptor.id.clone()))
        }
    }

    fn render(&mut self) -> CameraFrame {
        self.sequence += 1;
        CameraFrame::from_rgba(
            self.format.width,
            self.format.height,
            test_pattern(self.format.width, self.format.height),
            self.sequence,
        )
    }
}

impl CameraInput for VirtualInput {
    fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    fn format(&self) -> CameraFormat {
        self.format
    }

    fn start(&mut self) -> BackendResult<()> {
        self.check_attached()?;
        self.streaming = true;
        Ok(())
    }

    fn stop(&mut self) -> BackendResult<()> {
        self.streaming = false;
        Ok(())
    }

    fn is_streaming(&self) -> bool {
        self.streaming
    }

    fn next_frame(&mut self) -> BackendResult<CameraFrame> {
        if !self.streaming {
            return Err(BackendError::NotStreaming);
        }
        self.check_attached()?;

        // Pace like a real sensor
        if let Some(last) = self.last_frame_at {
            let elapsed = last.elapsed();
            if elapsed < self.frame_interval {
                thread::sleep(self.frame_interval - elapsed);
            }
        }
        self.last_frame_at = Some(Instant::now());

        Ok(self.render())
    }

    fn capture_still(&mut self, settings: &PhotoSettings) -> BackendResult<CameraFrame> {
        if !self.streaming {
            return Err(BackendError::NotStreaming);
        }
        self.check_attached()?;

        {
            let mut state = self.backend.lock();
            state.last_photo_settings = Some(*settings);
            if state.failing_capture.contains(&self.descriptor.id) {
                return Err(BackendError::Other(format!(
                    "{} failed to deliver a still",
                    self.descriptor.id
                )));
            }
        }

        Ok(self.render())
    }
}

impl Drop for VirtualInput {
    fn drop(&mut self) {
        let mut state = self.backend.lock();
        state.open_inputs = state.open_inputs.saturating_sub(1);
        debug!(id = %self.descriptor.id, open_inputs = state.open_inputs, "Virtual input released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_is_asymmetric() {
        let frame = CameraFrame::from_rgba(4, 2, test_pattern(4, 2), 0);
        let flipped = frame.flip_horizontal();
        assert_ne!(frame.data, flipped.data);
        assert_eq!(frame.data[0], 0);
        assert_eq!(frame.data[12], 255);
    }

    #[test]
    fn test_open_counts_inputs() {
        let backend = VirtualBackend::with_default_devices();
        let device = backend.enumerate_cameras()[0].clone();

        let first = backend.open(&device).unwrap();
        assert_eq!(backend.open_inputs(), 1);
        drop(first);
        assert_eq!(backend.open_inputs(), 0);
        assert_eq!(backend.max_open_inputs(), 1);
        assert_eq!(backend.open_log(), vec![device.id.clone()]);
    }

    #[test]
    fn test_unplug_disconnects_open_input() {
        let backend = VirtualBackend::with_default_devices();
        let device = backend.enumerate_cameras()[0].clone();
        let mut input = backend.open(&device).unwrap();
        input.start().unwrap();
        assert!(input.next_frame().is_ok());

        backend.unplug(&device.id);
        assert_eq!(
            input.next_frame().unwrap_err(),
            BackendError::Disconnected(device.id.clone())
        );
        assert!(matches!(
            backend.open(&device),
            Err(BackendError::DeviceNotFound(_))
        ));
    }

    #[test]
    fn test_failures_are_injectable() {
        let backend = VirtualBackend::with_default_devices();
        let device = backend.enumerate_cameras()[1].clone();

        backend.fail_open(&device.id, true);
        assert!(backend.open(&device).is_err());
        backend.fail_open(&device.id, false);

        let mut input = backend.open(&device).unwrap();
        input.start().unwrap();
        backend.fail_capture(&device.id, true);
        let settings = PhotoSettings {
            flash: FlashMode::On,
        };
        assert!(input.capture_still(&settings).is_err());
        assert_eq!(backend.last_photo_settings(), Some(settings));
    }

    #[test]
    fn test_still_requires_streaming() {
        let backend = VirtualBackend::with_default_devices();
        let device = backend.enumerate_cameras()[0].clone();
        let mut input = backend.open(&device).unwrap();
        assert_eq!(
            input.capture_still(&PhotoSettings::default()).unwrap_err(),
            BackendError::NotStreaming
        );
    }
}
