// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 capture input
//!
//! Opens a device node, negotiates the largest supported size up to the
//! capture limit, and streams through memory-mapped buffers. Frames leave
//! this module as RGBA.

use super::super::format_converters;
use super::super::types::*;
use super::super::CameraInput;
use crate::constants::capture as limits;
use std::io;
use std::time::Instant;
use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::framesize::FrameSizeEnum;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::{Format, FourCC};

/// An opened V4L2 capture device
pub struct V4l2Input {
    descriptor: DeviceDescriptor,
    device: Device,
    format: CameraFormat,
    stream: Option<Stream<'static>>,
    sequence: u64,
}

impl V4l2Input {
    /// Open the node at `path` on behalf of `descriptor`
    pub fn open(descriptor: &DeviceDescriptor, path: &str) -> BackendResult<Self> {
        info!(device = %descriptor.name, path, "Opening V4L2 device");

        let device = Device::with_path(path).map_err(|e| map_io_error(&descriptor.id, e))?;
        let format = negotiate_format(&device, &descriptor.id)?;

        info!(device = %descriptor.name, format = %format, "V4L2 format configured");

        Ok(Self {
            descriptor: descriptor.clone(),
            device,
            format,
            stream: None,
            sequence: 0,
        })
    }

    fn read_frame(&mut self) -> BackendResult<CameraFrame> {
        let stream = self.stream.as_mut().ok_or(BackendError::NotStreaming)?;
        let (buf, meta) = stream
            .next()
            .map_err(|e| map_io_error(&self.descriptor.id, e))?;

        let used = (meta.bytesused as usize).min(buf.len());
        let payload = if used == 0 { buf } else { &buf[..used] };

        let rgba = format_converters::to_rgba(
            self.format.pixel_format,
            payload,
            self.format.width,
            self.format.height,
        )?;

        self.sequence += 1;
        Ok(CameraFrame {
            width: self.format.width,
            height: self.format.height,
            data: rgba.into(),
            sequence: self.sequence,
            mirrored: false,
            captured_at: Instant::now(),
        })
    }
}

impl CameraInput for V4l2Input {
    fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    fn format(&self) -> CameraFormat {
        self.format
    }

    fn start(&mut self) -> BackendResult<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let mut stream = Stream::with_buffers(&self.device, Type::VideoCapture, limits::BUFFER_COUNT)
            .map_err(|e| map_io_error(&self.descriptor.id, e))?;
        stream.set_timeout(limits::FRAME_TIMEOUT);

        debug!(device = %self.descriptor.name, "V4L2 stream created");
        self.stream = Some(stream);
        Ok(())
    }

    fn stop(&mut self) -> BackendResult<()> {
        // Dropping the stream issues STREAMOFF and unmaps the buffers
        if self.stream.take().is_some() {
            debug!(device = %self.descriptor.name, "V4L2 stream stopped");
        }
        Ok(())
    }

    fn is_streaming(&self) -> bool {
        self.stream.is_some()
    }

    fn next_frame(&mut self) -> BackendResult<CameraFrame> {
        self.read_frame()
    }

    fn capture_still(&mut self, settings: &PhotoSettings) -> BackendResult<CameraFrame> {
        if settings.flash != FlashMode::Off {
            debug!(flash = ?settings.flash, "V4L2 devices have no flash control, ignoring");
        }

        // The oldest queued buffer may predate the shutter press
        for _ in 0..limits::STALE_BUFFERS {
            match self.read_frame() {
                Ok(_) | Err(BackendError::Timeout) => {}
                Err(e) => return Err(e),
            }
        }
        self.read_frame()
    }
}

impl Drop for V4l2Input {
    fn drop(&mut self) {
        debug!(device = %self.descriptor.name, "Releasing V4L2 device");
    }
}

/// Pick the capture format: largest area within the capture limit, then
/// the cheapest pixel format to decode
pub fn choose_format(candidates: &[CameraFormat]) -> Option<CameraFormat> {
    candidates
        .iter()
        .filter(|f| f.width <= limits::MAX_WIDTH && f.height <= limits::MAX_HEIGHT)
        .max_by(|a, b| {
            (a.width * a.height)
                .cmp(&(b.width * b.height))
                .then(b.pixel_format.preference().cmp(&a.pixel_format.preference()))
        })
        .or_else(|| candidates.iter().min_by_key(|f| f.width * f.height))
        .copied()
}

fn negotiate_format(device: &Device, id: &str) -> BackendResult<CameraFormat> {
    let descriptions = device.enum_formats().map_err(|e| map_io_error(id, e))?;

    let mut candidates = Vec::new();
    for description in descriptions {
        let Some(pixel_format) = PixelFormat::from_fourcc(&description.fourcc.repr) else {
            debug!(fourcc = ?description.fourcc, "Skipping unsupported pixel format");
            continue;
        };

        for size in device.enum_framesizes(description.fourcc).unwrap_or_default() {
            match size.size {
                FrameSizeEnum::Discrete(discrete) => candidates.push(CameraFormat {
                    width: discrete.width,
                    height: discrete.height,
                    pixel_format,
                }),
                FrameSizeEnum::Stepwise(step) => candidates.push(CameraFormat {
                    width: step.max_width.min(limits::MAX_WIDTH).max(step.min_width),
                    height: step.max_height.min(limits::MAX_HEIGHT).max(step.min_height),
                    pixel_format,
                }),
            }
        }
    }

    let wanted = choose_format(&candidates).ok_or_else(|| {
        BackendError::FormatNotSupported(format!("{} offers no MJPEG or YUV 4:2:2 format", id))
    })?;

    let requested = Format::new(wanted.width, wanted.height, FourCC::new(&wanted.pixel_format.fourcc()));
    let actual = device
        .set_format(&requested)
        .map_err(|e| map_io_error(id, e))?;

    let pixel_format = PixelFormat::from_fourcc(&actual.fourcc.repr).ok_or_else(|| {
        BackendError::FormatNotSupported(format!("driver switched to {:?}", actual.fourcc))
    })?;

    if actual.width != wanted.width || actual.height != wanted.height {
        warn!(
            wanted = %wanted,
            width = actual.width,
            height = actual.height,
            "Driver adjusted capture size"
        );
    }

    Ok(CameraFormat {
        width: actual.width,
        height: actual.height,
        pixel_format,
    })
}

/// Map an I/O error from the device to a backend error
pub fn map_io_error(id: &str, err: io::Error) -> BackendError {
    match err.raw_os_error() {
        Some(libc::ENODEV) | Some(libc::ENXIO) | Some(libc::ENOENT) => {
            return BackendError::Disconnected(id.to_string());
        }
        Some(libc::EACCES) | Some(libc::EPERM) => {
            return BackendError::PermissionDenied(id.to_string());
        }
        Some(libc::EBUSY) => {
            return BackendError::InitializationFailed(format!("{} is busy", id));
        }
        _ => {}
    }

    match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => BackendError::Timeout,
        io::ErrorKind::PermissionDenied => BackendError::PermissionDenied(id.to_string()),
        io::ErrorKind::NotFound => BackendError::Disconnected(id.to_string()),
        _ => BackendError::IoError(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(width: u32, height: u32, pixel_format: PixelFormat) -> CameraFormat {
        CameraFormat {
            width,
            height,
            pixel_format,
        }
    }

    #[test]
    fn test_choose_largest_within_limit() {
        let chosen = choose_format(&[
            fmt(640, 480, PixelFormat::YUYV),
            fmt(1920, 1080, PixelFormat::MJPG),
            fmt(3840, 2160, PixelFormat::MJPG),
        ]);
        assert_eq!(chosen, Some(fmt(1920, 1080, PixelFormat::MJPG)));
    }

    #[test]
    fn test_choose_prefers_mjpeg_on_tie() {
        let chosen = choose_format(&[
            fmt(1280, 720, PixelFormat::YUYV),
            fmt(1280, 720, PixelFormat::MJPG),
        ]);
        assert_eq!(chosen, Some(fmt(1280, 720, PixelFormat::MJPG)));
    }

    #[test]
    fn test_choose_oversized_only() {
        let chosen = choose_format(&[fmt(4096, 3072, PixelFormat::MJPG), fmt(3840, 2160, PixelFormat::YUYV)]);
        assert_eq!(chosen, Some(fmt(3840, 2160, PixelFormat::YUYV)));
        assert_eq!(choose_format(&[]), None);
    }

    #[test]
    fn test_enodev_is_disconnect() {
        let err = map_io_error("cam", io::Error::from_raw_os_error(libc::ENODEV));
        assert_eq!(err, BackendError::Disconnected("cam".to_string()));
        let err = map_io_error("cam", io::Error::from(io::ErrorKind::TimedOut));
        assert_eq!(err, BackendError::Timeout);
    }
}
