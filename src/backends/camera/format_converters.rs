// SPDX-License-Identifier: GPL-3.0-only
//! Pixel format conversion to RGBA
//!
//! Capture hardware hands out MJPEG or packed YUV 4:2:2 buffers. Everything
//! downstream of the backend works on tightly packed RGBA.

use super::types::{BackendError, BackendResult, PixelFormat};

/// Convert a raw capture buffer of the given format to RGBA
pub fn to_rgba(format: PixelFormat, data: &[u8], width: u32, height: u32) -> BackendResult<Vec<u8>> {
    let rgba = match format {
        PixelFormat::MJPG => decode_mjpeg(data, width, height)?,
        PixelFormat::YUYV => yuyv_to_rgba(data, width, height),
        PixelFormat::UYVY => uyvy_to_rgba(data, width, height),
        PixelFormat::RGBA => data.to_vec(),
    };

    let expected = (width * height * 4) as usize;
    if rgba.len() < expected {
        return Err(BackendError::FormatNotSupported(format!(
            "{:?} buffer too small: expected {} RGBA bytes, got {}",
            format,
            expected,
            rgba.len()
        )));
    }

    Ok(rgba)
}

/// Decode one MJPEG buffer
///
/// Webcams occasionally emit frames whose size differs from the negotiated
/// format; those are resized so the caller can rely on `width`/`height`.
pub fn decode_mjpeg(data: &[u8], width: u32, height: u32) -> BackendResult<Vec<u8>> {
    let image = image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)
        .map_err(|e| BackendError::Other(format!("MJPEG decode failed: {}", e)))?;

    let image = if image.width() != width || image.height() != height {
        image.resize_exact(width, height, image::imageops::FilterType::Triangle)
    } else {
        image
    };

    Ok(image.to_rgba8().into_raw())
}

/// Convert YUYV (YUV 4:2:2) to RGBA
///
/// YUYV format: Y0 U0 Y1 V0 - each 4-byte group encodes 2 pixels.
pub fn yuyv_to_rgba(data: &[u8], width: u32, height: u32) -> Vec<u8> {
    packed_422_to_rgba(data, width, height, |chunk| {
        (chunk[0], chunk[1], chunk[2], chunk[3])
    })
}

/// Convert UYVY (YUV 4:2:2) to RGBA
///
/// UYVY format: U0 Y0 V0 Y1 - each 4-byte group encodes 2 pixels.
pub fn uyvy_to_rgba(data: &[u8], width: u32, height: u32) -> Vec<u8> {
    packed_422_to_rgba(data, width, height, |chunk| {
        (chunk[1], chunk[0], chunk[3], chunk[2])
    })
}

/// Shared 4:2:2 path; `split` returns (y0, u, y1, v) for one 4-byte group
fn packed_422_to_rgba<F>(data: &[u8], width: u32, height: u32, split: F) -> Vec<u8>
where
    F: Fn(&[u8]) -> (u8, u8, u8, u8),
{
    let pixel_count = (width * height) as usize;
    let mut rgba = Vec::with_capacity(pixel_count * 4);

    for chunk in data.chunks_exact(4) {
        let (y0, u, y1, v) = split(chunk);
        let u = u as f32 - 128.0;
        let v = v as f32 - 128.0;

        // BT.601
        for y in [y0 as f32, y1 as f32] {
            if rgba.len() >= pixel_count * 4 {
                break;
            }
            rgba.push((y + 1.402 * v).clamp(0.0, 255.0) as u8);
            rgba.push((y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8);
            rgba.push((y + 1.772 * u).clamp(0.0, 255.0) as u8);
            rgba.push(255);
        }
    }

    rgba
}
