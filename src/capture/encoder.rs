//! Frame encoding
//!
//! Converts raw BGRA captures into scaled, JPEG-compressed frame payloads.
//! Capture backends hand over BGRA rows whose stride may include padding.

use crate::capture::types::{Quality, StreamSettings};
use crate::error::{CaptureError, CaptureResult};
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use std::io::Cursor;
use tracing::trace;

/// An encoded image with its output dimensions
#[derive(Debug, Clone)]
pub struct EncodedImage {
    /// JPEG data
    pub jpeg: Vec<u8>,
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
}

/// Computes output dimensions for a scale factor, never collapsing to zero
pub(crate) fn scaled_dimensions(width: u32, height: u32, scale: f32) -> (u32, u32) {
    if scale >= 1.0 {
        return (width, height);
    }
    let out_w = ((width as f32 * scale) as u32).max(1);
    let out_h = ((height as f32 * scale) as u32).max(1);
    (out_w, out_h)
}

/// Converts a BGRA capture buffer (with row stride) into an RGB image
pub(crate) fn bgra_to_rgb(
    bgra: &[u8],
    width: usize,
    height: usize,
    stride: usize,
) -> CaptureResult<RgbImage> {
    if stride < width * 4 || bgra.len() < stride * height {
        return Err(CaptureError::Backend(format!(
            "capture buffer too small: {} bytes for {}x{} stride {}",
            bgra.len(),
            width,
            height,
            stride
        )));
    }

    let mut img = RgbImage::new(width as u32, height as u32);
    for y in 0..height {
        let row = &bgra[y * stride..y * stride + width * 4];
        for x in 0..width {
            let i = x * 4;
            img.put_pixel(x as u32, y as u32, Rgb([row[i + 2], row[i + 1], row[i]]));
        }
    }
    Ok(img)
}

/// Encodes an RGB image as JPEG at the given quality
pub(crate) fn jpeg_encode(img: &RgbImage, quality: Quality) -> CaptureResult<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
    encoder
        .encode(
            img.as_raw(),
            img.width(),
            img.height(),
            image::ColorType::Rgb8,
        )
        .map_err(|e| CaptureError::Encode(e.to_string()))?;
    Ok(buffer.into_inner())
}

/// Encodes a raw BGRA capture into a scaled JPEG payload
///
/// # Errors
///
/// Returns [`CaptureError::Backend`] on a malformed capture buffer and
/// [`CaptureError::Encode`] if JPEG encoding fails.
pub fn encode_bgra(
    bgra: &[u8],
    width: usize,
    height: usize,
    stride: usize,
    settings: &StreamSettings,
) -> CaptureResult<EncodedImage> {
    let rgb = bgra_to_rgb(bgra, width, height, stride)?;

    let (out_w, out_h) = scaled_dimensions(width as u32, height as u32, settings.scale);
    let rgb = if (out_w, out_h) != (width as u32, height as u32) {
        imageops::resize(&rgb, out_w, out_h, FilterType::Triangle)
    } else {
        rgb
    };

    let jpeg = jpeg_encode(&rgb, settings.quality)?;
    trace!(
        "Encoded {}x{} capture to {}x{} JPEG ({} bytes)",
        width,
        height,
        out_w,
        out_h,
        jpeg.len()
    );

    Ok(EncodedImage {
        jpeg,
        width: out_w,
        height: out_h,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_bgra(width: usize, height: usize) -> Vec<u8> {
        let mut data = vec![0u8; width * height * 4];
        for (i, px) in data.chunks_exact_mut(4).enumerate() {
            px[0] = (i % 256) as u8; // B
            px[1] = ((i / 7) % 256) as u8; // G
            px[2] = ((i / 13) % 256) as u8; // R
            px[3] = 255;
        }
        data
    }

    #[test]
    fn test_scaled_dimensions() {
        assert_eq!(scaled_dimensions(1920, 1080, 1.0), (1920, 1080));
        assert_eq!(scaled_dimensions(1920, 1080, 0.5), (960, 540));
        assert_eq!(scaled_dimensions(4, 4, 0.1), (1, 1));
    }

    #[test]
    fn test_encode_produces_jpeg() {
        let bgra = test_bgra(64, 48);
        let settings = StreamSettings::new(10, 70, 1.0);

        let encoded = encode_bgra(&bgra, 64, 48, 64 * 4, &settings).unwrap();
        assert_eq!(encoded.width, 64);
        assert_eq!(encoded.height, 48);
        // JPEG SOI marker
        assert_eq!(&encoded.jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_encode_applies_scale() {
        let bgra = test_bgra(64, 48);
        let settings = StreamSettings::new(10, 70, 0.5);

        let encoded = encode_bgra(&bgra, 64, 48, 64 * 4, &settings).unwrap();
        assert_eq!(encoded.width, 32);
        assert_eq!(encoded.height, 24);
    }

    #[test]
    fn test_encode_handles_padded_stride() {
        let width = 30;
        let height = 10;
        let stride = 32 * 4; // 2 pixels of row padding
        let bgra = vec![128u8; stride * height];
        let settings = StreamSettings::default();

        let encoded = encode_bgra(&bgra, width, height, stride, &settings).unwrap();
        assert_eq!(encoded.width, width as u32);
    }

    #[test]
    fn test_encode_rejects_short_buffer() {
        let settings = StreamSettings::default();
        let result = encode_bgra(&[0u8; 16], 64, 48, 64 * 4, &settings);
        assert!(matches!(result, Err(CaptureError::Backend(_))));
    }
}
