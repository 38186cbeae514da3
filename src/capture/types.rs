//! Capture types and data structures
//!
//! Common types used across the capture layer: display descriptors, encoded
//! frames, and the clamped stream settings.

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Frames per second setting
pub type Fps = u8;

/// JPEG quality setting
pub type Quality = u8;

/// Valid FPS range constants
pub const MIN_FPS: Fps = 1;
pub const MAX_FPS: Fps = 30;
pub const DEFAULT_FPS: Fps = 10;

/// Valid quality range constants
pub const MIN_QUALITY: Quality = 10;
pub const MAX_QUALITY: Quality = 100;
pub const DEFAULT_QUALITY: Quality = 70;

/// Valid scale range constants
pub const MIN_SCALE: f32 = 0.1;
pub const MAX_SCALE: f32 = 1.0;
pub const DEFAULT_SCALE: f32 = 1.0;

/// Display information
///
/// `id` is a stable index into the list enumerated at capture start; it is
/// valid for the lifetime of the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayInfo {
    /// Display identifier (index into the enumerated list)
    pub id: u32,
    /// Display name
    pub name: String,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Whether this is the primary display
    #[serde(rename = "primary")]
    pub is_primary: bool,
}

/// A captured, compressed screen frame
///
/// Immutable once produced. Consumed by zero or more subscribers and dropped
/// after delivery; frames are never persisted.
#[derive(Debug, Clone)]
pub struct Frame {
    /// JPEG-compressed image data
    pub image_bytes: Vec<u8>,
    /// Output width in pixels (after scaling)
    pub width: u32,
    /// Output height in pixels (after scaling)
    pub height: u32,
    /// Monotonically increasing frame number
    pub frame_number: u64,
    /// Capture timestamp in milliseconds since the Unix epoch
    pub timestamp_ms: u64,
    /// Display the frame was captured from
    pub display_id: u32,
}

impl Frame {
    /// Creates a new frame stamped with the current time
    pub fn new(
        image_bytes: Vec<u8>,
        width: u32,
        height: u32,
        frame_number: u64,
        display_id: u32,
    ) -> Self {
        Self {
            image_bytes,
            width,
            height,
            frame_number,
            timestamp_ms: current_timestamp_ms(),
            display_id,
        }
    }

    /// Returns the size of the compressed data in bytes
    pub fn size_bytes(&self) -> usize {
        self.image_bytes.len()
    }
}

/// Returns the current time in milliseconds since the Unix epoch
pub(crate) fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Stream settings, clamped on every set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreamSettings {
    /// Target frames per second
    pub fps: Fps,
    /// JPEG quality
    pub quality: Quality,
    /// Output scale factor applied to both dimensions
    pub scale: f32,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            fps: DEFAULT_FPS,
            quality: DEFAULT_QUALITY,
            scale: DEFAULT_SCALE,
        }
    }
}

impl StreamSettings {
    /// Creates settings with every field clamped into range
    pub fn new(fps: Fps, quality: Quality, scale: f32) -> Self {
        Self {
            fps: fps.clamp(MIN_FPS, MAX_FPS),
            quality: quality.clamp(MIN_QUALITY, MAX_QUALITY),
            scale: scale.clamp(MIN_SCALE, MAX_SCALE),
        }
    }

    /// Sets the frame rate, clamped into `[MIN_FPS, MAX_FPS]`
    pub fn set_fps(&mut self, fps: Fps) {
        self.fps = fps.clamp(MIN_FPS, MAX_FPS);
    }

    /// Sets the quality, clamped into `[MIN_QUALITY, MAX_QUALITY]`
    pub fn set_quality(&mut self, quality: Quality) {
        self.quality = quality.clamp(MIN_QUALITY, MAX_QUALITY);
    }

    /// Sets the scale, clamped into `[MIN_SCALE, MAX_SCALE]`
    pub fn set_scale(&mut self, scale: f32) {
        self.scale = scale.clamp(MIN_SCALE, MAX_SCALE);
    }

    /// Returns the interval between captures at the current frame rate
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(1000 / self.fps as u64)
    }
}

/// Capture statistics
#[derive(Debug, Default, Clone)]
pub struct CaptureStats {
    /// Total frames captured and delivered
    pub frames_captured: u64,
    /// Total frames dropped (capture or encode failure)
    pub frames_dropped: u64,
    /// Total compressed bytes produced
    pub bytes_encoded: u64,
    /// Average capture-and-encode time in milliseconds (moving average)
    pub avg_capture_time_ms: f64,
}

impl CaptureStats {
    /// Records a delivered frame
    pub(crate) fn record_frame(&mut self, encoded_bytes: usize, elapsed_ms: f64) {
        self.frames_captured += 1;
        self.bytes_encoded += encoded_bytes as u64;
        if self.avg_capture_time_ms == 0.0 {
            self.avg_capture_time_ms = elapsed_ms;
        } else {
            self.avg_capture_time_ms = self.avg_capture_time_ms * 0.9 + elapsed_ms * 0.1;
        }
    }

    /// Returns the drop rate as a percentage
    pub fn drop_rate(&self) -> f64 {
        let total = self.frames_captured + self.frames_dropped;
        if total == 0 {
            return 0.0;
        }
        (self.frames_dropped as f64 / total as f64) * 100.0
    }
}
