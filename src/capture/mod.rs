//! Screen capture module
//!
//! Handles display enumeration, single-shot and streaming capture, frame
//! encoding, and publish/subscribe delivery of compressed frames.

pub mod capture;
pub mod encoder;
pub mod types;

// Re-export commonly used types
pub use capture::{FrameCallback, ScreenCapture, SubscriptionId};
pub use encoder::{encode_bgra, EncodedImage};
pub use types::{
    CaptureStats, DisplayInfo, Fps, Frame, Quality, StreamSettings, DEFAULT_FPS, DEFAULT_QUALITY,
    DEFAULT_SCALE, MAX_FPS, MAX_QUALITY, MAX_SCALE, MIN_FPS, MIN_QUALITY, MIN_SCALE,
};
