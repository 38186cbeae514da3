//! Host input backends
//!
//! Every host platform exposes input injection through a different facility
//! (Win32 SendInput, macOS Quartz events, X11 XTest). The differences that
//! survive behind the shared dispatch layer — event pacing, wheel delta
//! conventions — live in a closed set of backend variants, selected once at
//! construction. Call sites never branch on the platform.

use crate::error::{InjectionError, InjectionResult};
use rdev::{simulate, EventType};
use std::time::Duration;
use tracing::trace;

/// A platform input backend
pub trait InputBackend: Send + Sync {
    /// Human-readable platform name
    fn platform(&self) -> &'static str;

    /// Converts wire scroll deltas (positive = down/right lines) into the
    /// host wheel convention.
    fn wheel_deltas(&self, delta_y: i32, delta_x: i32) -> (i64, i64);

    /// Pacing between consecutive injected events
    fn event_delay(&self) -> Duration;

    /// Dispatches one event to the host
    fn send(&self, event: &EventType) -> InjectionResult<()>;
}

/// Dispatches through the host facility, then paces the next event
fn dispatch(event: &EventType, delay: Duration) -> InjectionResult<()> {
    simulate(event).map_err(|e| InjectionError::Dispatch(format!("{:?}", e)))?;
    trace!("Injected {:?}", event);
    if !delay.is_zero() {
        std::thread::sleep(delay);
    }
    Ok(())
}

/// Windows backend (SendInput-style message injection)
pub struct WindowsBackend;

impl InputBackend for WindowsBackend {
    fn platform(&self) -> &'static str {
        "windows"
    }

    fn wheel_deltas(&self, delta_y: i32, delta_x: i32) -> (i64, i64) {
        // SendInput wheel events scroll toward the user for positive
        // deltas; wire deltas use positive = down.
        (-(delta_y as i64), delta_x as i64)
    }

    fn event_delay(&self) -> Duration {
        Duration::from_millis(5)
    }

    fn send(&self, event: &EventType) -> InjectionResult<()> {
        dispatch(event, self.event_delay())
    }
}

/// macOS backend (Quartz event automation)
pub struct MacosBackend;

impl InputBackend for MacosBackend {
    fn platform(&self) -> &'static str {
        "macos"
    }

    fn wheel_deltas(&self, delta_y: i32, delta_x: i32) -> (i64, i64) {
        // Quartz scroll events are line-based with positive = up.
        (-(delta_y as i64), delta_x as i64)
    }

    fn event_delay(&self) -> Duration {
        // Quartz drops events posted back-to-back without pacing.
        Duration::from_millis(10)
    }

    fn send(&self, event: &EventType) -> InjectionResult<()> {
        dispatch(event, self.event_delay())
    }
}

/// Linux/X11 backend (XTest extension)
pub struct X11Backend;

impl InputBackend for X11Backend {
    fn platform(&self) -> &'static str {
        "linux"
    }

    fn wheel_deltas(&self, delta_y: i32, delta_x: i32) -> (i64, i64) {
        // XTest wheel buttons scroll down for positive deltas already.
        (delta_y as i64, delta_x as i64)
    }

    fn event_delay(&self) -> Duration {
        Duration::from_millis(2)
    }

    fn send(&self, event: &EventType) -> InjectionResult<()> {
        dispatch(event, self.event_delay())
    }
}

/// Selects the backend for the compile-time host platform
pub fn host_backend() -> Box<dyn InputBackend> {
    #[cfg(target_os = "windows")]
    {
        Box::new(WindowsBackend)
    }
    #[cfg(target_os = "macos")]
    {
        Box::new(MacosBackend)
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        Box::new(X11Backend)
    }
}
