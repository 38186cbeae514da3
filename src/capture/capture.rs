//! Screen capture and frame fan-out
//!
//! Captures the selected display at a configurable cadence and delivers
//! compressed frames synchronously to every registered subscriber. The
//! capture loop runs on a dedicated thread because the capture backend
//! handle is not `Send` on all platforms.

use crate::capture::encoder::encode_bgra;
use crate::capture::types::{CaptureStats, DisplayInfo, Frame, StreamSettings};
use crate::error::{CaptureError, CaptureResult};
use scrap::{Capturer, Display};
use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Timeout for a single host capture call
const CAPTURE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Delay between retries while the backend reports the frame is not ready
const WOULD_BLOCK_RETRY: Duration = Duration::from_millis(10);

/// Callback invoked for every delivered frame
pub type FrameCallback = Box<dyn Fn(Arc<Frame>) + Send + Sync + 'static>;

/// Handle identifying a registered subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Registry of frame sinks with per-sink failure isolation
struct SinkSet {
    sinks: Mutex<Vec<(u64, FrameCallback)>>,
    next_id: AtomicU64,
}

impl SinkSet {
    fn new() -> Self {
        Self {
            sinks: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    // A panicking sink must not poison the registry for the others.
    fn lock(&self) -> MutexGuard<'_, Vec<(u64, FrameCallback)>> {
        match self.sinks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn subscribe(&self, callback: FrameCallback) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.lock().push((id, callback));
        SubscriptionId(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut sinks = self.lock();
        let before = sinks.len();
        sinks.retain(|(sink_id, _)| *sink_id != id.0);
        sinks.len() != before
    }

    fn len(&self) -> usize {
        self.lock().len()
    }

    /// Delivers one frame to every sink; a failing sink never prevents
    /// delivery to the others.
    fn fan_out(&self, frame: &Arc<Frame>) {
        let sinks = self.lock();
        for (id, callback) in sinks.iter() {
            let delivery = catch_unwind(AssertUnwindSafe(|| callback(Arc::clone(frame))));
            if delivery.is_err() {
                error!("Frame subscriber {} panicked; continuing delivery", id);
            }
        }
    }
}

/// State shared between the public handle and the capture thread
struct Shared {
    settings: Mutex<StreamSettings>,
    current_display: AtomicU32,
    display_count: AtomicU32,
    sinks: SinkSet,
    streaming: AtomicBool,
    /// Incremented per started loop; a superseded loop exits even if the
    /// streaming flag was set again in the meantime.
    generation: AtomicU64,
    frame_number: AtomicU64,
    stats: Mutex<CaptureStats>,
}

impl Shared {
    fn settings_snapshot(&self) -> StreamSettings {
        match self.settings.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn with_stats<R>(&self, f: impl FnOnce(&mut CaptureStats) -> R) -> R {
        let mut guard = match self.stats.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }
}

/// Screen capturer with publish/subscribe frame delivery
pub struct ScreenCapture {
    shared: Arc<Shared>,
}

impl Default for ScreenCapture {
    fn default() -> Self {
        Self::new(StreamSettings::default())
    }
}

impl ScreenCapture {
    /// Creates a new capturer with the given initial settings
    pub fn new(settings: StreamSettings) -> Self {
        Self {
            shared: Arc::new(Shared {
                settings: Mutex::new(settings),
                current_display: AtomicU32::new(0),
                display_count: AtomicU32::new(0),
                sinks: SinkSet::new(),
                streaming: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                frame_number: AtomicU64::new(0),
                stats: Mutex::new(CaptureStats::default()),
            }),
        }
    }

    /// Enumerates the available displays
    ///
    /// Display ids are stable indexes into this list for the session.
    ///
    /// # Errors
    ///
    /// Returns error if displays cannot be enumerated or none exist
    pub fn displays(&self) -> CaptureResult<Vec<DisplayInfo>> {
        let displays =
            Display::all().map_err(|e| CaptureError::Backend(e.to_string()))?;
        if displays.is_empty() {
            return Err(CaptureError::NoDisplays);
        }

        let infos: Vec<DisplayInfo> = displays
            .iter()
            .enumerate()
            .map(|(idx, display)| DisplayInfo {
                id: idx as u32,
                name: format!("Display {}", idx),
                width: display.width() as u32,
                height: display.height() as u32,
                is_primary: idx == 0,
            })
            .collect();

        self.shared
            .display_count
            .store(infos.len() as u32, Ordering::SeqCst);
        Ok(infos)
    }

    /// Captures a single frame from the selected display
    ///
    /// # Errors
    ///
    /// Returns error if the host capture call fails or times out
    pub fn capture_frame(&self) -> CaptureResult<Frame> {
        let settings = self.shared.settings_snapshot();
        let display_id = self.shared.current_display.load(Ordering::SeqCst);

        let (mut capturer, width, height) = open_capturer(display_id)?;
        let bgra = capture_bgra(&mut capturer, CAPTURE_TIMEOUT)?;
        let stride = bgra.len() / height;

        let encoded = encode_bgra(&bgra, width, height, stride, &settings)?;
        let frame_number = self.shared.frame_number.fetch_add(1, Ordering::SeqCst);

        Ok(Frame::new(
            encoded.jpeg,
            encoded.width,
            encoded.height,
            frame_number,
            display_id,
        ))
    }

    /// Starts the streaming loop at the given frame rate
    ///
    /// Idempotent: returns `Ok(false)` without side effects when a loop is
    /// already running. At most one loop exists per instance.
    ///
    /// # Errors
    ///
    /// Returns error if no display is available
    pub fn start_streaming(&self, fps: u8) -> CaptureResult<bool> {
        self.set_fps(fps);

        // Fail fast, before claiming the streaming flag.
        self.displays()?;

        if self
            .shared
            .streaming
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("start_streaming ignored: capture loop already running");
            return Ok(false);
        }

        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let shared = Arc::clone(&self.shared);
        std::thread::spawn(move || capture_loop(shared, generation));
        Ok(true)
    }

    /// Stops the streaming loop
    ///
    /// Effective before the next scheduled capture fires; an in-flight
    /// capture may complete but no further capture is scheduled.
    pub fn stop_streaming(&self) {
        if self.shared.streaming.swap(false, Ordering::SeqCst) {
            info!("Stopping screen capture");
        }
    }

    /// Returns whether the streaming loop is active
    pub fn is_streaming(&self) -> bool {
        self.shared.streaming.load(Ordering::SeqCst)
    }

    /// Registers a frame subscriber
    pub fn subscribe(&self, callback: FrameCallback) -> SubscriptionId {
        self.shared.sinks.subscribe(callback)
    }

    /// Removes a frame subscriber; returns whether it was registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.sinks.unsubscribe(id)
    }

    /// Returns the number of registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.shared.sinks.len()
    }

    /// Sets the frame rate, clamped; takes effect on the next loop iteration
    pub fn set_fps(&self, fps: u8) {
        let mut settings = match self.shared.settings.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        settings.set_fps(fps);
    }

    /// Sets the JPEG quality, clamped
    pub fn set_quality(&self, quality: u8) {
        let mut settings = match self.shared.settings.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        settings.set_quality(quality);
    }

    /// Sets the output scale, clamped
    pub fn set_scale(&self, scale: f32) {
        let mut settings = match self.shared.settings.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        settings.set_scale(scale);
    }

    /// Selects the display to capture, clamped into the enumerated range
    ///
    /// Enumerates displays first when no enumeration has happened yet.
    pub fn select_display(&self, display_id: u32) {
        let mut count = self.shared.display_count.load(Ordering::SeqCst);
        if count == 0 {
            if let Ok(displays) = self.displays() {
                count = displays.len() as u32;
            }
        }

        let clamped = if count == 0 {
            0
        } else {
            display_id.min(count - 1)
        };
        if clamped != display_id {
            warn!("Display {} out of range, clamped to {}", display_id, clamped);
        }
        self.shared.current_display.store(clamped, Ordering::SeqCst);
    }

    /// Returns the id of the display being captured
    pub fn current_display(&self) -> u32 {
        self.shared.current_display.load(Ordering::SeqCst)
    }

    /// Returns a snapshot of the current stream settings
    pub fn settings(&self) -> StreamSettings {
        self.shared.settings_snapshot()
    }

    /// Returns a snapshot of the capture statistics
    pub fn stats(&self) -> CaptureStats {
        self.shared.with_stats(|stats| stats.clone())
    }
}

/// Opens a capturer for the display at the given index
fn open_capturer(display_id: u32) -> CaptureResult<(Capturer, usize, usize)> {
    let displays = Display::all().map_err(|e| CaptureError::Backend(e.to_string()))?;
    if displays.is_empty() {
        return Err(CaptureError::NoDisplays);
    }

    let display = displays
        .into_iter()
        .nth(display_id as usize)
        .ok_or(CaptureError::DisplayNotFound(display_id))?;

    let width = display.width();
    let height = display.height();
    let capturer =
        Capturer::new(display).map_err(|e| CaptureError::Backend(e.to_string()))?;

    Ok((capturer, width, height))
}

/// Captures one BGRA frame, retrying while the backend is not ready
fn capture_bgra(capturer: &mut Capturer, timeout: Duration) -> CaptureResult<Vec<u8>> {
    let start = Instant::now();
    loop {
        match capturer.frame() {
            Ok(frame) => return Ok(frame.to_vec()),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                if start.elapsed() > timeout {
                    return Err(CaptureError::Timeout(timeout));
                }
                std::thread::sleep(WOULD_BLOCK_RETRY);
            }
            Err(e) => return Err(CaptureError::Backend(e.to_string())),
        }
    }
}

/// The self-rescheduling capture loop
///
/// Captures, fans out, then sleeps for the remainder of the frame interval
/// measured from before the capture began, so slow captures compress the
/// effective rate instead of drifting. Runs until the streaming flag clears
/// or a newer loop supersedes this one.
fn capture_loop(shared: Arc<Shared>, generation: u64) {
    info!("Capture loop started");
    let mut capturer: Option<(u32, Capturer, usize, usize)> = None;

    while shared.streaming.load(Ordering::SeqCst)
        && shared.generation.load(Ordering::SeqCst) == generation
    {
        let loop_start = Instant::now();
        let settings = shared.settings_snapshot();
        let display_id = shared.current_display.load(Ordering::SeqCst);

        // Reopen the capturer on first use and after a display switch.
        let needs_open = capturer
            .as_ref()
            .map(|(id, _, _, _)| *id != display_id)
            .unwrap_or(true);
        if needs_open {
            match open_capturer(display_id) {
                Ok((cap, width, height)) => {
                    debug!("Capturing display {} ({}x{})", display_id, width, height);
                    capturer = Some((display_id, cap, width, height));
                }
                Err(e) => {
                    warn!("Failed to open display {}: {}", display_id, e);
                    shared.with_stats(|stats| stats.frames_dropped += 1);
                    sleep_remainder(loop_start, &settings);
                    continue;
                }
            }
        }

        if let Some((_, cap, width, height)) = capturer.as_mut() {
            match capture_one(cap, *width, *height, display_id, &settings, &shared) {
                Ok(frame) => {
                    let elapsed_ms = loop_start.elapsed().as_secs_f64() * 1000.0;
                    shared.with_stats(|stats| stats.record_frame(frame.size_bytes(), elapsed_ms));
                    shared.sinks.fan_out(&frame);
                }
                Err(e) => {
                    // A single bad frame is not fatal; viewers see a gap in
                    // frame numbers at most.
                    warn!("Frame capture failed: {}", e);
                    shared.with_stats(|stats| stats.frames_dropped += 1);
                    if matches!(e, CaptureError::Backend(_)) {
                        capturer = None;
                    }
                }
            }
        }

        sleep_remainder(loop_start, &settings);
    }

    info!("Capture loop stopped");
}

/// Captures and encodes one frame inside the loop
fn capture_one(
    capturer: &mut Capturer,
    width: usize,
    height: usize,
    display_id: u32,
    settings: &StreamSettings,
    shared: &Shared,
) -> CaptureResult<Arc<Frame>> {
    let bgra = capture_bgra(capturer, CAPTURE_TIMEOUT)?;
    let stride = bgra.len() / height;
    let encoded = encode_bgra(&bgra, width, height, stride, settings)?;
    let frame_number = shared.frame_number.fetch_add(1, Ordering::SeqCst);

    Ok(Arc::new(Frame::new(
        encoded.jpeg,
        encoded.width,
        encoded.height,
        frame_number,
        display_id,
    )))
}

/// Sleeps out the rest of the frame interval measured from `loop_start`
fn sleep_remainder(loop_start: Instant, settings: &StreamSettings) {
    let interval = settings.frame_interval();
    let elapsed = loop_start.elapsed();
    if elapsed < interval {
        std::thread::sleep(interval - elapsed);
    }
}
