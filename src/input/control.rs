//! Input controller
//!
//! The public input surface: platform-agnostic operations over normalized
//! coordinates and canonical key names, dispatched through the host backend
//! selected at construction. Every operation checks the master enable switch
//! first and reports failure instead of panicking.

use crate::error::{InjectionError, InjectionResult};
use crate::input::backend::{host_backend, InputBackend};
use crate::input::keymap::{keystroke_for_char, resolve_key, resolve_modifier};
use crate::input::types::{KeyName, Modifier, MouseButton};
use rdev::{Button, EventType};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, warn};

/// Screen size assumed when the host probe fails
const FALLBACK_SCREEN_SIZE: (f64, f64) = (1920.0, 1080.0);

/// Input controller for remote mouse and keyboard events
pub struct InputController {
    backend: Box<dyn InputBackend>,
    /// Master kill-switch checked at the top of every operation
    enabled: AtomicBool,
    /// Host screen size, probed once at construction
    screen_size: (f64, f64),
    events_injected: AtomicU64,
    events_failed: AtomicU64,
}

impl InputController {
    /// Creates a controller for the host platform
    ///
    /// Probes the screen size once; callers convert normalized coordinates
    /// against this cached size.
    pub fn new(enabled: bool) -> Self {
        let screen_size = match rdev::display_size() {
            Ok((width, height)) => (width as f64, height as f64),
            Err(e) => {
                warn!(
                    "Failed to probe screen size ({:?}), assuming {}x{}",
                    e, FALLBACK_SCREEN_SIZE.0, FALLBACK_SCREEN_SIZE.1
                );
                FALLBACK_SCREEN_SIZE
            }
        };

        Self::with_backend(host_backend(), screen_size, enabled)
    }

    /// Creates a controller with an explicit backend and screen size
    pub fn with_backend(
        backend: Box<dyn InputBackend>,
        screen_size: (f64, f64),
        enabled: bool,
    ) -> Self {
        debug!(
            "Input controller on {} backend, screen {}x{}",
            backend.platform(),
            screen_size.0,
            screen_size.1
        );
        Self {
            backend,
            enabled: AtomicBool::new(enabled),
            screen_size,
            events_injected: AtomicU64::new(0),
            events_failed: AtomicU64::new(0),
        }
    }

    /// Enables or disables input injection
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Returns whether input injection is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Returns the number of events successfully injected
    pub fn events_injected(&self) -> u64 {
        self.events_injected.load(Ordering::Relaxed)
    }

    /// Returns the number of events that failed
    pub fn events_failed(&self) -> u64 {
        self.events_failed.load(Ordering::Relaxed)
    }

    fn check_enabled(&self) -> InjectionResult<()> {
        if self.is_enabled() {
            Ok(())
        } else {
            Err(InjectionError::Disabled)
        }
    }

    /// Converts normalized `[0,1]` coordinates to host pixels
    fn to_screen(&self, x: f64, y: f64) -> (f64, f64) {
        let x = x.clamp(0.0, 1.0);
        let y = y.clamp(0.0, 1.0);
        (x * self.screen_size.0, y * self.screen_size.1)
    }

    fn record<T>(&self, result: InjectionResult<T>) -> InjectionResult<T> {
        match &result {
            Ok(_) => {
                self.events_injected.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.events_failed.fetch_add(1, Ordering::Relaxed);
            }
        }
        result
    }

    /// Moves the pointer to a normalized position
    pub fn move_mouse(&self, x: f64, y: f64) -> InjectionResult<()> {
        self.check_enabled()?;
        let (px, py) = self.to_screen(x, y);
        self.record(self.backend.send(&EventType::MouseMove { x: px, y: py }))
    }

    /// Clicks a button at the current pointer position
    pub fn click(&self, button: MouseButton) -> InjectionResult<()> {
        self.check_enabled()?;
        let button = convert_button(button);
        self.record(
            self.backend
                .send(&EventType::ButtonPress(button))
                .and_then(|_| self.backend.send(&EventType::ButtonRelease(button))),
        )
    }

    /// Moves the pointer to a normalized position, then clicks
    pub fn click_at(&self, x: f64, y: f64, button: MouseButton) -> InjectionResult<()> {
        self.move_mouse(x, y)?;
        self.click(button)
    }

    /// Double-clicks the left button at the current pointer position
    pub fn double_click(&self) -> InjectionResult<()> {
        self.click(MouseButton::Left)?;
        self.click(MouseButton::Left)
    }

    /// Types a text string, escaping shifted characters per the keymap
    ///
    /// Stops at the first unsupported character.
    pub fn type_text(&self, text: &str) -> InjectionResult<()> {
        self.check_enabled()?;
        for c in text.chars() {
            let (key, shifted) = match keystroke_for_char(c) {
                Some(stroke) => stroke,
                None => {
                    return self.record(Err(InjectionError::UnsupportedChar(c)));
                }
            };

            let shift = resolve_modifier(Modifier::Shift);
            let result = (|| {
                if shifted {
                    self.backend.send(&EventType::KeyPress(shift))?;
                }
                self.backend.send(&EventType::KeyPress(key))?;
                self.backend.send(&EventType::KeyRelease(key))?;
                if shifted {
                    self.backend.send(&EventType::KeyRelease(shift))?;
                }
                Ok(())
            })();
            self.record(result)?;
        }
        Ok(())
    }

    /// Presses and releases a canonical key
    pub fn press_key(&self, name: &str) -> InjectionResult<()> {
        self.check_enabled()?;
        let key = KeyName::parse(name)
            .and_then(resolve_key)
            .ok_or_else(|| InjectionError::UnsupportedKey(name.to_string()))?;

        self.record(
            self.backend
                .send(&EventType::KeyPress(key))
                .and_then(|_| self.backend.send(&EventType::KeyRelease(key))),
        )
    }

    /// Presses a key while holding the given modifiers
    ///
    /// Modifiers are pressed in order and released in reverse.
    pub fn press_combo(&self, modifiers: &[String], key: &str) -> InjectionResult<()> {
        self.check_enabled()?;

        let mods: Vec<_> = modifiers
            .iter()
            .map(|m| {
                Modifier::parse(m)
                    .map(resolve_modifier)
                    .ok_or_else(|| InjectionError::UnsupportedKey(m.clone()))
            })
            .collect::<InjectionResult<_>>()?;
        let key = KeyName::parse(key)
            .and_then(resolve_key)
            .ok_or_else(|| InjectionError::UnsupportedKey(key.to_string()))?;

        let result = (|| {
            for m in &mods {
                self.backend.send(&EventType::KeyPress(*m))?;
            }
            self.backend.send(&EventType::KeyPress(key))?;
            self.backend.send(&EventType::KeyRelease(key))?;
            for m in mods.iter().rev() {
                self.backend.send(&EventType::KeyRelease(*m))?;
            }
            Ok(())
        })();
        self.record(result)
    }

    /// Scrolls by wire deltas (positive = down/right)
    pub fn scroll(&self, delta_y: i32, delta_x: i32) -> InjectionResult<()> {
        self.check_enabled()?;
        let (dy, dx) = self.backend.wheel_deltas(delta_y, delta_x);
        self.record(self.backend.send(&EventType::Wheel {
            delta_x: dx,
            delta_y: dy,
        }))
    }
}

/// Converts a wire mouse button to the host button
fn convert_button(button: MouseButton) -> Button {
    match button {
        MouseButton::Left => Button::Left,
        MouseButton::Right => Button::Right,
        MouseButton::Middle => Button::Middle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Backend that records every event instead of touching the host
    struct MockBackend {
        events: Mutex<Vec<EventType>>,
    }

    impl MockBackend {
        fn new() -> Self {
            Self {
                events: Mutex::new(Vec::new()),
            }
        }
    }

    impl InputBackend for MockBackend {
        fn platform(&self) -> &'static str {
            "mock"
        }

        fn wheel_deltas(&self, delta_y: i32, delta_x: i32) -> (i64, i64) {
            (delta_y as i64, delta_x as i64)
        }

        fn event_delay(&self) -> Duration {
            Duration::ZERO
        }

        fn send(&self, event: &EventType) -> InjectionResult<()> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    fn controller() -> (InputController, std::sync::Arc<MockBackend>) {
        // Keep a second handle to the mock for assertions
        let backend = std::sync::Arc::new(MockBackend::new());

        struct Shared(std::sync::Arc<MockBackend>);
        impl InputBackend for Shared {
            fn platform(&self) -> &'static str {
                self.0.platform()
            }
            fn wheel_deltas(&self, dy: i32, dx: i32) -> (i64, i64) {
                self.0.wheel_deltas(dy, dx)
            }
            fn event_delay(&self) -> Duration {
                self.0.event_delay()
            }
            fn send(&self, event: &EventType) -> InjectionResult<()> {
                self.0.send(event)
            }
        }

        let controller = InputController::with_backend(
            Box::new(Shared(std::sync::Arc::clone(&backend))),
            (1920.0, 1080.0),
            true,
        );
        (controller, backend)
    }

    #[test]
    fn test_disabled_controller_rejects_everything() {
        let (controller, backend) = controller();
        controller.set_enabled(false);

        assert!(matches!(
            controller.move_mouse(0.5, 0.5),
            Err(InjectionError::Disabled)
        ));
        assert!(matches!(
            controller.click(MouseButton::Left),
            Err(InjectionError::Disabled)
        ));
        assert!(matches!(
            controller.type_text("hi"),
            Err(InjectionError::Disabled)
        ));
        assert!(matches!(
            controller.press_key("enter"),
            Err(InjectionError::Disabled)
        ));
        assert!(matches!(
            controller.scroll(1, 0),
            Err(InjectionError::Disabled)
        ));

        // Nothing reached the host
        assert!(backend.events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_move_mouse_converts_normalized_coordinates() {
        let (controller, backend) = controller();

        controller.move_mouse(0.5, 0.5).unwrap();
        let events = backend.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        match events[0] {
            EventType::MouseMove { x, y } => {
                assert_eq!(x, 960.0);
                assert_eq!(y, 540.0);
            }
            ref other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_out_of_range_coordinates_are_clamped() {
        let (controller, backend) = controller();

        controller.move_mouse(1.5, -0.2).unwrap();
        let events = backend.events.lock().unwrap();
        match events[0] {
            EventType::MouseMove { x, y } => {
                assert_eq!(x, 1920.0);
                assert_eq!(y, 0.0);
            }
            ref other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_click_presses_and_releases() {
        let (controller, backend) = controller();

        controller.click(MouseButton::Right).unwrap();
        let events = backend.events.lock().unwrap();
        assert!(matches!(events[0], EventType::ButtonPress(Button::Right)));
        assert!(matches!(events[1], EventType::ButtonRelease(Button::Right)));
    }

    #[test]
    fn test_type_text_escapes_shifted_characters() {
        let (controller, backend) = controller();

        controller.type_text("Hi!").unwrap();
        let events = backend.events.lock().unwrap();
        // 'H': shift down, h down, h up, shift up
        assert!(matches!(
            events[0],
            EventType::KeyPress(rdev::Key::ShiftLeft)
        ));
        assert!(matches!(events[1], EventType::KeyPress(rdev::Key::KeyH)));
        assert!(matches!(events[2], EventType::KeyRelease(rdev::Key::KeyH)));
        assert!(matches!(
            events[3],
            EventType::KeyRelease(rdev::Key::ShiftLeft)
        ));
        // 'i': no shift
        assert!(matches!(events[4], EventType::KeyPress(rdev::Key::KeyI)));
        // '!': shifted digit
        assert!(matches!(
            events[6],
            EventType::KeyPress(rdev::Key::ShiftLeft)
        ));
        assert!(matches!(events[7], EventType::KeyPress(rdev::Key::Num1)));
    }

    #[test]
    fn test_type_text_reports_unsupported_characters() {
        let (controller, _backend) = controller();
        assert!(matches!(
            controller.type_text("ok€"),
            Err(InjectionError::UnsupportedChar('€'))
        ));
    }

    #[test]
    fn test_press_combo_orders_modifiers() {
        let (controller, backend) = controller();

        controller
            .press_combo(&["ctrl".to_string(), "shift".to_string()], "t")
            .unwrap();
        let events = backend.events.lock().unwrap();
        assert!(matches!(
            events[0],
            EventType::KeyPress(rdev::Key::ControlLeft)
        ));
        assert!(matches!(
            events[1],
            EventType::KeyPress(rdev::Key::ShiftLeft)
        ));
        assert!(matches!(events[2], EventType::KeyPress(rdev::Key::KeyT)));
        assert!(matches!(events[3], EventType::KeyRelease(rdev::Key::KeyT)));
        // Released in reverse order
        assert!(matches!(
            events[4],
            EventType::KeyRelease(rdev::Key::ShiftLeft)
        ));
        assert!(matches!(
            events[5],
            EventType::KeyRelease(rdev::Key::ControlLeft)
        ));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let (controller, _backend) = controller();
        assert!(matches!(
            controller.press_key("notakey"),
            Err(InjectionError::UnsupportedKey(_))
        ));
        assert!(matches!(
            controller.press_combo(&["hyper".to_string()], "a"),
            Err(InjectionError::UnsupportedKey(_))
        ));
    }

    #[test]
    fn test_counters_track_outcomes() {
        let (controller, _backend) = controller();

        controller.move_mouse(0.1, 0.1).unwrap();
        assert_eq!(controller.events_injected(), 1);

        // Name resolution fails before dispatch and is not counted
        let _ = controller.press_key("notakey");
        assert_eq!(controller.events_failed(), 0);

        controller.type_text("€").unwrap_err();
        assert_eq!(controller.events_failed(), 1);
    }
}
