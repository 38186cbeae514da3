//! Input module
//!
//! Converts the platform-agnostic input vocabulary viewers send (normalized
//! coordinates, canonical key names) into host input events through a closed
//! set of platform backends.

pub mod backend;
pub mod control;
pub mod keymap;
pub mod types;

// Re-export commonly used types
pub use backend::{host_backend, InputBackend, MacosBackend, WindowsBackend, X11Backend};
pub use control::InputController;
pub use types::{KeyName, Modifier, MouseButton};
