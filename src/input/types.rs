//! Input types
//!
//! Platform-agnostic representations of the input vocabulary viewers send:
//! mouse buttons, modifier keys, and the canonical key names.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Mouse button identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    /// Left mouse button
    Left,
    /// Right mouse button
    Right,
    /// Middle mouse button (wheel click)
    Middle,
}

impl Default for MouseButton {
    fn default() -> Self {
        MouseButton::Left
    }
}

/// Modifier key identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modifier {
    /// Control key
    Control,
    /// Alt/Option key
    Alt,
    /// Shift key
    Shift,
    /// Meta/Windows/Command key
    Meta,
}

impl Modifier {
    /// Parses a modifier from its wire spelling
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "ctrl" | "control" => Some(Modifier::Control),
            "alt" | "option" => Some(Modifier::Alt),
            "shift" => Some(Modifier::Shift),
            "meta" | "cmd" | "command" | "super" | "win" => Some(Modifier::Meta),
            _ => None,
        }
    }
}

/// Canonical key name
///
/// The fixed vocabulary shared with viewers: named keys, function keys, and
/// literal single characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyName {
    /// Enter/Return key
    Enter,
    /// Tab key
    Tab,
    /// Escape key
    Escape,
    /// Backspace key
    Backspace,
    /// Delete key
    Delete,
    /// Up arrow
    Up,
    /// Down arrow
    Down,
    /// Left arrow
    Left,
    /// Right arrow
    Right,
    /// Home key
    Home,
    /// End key
    End,
    /// Page Up key
    PageUp,
    /// Page Down key
    PageDown,
    /// Space key
    Space,
    /// Function key F1..F12
    Function(u8),
    /// A literal single character
    Char(char),
}

impl KeyName {
    /// Parses a canonical key name
    ///
    /// Accepts the named vocabulary (case-insensitive) plus any literal
    /// single character.
    pub fn parse(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        let key = match lower.as_str() {
            "enter" | "return" => KeyName::Enter,
            "tab" => KeyName::Tab,
            "escape" | "esc" => KeyName::Escape,
            "backspace" => KeyName::Backspace,
            "delete" => KeyName::Delete,
            "up" => KeyName::Up,
            "down" => KeyName::Down,
            "left" => KeyName::Left,
            "right" => KeyName::Right,
            "home" => KeyName::Home,
            "end" => KeyName::End,
            "pageup" => KeyName::PageUp,
            "pagedown" => KeyName::PageDown,
            "space" => KeyName::Space,
            _ => {
                if let Some(n) = lower.strip_prefix('f') {
                    if let Ok(n) = n.parse::<u8>() {
                        if (1..=12).contains(&n) {
                            return Some(KeyName::Function(n));
                        }
                    }
                }
                let mut chars = name.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => KeyName::Char(c),
                    _ => return None,
                }
            }
        };
        Some(key)
    }
}

impl fmt::Display for KeyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyName::Enter => write!(f, "enter"),
            KeyName::Tab => write!(f, "tab"),
            KeyName::Escape => write!(f, "escape"),
            KeyName::Backspace => write!(f, "backspace"),
            KeyName::Delete => write!(f, "delete"),
            KeyName::Up => write!(f, "up"),
            KeyName::Down => write!(f, "down"),
            KeyName::Left => write!(f, "left"),
            KeyName::Right => write!(f, "right"),
            KeyName::Home => write!(f, "home"),
            KeyName::End => write!(f, "end"),
            KeyName::PageUp => write!(f, "pageup"),
            KeyName::PageDown => write!(f, "pagedown"),
            KeyName::Space => write!(f, "space"),
            KeyName::Function(n) => write!(f, "f{}", n),
            KeyName::Char(c) => write!(f, "{}", c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_named_keys() {
        assert_eq!(KeyName::parse("enter"), Some(KeyName::Enter));
        assert_eq!(KeyName::parse("Enter"), Some(KeyName::Enter));
        assert_eq!(KeyName::parse("pageup"), Some(KeyName::PageUp));
        assert_eq!(KeyName::parse("space"), Some(KeyName::Space));
    }

    #[test]
    fn test_parse_function_keys() {
        assert_eq!(KeyName::parse("f1"), Some(KeyName::Function(1)));
        assert_eq!(KeyName::parse("F12"), Some(KeyName::Function(12)));
        assert_eq!(KeyName::parse("f13"), None);
        assert_eq!(KeyName::parse("f0"), None);
    }

    #[test]
    fn test_parse_literal_characters() {
        assert_eq!(KeyName::parse("a"), Some(KeyName::Char('a')));
        assert_eq!(KeyName::parse("Z"), Some(KeyName::Char('Z')));
        assert_eq!(KeyName::parse("/"), Some(KeyName::Char('/')));
        // "f" alone is a character, not a function key
        assert_eq!(KeyName::parse("f"), Some(KeyName::Char('f')));
    }

    #[test]
    fn test_parse_rejects_unknown_names() {
        assert_eq!(KeyName::parse("notakey"), None);
        assert_eq!(KeyName::parse(""), None);
    }

    #[test]
    fn test_modifier_parse() {
        assert_eq!(Modifier::parse("ctrl"), Some(Modifier::Control));
        assert_eq!(Modifier::parse("Control"), Some(Modifier::Control));
        assert_eq!(Modifier::parse("cmd"), Some(Modifier::Meta));
        assert_eq!(Modifier::parse("shift"), Some(Modifier::Shift));
        assert_eq!(Modifier::parse("hyper"), None);
    }

    #[test]
    fn test_key_name_display_roundtrip() {
        for name in [
            "enter", "tab", "escape", "backspace", "delete", "up", "down", "left", "right",
            "home", "end", "pageup", "pagedown", "space", "f1", "f12", "a", "9",
        ] {
            let key = KeyName::parse(name).unwrap();
            assert_eq!(KeyName::parse(&key.to_string()), Some(key));
        }
    }
}
