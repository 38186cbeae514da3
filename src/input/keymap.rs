//! Canonical key resolution
//!
//! Maps the canonical key vocabulary and literal characters onto host key
//! identifiers, including the shift escaping needed to type upper-case
//! letters and shifted punctuation.

use crate::input::types::{KeyName, Modifier};
use rdev::Key;

/// Resolves a canonical key name to a host key
pub fn resolve_key(key: KeyName) -> Option<Key> {
    let resolved = match key {
        KeyName::Enter => Key::Return,
        KeyName::Tab => Key::Tab,
        KeyName::Escape => Key::Escape,
        KeyName::Backspace => Key::Backspace,
        KeyName::Delete => Key::Delete,
        KeyName::Up => Key::UpArrow,
        KeyName::Down => Key::DownArrow,
        KeyName::Left => Key::LeftArrow,
        KeyName::Right => Key::RightArrow,
        KeyName::Home => Key::Home,
        KeyName::End => Key::End,
        KeyName::PageUp => Key::PageUp,
        KeyName::PageDown => Key::PageDown,
        KeyName::Space => Key::Space,
        KeyName::Function(n) => match n {
            1 => Key::F1,
            2 => Key::F2,
            3 => Key::F3,
            4 => Key::F4,
            5 => Key::F5,
            6 => Key::F6,
            7 => Key::F7,
            8 => Key::F8,
            9 => Key::F9,
            10 => Key::F10,
            11 => Key::F11,
            12 => Key::F12,
            _ => return None,
        },
        KeyName::Char(c) => return keystroke_for_char(c).map(|(key, _)| key),
    };
    Some(resolved)
}

/// Resolves a modifier to the host key held while it is active
pub fn resolve_modifier(modifier: Modifier) -> Key {
    match modifier {
        Modifier::Control => Key::ControlLeft,
        Modifier::Alt => Key::Alt,
        Modifier::Shift => Key::ShiftLeft,
        Modifier::Meta => Key::MetaLeft,
    }
}

/// Resolves a character to `(base key, shift required)`
///
/// Returns `None` for characters outside the US-layout typeable set.
pub fn keystroke_for_char(c: char) -> Option<(Key, bool)> {
    // Upper-case letters are the shifted form of their lower-case key
    if c.is_ascii_uppercase() {
        let (key, _) = keystroke_for_char(c.to_ascii_lowercase())?;
        return Some((key, true));
    }

    let stroke = match c {
        'a' => (Key::KeyA, false),
        'b' => (Key::KeyB, false),
        'c' => (Key::KeyC, false),
        'd' => (Key::KeyD, false),
        'e' => (Key::KeyE, false),
        'f' => (Key::KeyF, false),
        'g' => (Key::KeyG, false),
        'h' => (Key::KeyH, false),
        'i' => (Key::KeyI, false),
        'j' => (Key::KeyJ, false),
        'k' => (Key::KeyK, false),
        'l' => (Key::KeyL, false),
        'm' => (Key::KeyM, false),
        'n' => (Key::KeyN, false),
        'o' => (Key::KeyO, false),
        'p' => (Key::KeyP, false),
        'q' => (Key::KeyQ, false),
        'r' => (Key::KeyR, false),
        's' => (Key::KeyS, false),
        't' => (Key::KeyT, false),
        'u' => (Key::KeyU, false),
        'v' => (Key::KeyV, false),
        'w' => (Key::KeyW, false),
        'x' => (Key::KeyX, false),
        'y' => (Key::KeyY, false),
        'z' => (Key::KeyZ, false),
        '0' => (Key::Num0, false),
        '1' => (Key::Num1, false),
        '2' => (Key::Num2, false),
        '3' => (Key::Num3, false),
        '4' => (Key::Num4, false),
        '5' => (Key::Num5, false),
        '6' => (Key::Num6, false),
        '7' => (Key::Num7, false),
        '8' => (Key::Num8, false),
        '9' => (Key::Num9, false),
        ')' => (Key::Num0, true),
        '!' => (Key::Num1, true),
        '@' => (Key::Num2, true),
        '#' => (Key::Num3, true),
        '$' => (Key::Num4, true),
        '%' => (Key::Num5, true),
        '^' => (Key::Num6, true),
        '&' => (Key::Num7, true),
        '*' => (Key::Num8, true),
        '(' => (Key::Num9, true),
        ' ' => (Key::Space, false),
        '-' => (Key::Minus, false),
        '_' => (Key::Minus, true),
        '=' => (Key::Equal, false),
        '+' => (Key::Equal, true),
        '[' => (Key::LeftBracket, false),
        '{' => (Key::LeftBracket, true),
        ']' => (Key::RightBracket, false),
        '}' => (Key::RightBracket, true),
        ';' => (Key::SemiColon, false),
        ':' => (Key::SemiColon, true),
        '\'' => (Key::Quote, false),
        '"' => (Key::Quote, true),
        '\\' => (Key::BackSlash, false),
        '|' => (Key::BackSlash, true),
        ',' => (Key::Comma, false),
        '<' => (Key::Comma, true),
        '.' => (Key::Dot, false),
        '>' => (Key::Dot, true),
        '/' => (Key::Slash, false),
        '?' => (Key::Slash, true),
        '`' => (Key::BackQuote, false),
        '~' => (Key::BackQuote, true),
        '\n' => (Key::Return, false),
        '\t' => (Key::Tab, false),
        _ => return None,
    };
    Some(stroke)
}
