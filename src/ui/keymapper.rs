//! Key mapping for terminal input
//!
//! Converts key events to the text an xterm would send to the remote side.

use bitflags::bitflags;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

bitflags! {
    /// Modifier keys
    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const CTRL  = 0b0010;
        const ALT   = 0b0100;
    }
}

impl From<KeyModifiers> for Modifiers {
    fn from(mods: KeyModifiers) -> Self {
        let mut result = Modifiers::empty();
        if mods.contains(KeyModifiers::SHIFT) {
            result |= Modifiers::SHIFT;
        }
        if mods.contains(KeyModifiers::CONTROL) {
            result |= Modifiers::CTRL;
        }
        if mods.contains(KeyModifiers::ALT) {
            result |= Modifiers::ALT;
        }
        result
    }
}

/// Key mapper for converting key events to remote input
pub struct KeyMapper;

impl KeyMapper {
    /// Map a key event. `application_cursor` selects `ESC O` over `ESC [`
    /// for cursor and Home/End keys.
    pub fn map(event: &KeyEvent, application_cursor: bool) -> Option<String> {
        let mods = Modifiers::from(event.modifiers);

        match event.code {
            KeyCode::Char(ch) => Some(Self::map_char(ch, mods)),

            KeyCode::Enter => Some("\r".to_string()),

            KeyCode::Backspace => {
                if mods.contains(Modifiers::ALT) {
                    Some("\x1b\x7f".to_string())
                } else {
                    Some("\x7f".to_string())
                }
            }

            KeyCode::Tab => {
                if mods.contains(Modifiers::SHIFT) {
                    Some("\x1b[Z".to_string())
                } else {
                    Some("\t".to_string())
                }
            }
            KeyCode::BackTab => Some("\x1b[Z".to_string()),

            KeyCode::Esc => Some("\x1b".to_string()),

            // Cursor keys
            KeyCode::Up => Some(Self::cursor_key('A', mods, application_cursor)),
            KeyCode::Down => Some(Self::cursor_key('B', mods, application_cursor)),
            KeyCode::Right => Some(Self::cursor_key('C', mods, application_cursor)),
            KeyCode::Left => Some(Self::cursor_key('D', mods, application_cursor)),
            KeyCode::Home => Some(Self::cursor_key('H', mods, application_cursor)),
            KeyCode::End => Some(Self::cursor_key('F', mods, application_cursor)),

            // Editing keys
            KeyCode::PageUp => Some(Self::tilde_key(5, mods)),
            KeyCode::PageDown => Some(Self::tilde_key(6, mods)),
            KeyCode::Insert => Some(Self::tilde_key(2, mods)),
            KeyCode::Delete => Some(Self::tilde_key(3, mods)),

            KeyCode::F(n) => Self::function_key(n, mods),

            _ => None,
        }
    }

    /// Map a character with modifiers
    fn map_char(ch: char, mods: Modifiers) -> String {
        // Ctrl + letter = control character
        if mods.contains(Modifiers::CTRL) && !mods.contains(Modifiers::ALT) {
            if ch.is_ascii_alphabetic() {
                return char::from(ch.to_ascii_lowercase() as u8 - b'a' + 1).to_string();
            }
            match ch {
                '@' | '`' | ' ' => return "\0".to_string(),
                '[' => return "\x1b".to_string(),
                '\\' => return "\x1c".to_string(),
                ']' => return "\x1d".to_string(),
                '^' | '~' => return "\x1e".to_string(),
                '_' | '?' => return "\x1f".to_string(),
                _ => {}
            }
        }

        // Ctrl + Alt + letter
        if mods.contains(Modifiers::CTRL | Modifiers::ALT) && ch.is_ascii_alphabetic() {
            let code = char::from(ch.to_ascii_lowercase() as u8 - b'a' + 1);
            return format!("\x1b{}", code);
        }

        // Alt + key = ESC + key
        if mods.contains(Modifiers::ALT) && !mods.contains(Modifiers::CTRL) {
            return format!("\x1b{}", ch);
        }

        ch.to_string()
    }

    /// Arrow and Home/End keys
    fn cursor_key(key: char, mods: Modifiers, application_cursor: bool) -> String {
        if !mods.is_empty() {
            format!("\x1b[1;{}{}", Self::modifier_code(mods), key)
        } else if application_cursor {
            format!("\x1bO{}", key)
        } else {
            format!("\x1b[{}", key)
        }
    }

    /// Tilde key sequence (PageUp, PageDown, Insert, Delete)
    fn tilde_key(code: u8, mods: Modifiers) -> String {
        if mods.is_empty() {
            format!("\x1b[{}~", code)
        } else {
            format!("\x1b[{};{}~", code, Self::modifier_code(mods))
        }
    }

    /// Function key sequence
    fn function_key(n: u8, mods: Modifiers) -> Option<String> {
        let sequence = match n {
            1..=4 => {
                let key = char::from(b'P' + n - 1);
                if mods.is_empty() {
                    format!("\x1bO{}", key)
                } else {
                    format!("\x1b[1;{}{}", Self::modifier_code(mods), key)
                }
            }
            5..=12 => {
                let code = [15, 17, 18, 19, 20, 21, 23, 24][usize::from(n - 5)];
                Self::tilde_key(code, mods)
            }
            _ => return None,
        };
        Some(sequence)
    }

    /// Calculate xterm modifier code
    fn modifier_code(mods: Modifiers) -> u8 {
        1 + if mods.contains(Modifiers::SHIFT) { 1 } else { 0 }
            + if mods.contains(Modifiers::ALT) { 2 } else { 0 }
            + if mods.contains(Modifiers::CTRL) { 4 } else { 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(code: KeyCode, mods: KeyModifiers) -> Option<String> {
        KeyMapper::map(&KeyEvent::new(code, mods), false)
    }

    #[test]
    fn test_char_keys() {
        assert_eq!(map(KeyCode::Char('a'), KeyModifiers::NONE).as_deref(), Some("a"));
        assert_eq!(map(KeyCode::Char('é'), KeyModifiers::NONE).as_deref(), Some("é"));

        // Ctrl+C
        assert_eq!(map(KeyCode::Char('c'), KeyModifiers::CONTROL).as_deref(), Some("\x03"));
        assert_eq!(map(KeyCode::Char('['), KeyModifiers::CONTROL).as_deref(), Some("\x1b"));

        // Alt+x
        assert_eq!(map(KeyCode::Char('x'), KeyModifiers::ALT).as_deref(), Some("\x1bx"));
        assert_eq!(
            map(KeyCode::Char('d'), KeyModifiers::CONTROL | KeyModifiers::ALT).as_deref(),
            Some("\x1b\x04")
        );
    }

    #[test]
    fn test_editing_keys() {
        assert_eq!(map(KeyCode::Enter, KeyModifiers::NONE).as_deref(), Some("\r"));
        assert_eq!(map(KeyCode::Backspace, KeyModifiers::NONE).as_deref(), Some("\x7f"));
        assert_eq!(map(KeyCode::Tab, KeyModifiers::NONE).as_deref(), Some("\t"));
        assert_eq!(map(KeyCode::BackTab, KeyModifiers::SHIFT).as_deref(), Some("\x1b[Z"));
        assert_eq!(map(KeyCode::Delete, KeyModifiers::NONE).as_deref(), Some("\x1b[3~"));
        assert_eq!(map(KeyCode::PageUp, KeyModifiers::NONE).as_deref(), Some("\x1b[5~"));
        assert_eq!(map(KeyCode::PageDown, KeyModifiers::NONE).as_deref(), Some("\x1b[6~"));
        assert_eq!(map(KeyCode::Delete, KeyModifiers::CONTROL).as_deref(), Some("\x1b[3;5~"));
    }

    #[test]
    fn test_cursor_keys_follow_mode() {
        assert_eq!(map(KeyCode::Up, KeyModifiers::NONE).as_deref(), Some("\x1b[A"));
        assert_eq!(map(KeyCode::Home, KeyModifiers::NONE).as_deref(), Some("\x1b[H"));

        let app = |code| KeyMapper::map(&KeyEvent::new(code, KeyModifiers::NONE), true);
        assert_eq!(app(KeyCode::Left).as_deref(), Some("\x1bOD"));
        assert_eq!(app(KeyCode::End).as_deref(), Some("\x1bOF"));

        // With Ctrl
        assert_eq!(map(KeyCode::Up, KeyModifiers::CONTROL).as_deref(), Some("\x1b[1;5A"));
    }

    #[test]
    fn test_function_keys() {
        assert_eq!(map(KeyCode::F(1), KeyModifiers::NONE).as_deref(), Some("\x1bOP"));
        assert_eq!(map(KeyCode::F(4), KeyModifiers::SHIFT).as_deref(), Some("\x1b[1;2S"));
        assert_eq!(map(KeyCode::F(5), KeyModifiers::NONE).as_deref(), Some("\x1b[15~"));
        assert_eq!(map(KeyCode::F(12), KeyModifiers::ALT).as_deref(), Some("\x1b[24;3~"));
        assert_eq!(map(KeyCode::F(13), KeyModifiers::NONE), None);
    }
}
