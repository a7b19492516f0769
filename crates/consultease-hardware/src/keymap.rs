//! Key-code to character table for keyboard-emulating card readers.
//!
//! Readers type the card UID as hexadecimal digits followed by Enter. Both
//! the main block and the numeric keypad are recognized because some readers
//! ship configured for keypad output. Letters decode uppercase; the reader
//! never sends Shift for hex output, so modifiers are not tracked.

use crate::types::KeyCode;

/// Meaning of a key code for card decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMeaning {
    /// Appends a character to the pending read.
    Char(char),
    /// Completes the pending read.
    Terminator,
}

/// Decode a key code. `None` for keys that play no part in a card read.
pub fn decode(code: KeyCode) -> Option<KeyMeaning> {
    let ch = match code {
        KeyCode::KEY_0 | KeyCode::KEY_KP0 => '0',
        KeyCode::KEY_1 | KeyCode::KEY_KP1 => '1',
        KeyCode::KEY_2 | KeyCode::KEY_KP2 => '2',
        KeyCode::KEY_3 | KeyCode::KEY_KP3 => '3',
        KeyCode::KEY_4 | KeyCode::KEY_KP4 => '4',
        KeyCode::KEY_5 | KeyCode::KEY_KP5 => '5',
        KeyCode::KEY_6 | KeyCode::KEY_KP6 => '6',
        KeyCode::KEY_7 | KeyCode::KEY_KP7 => '7',
        KeyCode::KEY_8 | KeyCode::KEY_KP8 => '8',
        KeyCode::KEY_9 | KeyCode::KEY_KP9 => '9',
        KeyCode::KEY_A => 'A',
        KeyCode::KEY_B => 'B',
        KeyCode::KEY_C => 'C',
        KeyCode::KEY_D => 'D',
        KeyCode::KEY_E => 'E',
        KeyCode::KEY_F => 'F',
        KeyCode::KEY_ENTER | KeyCode::KEY_KPENTER => return Some(KeyMeaning::Terminator),
        _ => return None,
    };
    Some(KeyMeaning::Char(ch))
}

/// Main-block key code that types `ch` (case-insensitive for letters).
pub fn encode(ch: char) -> Option<KeyCode> {
    let code = match ch.to_ascii_uppercase() {
        '0' => KeyCode::KEY_0,
        '1' => KeyCode::KEY_1,
        '2' => KeyCode::KEY_2,
        '3' => KeyCode::KEY_3,
        '4' => KeyCode::KEY_4,
        '5' => KeyCode::KEY_5,
        '6' => KeyCode::KEY_6,
        '7' => KeyCode::KEY_7,
        '8' => KeyCode::KEY_8,
        '9' => KeyCode::KEY_9,
        'A' => KeyCode::KEY_A,
        'B' => KeyCode::KEY_B,
        'C' => KeyCode::KEY_C,
        'D' => KeyCode::KEY_D,
        'E' => KeyCode::KEY_E,
        'F' => KeyCode::KEY_F,
        _ => return None,
    };
    Some(code)
}
