//! Abstract key codes and their translation to Linux key codes.
//!
//! Layouts store one signed integer per button. Non-negative values are
//! keyboard keys in GLFW numbering; negative values are sentinels for mouse
//! buttons, the soft keyboard, gamepad buttons and analog triggers. Only the
//! keyboard range goes through [`translate`].

use crate::protocol::{GamepadButton, MouseButton, Trigger};
use tracing::warn;

pub const SPECIAL_KEYBOARD: i32 = -1;
pub const MOUSE_LEFT: i32 = -2;
pub const MOUSE_MIDDLE: i32 = -3;
pub const MOUSE_RIGHT: i32 = -4;
pub const SCROLL_UP: i32 = -5;
pub const SCROLL_DOWN: i32 = -6;

/// First gamepad button code; button `i` is `GAMEPAD_BASE - i`
pub const GAMEPAD_BASE: i32 = -100;
/// Last code of the range reserved for gamepad buttons
pub const GAMEPAD_LAST: i32 = -199;
pub const TRIGGER_LEFT: i32 = -200;
pub const TRIGGER_RIGHT: i32 = -201;

/// Commonly used abstract keys (GLFW numbering)
pub mod keys {
    pub const SPACE: i32 = 32;
    pub const NUM_0: i32 = 48;
    pub const NUM_1: i32 = 49;
    pub const A: i32 = 65;
    pub const D: i32 = 68;
    pub const E: i32 = 69;
    pub const Q: i32 = 81;
    pub const S: i32 = 83;
    pub const W: i32 = 87;
    pub const ESCAPE: i32 = 256;
    pub const ENTER: i32 = 257;
    pub const TAB: i32 = 258;
    pub const RIGHT: i32 = 262;
    pub const LEFT: i32 = 263;
    pub const DOWN: i32 = 264;
    pub const UP: i32 = 265;
    pub const F1: i32 = 290;
    pub const F12: i32 = 301;
    pub const LEFT_SHIFT: i32 = 340;
    pub const LEFT_CONTROL: i32 = 341;
    pub const LEFT_ALT: i32 = 342;
}

/// Gamepad sentinel code for a button
pub fn gamepad_code(button: GamepadButton) -> i32 {
    GAMEPAD_BASE - button.index() as i32
}

/// Map an abstract key code to the Linux key code, if known
pub fn lookup(code: i32) -> Option<i32> {
    let linux = match code {
        32 => 57,  // SPACE
        39 => 40,  // APOSTROPHE
        44 => 51,  // COMMA
        45 => 12,  // MINUS
        46 => 52,  // DOT
        47 => 53,  // SLASH
        48 => 11,  // 0
        49..=57 => code - 47, // 1-9
        59 => 39,  // SEMICOLON
        61 => 13,  // EQUAL
        65 => 30,  // A
        66 => 48,
        67 => 46,
        68 => 32,
        69 => 18,
        70 => 33,
        71 => 34,
        72 => 35,
        73 => 23,
        74 => 36,
        75 => 37,
        76 => 38,
        77 => 50,
        78 => 49,
        79 => 24,
        80 => 25,
        81 => 16,
        82 => 19,
        83 => 31,
        84 => 20,
        85 => 22,
        86 => 47,
        87 => 17,
        88 => 45,
        89 => 21,
        90 => 44, // Z
        91 => 26, // LEFTBRACE
        92 => 43, // BACKSLASH
        93 => 27, // RIGHTBRACE
        96 => 41, // GRAVE
        256 => 1,   // ESC
        257 => 28,  // ENTER
        258 => 15,  // TAB
        259 => 14,  // BACKSPACE
        260 => 110, // INSERT
        261 => 111, // DELETE
        262 => 106, // RIGHT
        263 => 105, // LEFT
        264 => 108, // DOWN
        265 => 103, // UP
        266 => 104, // PAGEUP
        267 => 109, // PAGEDOWN
        268 => 102, // HOME
        269 => 107, // END
        280 => 58,  // CAPSLOCK
        281 => 70,  // SCROLLLOCK
        282 => 69,  // NUMLOCK
        283 => 99,  // SYSRQ
        284 => 119, // PAUSE
        290..=299 => code - 231, // F1-F10
        300 => 87,  // F11
        301 => 88,  // F12
        320 => 82,  // KP0
        321 => 79,
        322 => 80,
        323 => 81,
        324 => 75,
        325 => 76,
        326 => 77,
        327 => 71,
        328 => 72,
        329 => 73,  // KP9
        330 => 83,  // KPDOT
        331 => 98,  // KPSLASH
        332 => 55,  // KPASTERISK
        333 => 74,  // KPMINUS
        334 => 78,  // KPPLUS
        335 => 96,  // KPENTER
        336 => 117, // KPEQUAL
        340 => 42,  // LEFTSHIFT
        341 => 29,  // LEFTCTRL
        342 => 56,  // LEFTALT
        343 => 125, // LEFTMETA
        344 => 54,  // RIGHTSHIFT
        345 => 97,  // RIGHTCTRL
        346 => 100, // RIGHTALT
        347 => 126, // RIGHTMETA
        348 => 139, // MENU
        _ => return None,
    };
    Some(linux)
}

/// Translate an abstract key code, passing unknown codes through unchanged
pub fn translate(code: i32) -> i32 {
    match lookup(code) {
        Some(linux) => linux,
        None => {
            warn!("No key mapping for abstract code {}, passing it through", code);
            code
        }
    }
}

/// What a button's key code asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction {
    /// Abstract keyboard key, still untranslated
    Key(i32),
    Mouse(MouseButton),
    OpenKeyboard,
    Gamepad(GamepadButton),
    Trigger(Trigger),
    Unknown(i32),
}
impl ButtonAction {
    pub fn decode(code: i32) -> Self {
        match code {
            c if c >= 0 => ButtonAction::Key(c),
            SPECIAL_KEYBOARD => ButtonAction::OpenKeyboard,
            MOUSE_LEFT => ButtonAction::Mouse(MouseButton::Left),
            MOUSE_MIDDLE => ButtonAction::Mouse(MouseButton::Middle),
            MOUSE_RIGHT => ButtonAction::Mouse(MouseButton::Right),
            SCROLL_UP => ButtonAction::Mouse(MouseButton::WheelUp),
            SCROLL_DOWN => ButtonAction::Mouse(MouseButton::WheelDown),
            TRIGGER_LEFT => ButtonAction::Trigger(Trigger::Left),
            TRIGGER_RIGHT => ButtonAction::Trigger(Trigger::Right),
            c if (GAMEPAD_LAST..=GAMEPAD_BASE).contains(&c) => {
                match GamepadButton::from_index((GAMEPAD_BASE - c) as usize) {
                    Some(button) => ButtonAction::Gamepad(button),
                    None => ButtonAction::Unknown(c),
                }
            }
            c => ButtonAction::Unknown(c),
        }
    }

    /// Whether the action belongs to the gamepad half of the code space
    pub fn is_gamepad(&self) -> bool {
        matches!(self, ButtonAction::Gamepad(_) | ButtonAction::Trigger(_))
    }
}
