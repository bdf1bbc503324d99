//! Physical key codes and the layout-independent tables
//!
//! Key codes are the macOS virtual key positions (`kVK_*`), which name a
//! physical key regardless of the active keyboard layout. Two static tables
//! live here:
//! - the special-key table (space, return, escape, navigation, function
//!   keys), which never consults the layout engine
//! - the reference US-QWERTY table, used whenever the live layout cannot
//!   resolve a key

use std::fmt;

use serde::{Deserialize, Serialize};

/// Layout-independent physical key identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyCode(pub u16);

impl KeyCode {
    pub const RETURN: KeyCode = KeyCode(36);
    pub const TAB: KeyCode = KeyCode(48);
    pub const SPACE: KeyCode = KeyCode(49);
    pub const DELETE: KeyCode = KeyCode(51);
    pub const ESCAPE: KeyCode = KeyCode(53);
    pub const KEYPAD_CLEAR: KeyCode = KeyCode(71);
    pub const KEYPAD_ENTER: KeyCode = KeyCode(76);
    pub const HOME: KeyCode = KeyCode(115);
    pub const PAGE_UP: KeyCode = KeyCode(116);
    pub const FORWARD_DELETE: KeyCode = KeyCode(117);
    pub const END: KeyCode = KeyCode(119);
    pub const PAGE_DOWN: KeyCode = KeyCode(121);
    pub const LEFT: KeyCode = KeyCode(123);
    pub const RIGHT: KeyCode = KeyCode(124);
    pub const DOWN: KeyCode = KeyCode(125);
    pub const UP: KeyCode = KeyCode(126);

    /// Raw virtual key code
    pub fn raw(self) -> u16 {
        self.0
    }

    /// Whether this key belongs to the static special-key table
    pub fn is_special(self) -> bool {
        SPECIAL_KEYS.iter().any(|(_, code)| *code == self)
    }

    /// Whether this key is part of the fixed navigation cluster
    pub fn is_navigation(self) -> bool {
        NAVIGATION_KEYS.contains(&self)
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for KeyCode {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

/// Canonical names of the layout-independent keys.
///
/// Every snapshot carries these entries, and `code_to_name` always reports
/// the name listed here for these codes.
pub const SPECIAL_KEYS: &[(&str, KeyCode)] = &[
    ("Space", KeyCode::SPACE),
    ("Return", KeyCode::RETURN),
    ("Escape", KeyCode::ESCAPE),
    ("Tab", KeyCode::TAB),
    ("Delete", KeyCode::DELETE),
    ("ForwardDelete", KeyCode::FORWARD_DELETE),
    ("KeypadEnter", KeyCode::KEYPAD_ENTER),
    ("KeypadClear", KeyCode::KEYPAD_CLEAR),
    ("Left", KeyCode::LEFT),
    ("Right", KeyCode::RIGHT),
    ("Down", KeyCode::DOWN),
    ("Up", KeyCode::UP),
    ("PageUp", KeyCode::PAGE_UP),
    ("PageDown", KeyCode::PAGE_DOWN),
    ("Home", KeyCode::HOME),
    ("End", KeyCode::END),
    ("F1", KeyCode(122)),
    ("F2", KeyCode(120)),
    ("F3", KeyCode(99)),
    ("F4", KeyCode(118)),
    ("F5", KeyCode(96)),
    ("F6", KeyCode(97)),
    ("F7", KeyCode(98)),
    ("F8", KeyCode(100)),
    ("F9", KeyCode(101)),
    ("F10", KeyCode(109)),
    ("F11", KeyCode(103)),
    ("F12", KeyCode(111)),
    ("F13", KeyCode(105)),
    ("F14", KeyCode(107)),
    ("F15", KeyCode(113)),
    ("F16", KeyCode(106)),
    ("F17", KeyCode(64)),
    ("F18", KeyCode(79)),
    ("F19", KeyCode(80)),
    ("F20", KeyCode(90)),
];

/// Alternate spellings that resolve to a special key but never win
/// `code_to_name`.
pub const SPECIAL_ALIASES: &[(&str, KeyCode)] = &[
    ("Enter", KeyCode::RETURN),
    ("Backspace", KeyCode::DELETE),
    ("Esc", KeyCode::ESCAPE),
];

/// Keys delivered by name rather than by character
pub const NAVIGATION_KEYS: [KeyCode; 8] = [
    KeyCode::UP,
    KeyCode::DOWN,
    KeyCode::LEFT,
    KeyCode::RIGHT,
    KeyCode::PAGE_UP,
    KeyCode::PAGE_DOWN,
    KeyCode::HOME,
    KeyCode::END,
];

/// Canonical special-key name for a code, if it has one
pub fn special_name(code: KeyCode) -> Option<&'static str> {
    SPECIAL_KEYS
        .iter()
        .find(|(_, c)| *c == code)
        .map(|(name, _)| *name)
}

/// Text typed by special keys that produce characters, used when no layout
/// engine can be asked
pub fn special_char(code: KeyCode) -> Option<&'static str> {
    match code {
        KeyCode::SPACE => Some(" "),
        KeyCode::RETURN => Some("\r"),
        KeyCode::TAB => Some("\t"),
        _ => None,
    }
}

/// One row of the reference US-QWERTY layout.
///
/// `chars` is indexed by [`CharCombo`](super::CharCombo): none, shift,
/// caps-lock, shift+caps-lock.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceKey {
    pub code: KeyCode,
    pub name: &'static str,
    pub chars: [&'static str; 4],
}

const fn letter(code: u16, name: &'static str, lower: &'static str) -> ReferenceKey {
    ReferenceKey {
        code: KeyCode(code),
        name,
        chars: [lower, name, name, name],
    }
}

const fn symbol(code: u16, plain: &'static str, shifted: &'static str) -> ReferenceKey {
    ReferenceKey {
        code: KeyCode(code),
        name: plain,
        chars: [plain, shifted, plain, shifted],
    }
}

const fn keypad(code: u16, ch: &'static str) -> ReferenceKey {
    ReferenceKey {
        code: KeyCode(code),
        name: ch,
        chars: [ch, ch, ch, ch],
    }
}

/// Embedded US-QWERTY table, ordered by ascending key code
pub const REFERENCE_LAYOUT: &[ReferenceKey] = &[
    letter(0, "A", "a"),
    letter(1, "S", "s"),
    letter(2, "D", "d"),
    letter(3, "F", "f"),
    letter(4, "H", "h"),
    letter(5, "G", "g"),
    letter(6, "Z", "z"),
    letter(7, "X", "x"),
    letter(8, "C", "c"),
    letter(9, "V", "v"),
    symbol(10, "§", "±"),
    letter(11, "B", "b"),
    letter(12, "Q", "q"),
    letter(13, "W", "w"),
    letter(14, "E", "e"),
    letter(15, "R", "r"),
    letter(16, "Y", "y"),
    letter(17, "T", "t"),
    symbol(18, "1", "!"),
    symbol(19, "2", "@"),
    symbol(20, "3", "#"),
    symbol(21, "4", "$"),
    symbol(22, "6", "^"),
    symbol(23, "5", "%"),
    symbol(24, "=", "+"),
    symbol(25, "9", "("),
    symbol(26, "7", "&"),
    symbol(27, "-", "_"),
    symbol(28, "8", "*"),
    symbol(29, "0", ")"),
    symbol(30, "]", "}"),
    letter(31, "O", "o"),
    letter(32, "U", "u"),
    symbol(33, "[", "{"),
    letter(34, "I", "i"),
    letter(35, "P", "p"),
    letter(37, "L", "l"),
    letter(38, "J", "j"),
    symbol(39, "'", "\""),
    letter(40, "K", "k"),
    symbol(41, ";", ":"),
    symbol(42, "\\", "|"),
    symbol(43, ",", "<"),
    symbol(44, "/", "?"),
    letter(45, "N", "n"),
    letter(46, "M", "m"),
    symbol(47, ".", ">"),
    symbol(50, "`", "~"),
    keypad(65, "."),
    keypad(67, "*"),
    keypad(69, "+"),
    keypad(75, "/"),
    keypad(78, "-"),
    keypad(81, "="),
    keypad(82, "0"),
    keypad(83, "1"),
    keypad(84, "2"),
    keypad(85, "3"),
    keypad(86, "4"),
    keypad(87, "5"),
    keypad(88, "6"),
    keypad(89, "7"),
    keypad(91, "8"),
    keypad(92, "9"),
];

/// Highest printable key position, the JIS keypad comma
pub const MAX_PRINTABLE_KEYCODE: u16 = 0x5F;

/// Modifier and volume keys inside the printable range
const NON_PRINTABLE: [u16; 13] = [54, 55, 56, 57, 58, 59, 60, 61, 62, 63, 72, 73, 74];

/// Key codes scanned through the layout engine on every rebuild.
///
/// Every position from 0 through [`MAX_PRINTABLE_KEYCODE`] except the
/// special keys and the modifier and volume keys. Positions neither the
/// layout nor the reference table can resolve are skipped by the scan.
pub fn printable_keycodes() -> impl Iterator<Item = KeyCode> {
    (0..=MAX_PRINTABLE_KEYCODE)
        .filter(|raw| !NON_PRINTABLE.contains(raw))
        .map(KeyCode)
        .filter(|code| !code.is_special())
}

/// Reference table row for a key code
pub fn reference_key(code: KeyCode) -> Option<&'static ReferenceKey> {
    REFERENCE_LAYOUT
        .binary_search_by_key(&code, |key| key.code)
        .ok()
        .map(|index| &REFERENCE_LAYOUT[index])
}
