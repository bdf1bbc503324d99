//! Modifier sets and chord keys
//!
//! A [`ModifierSet`] is the bitset of held modifiers. Combined with a
//! [`KeyCode`] it forms a [`ChordKey`], the unit hotkeys are matched on.

use std::fmt;

use bitflags::bitflags;

use super::codes::{reference_key, special_name, KeyCode};

bitflags! {
    /// Modifier keys held while a key is pressed.
    ///
    /// The low four bits are the chord modifiers and match the packing used
    /// by the hotkey lookup set. `CAPS_LOCK` is lock state: it only
    /// influences character translation and is dropped from chords.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ModifierSet: u8 {
        const COMMAND = 1 << 0;
        const SHIFT = 1 << 1;
        const OPTION = 1 << 2;
        const CONTROL = 1 << 3;
        const CAPS_LOCK = 1 << 4;
    }
}

/// Display order and labels for compound key names
const LABELS: [(ModifierSet, &str); 4] = [
    (ModifierSet::COMMAND, "Cmd"),
    (ModifierSet::SHIFT, "Shift"),
    (ModifierSet::OPTION, "Alt"),
    (ModifierSet::CONTROL, "Ctrl"),
];

impl ModifierSet {
    /// The four chord modifiers
    pub const CHORD: ModifierSet = ModifierSet::COMMAND
        .union(ModifierSet::SHIFT)
        .union(ModifierSet::OPTION)
        .union(ModifierSet::CONTROL);

    /// Modifiers that turn a keystroke into a named command chord
    pub const COMMAND_LIKE: ModifierSet = ModifierSet::COMMAND
        .union(ModifierSet::OPTION)
        .union(ModifierSet::CONTROL);

    /// Drop lock state, keeping only chord modifiers
    pub fn chord(self) -> ModifierSet {
        self & Self::CHORD
    }

    /// Any of Command, Option or Control is held
    pub fn has_command_like(self) -> bool {
        self.intersects(Self::COMMAND_LIKE)
    }

    /// Shift is the only chord modifier held
    pub fn is_shift_only(self) -> bool {
        self.chord() == Self::SHIFT
    }

    /// The cached character combination for these modifiers.
    ///
    /// Returns `None` when a command-like modifier is held; those
    /// combinations are never pre-resolved.
    pub fn char_combo(self) -> Option<CharCombo> {
        if self.has_command_like() {
            return None;
        }
        let shift = self.contains(Self::SHIFT);
        let caps = self.contains(Self::CAPS_LOCK);
        Some(match (shift, caps) {
            (false, false) => CharCombo::Plain,
            (true, false) => CharCombo::Shift,
            (false, true) => CharCombo::CapsLock,
            (true, true) => CharCombo::ShiftCapsLock,
        })
    }

    /// Parse a single modifier token.
    ///
    /// Matching is case-sensitive against the fixed vocabulary
    /// Cmd/Command, Shift, Alt/Option, Ctrl/Control.
    pub fn from_token(token: &str) -> Option<ModifierSet> {
        match token {
            "Cmd" | "Command" => Some(Self::COMMAND),
            "Shift" => Some(Self::SHIFT),
            "Alt" | "Option" => Some(Self::OPTION),
            "Ctrl" | "Control" => Some(Self::CONTROL),
            _ => None,
        }
    }

    /// Chord modifiers as `Cmd+Shift+` style prefix, in display order
    pub fn prefix(self) -> String {
        LABELS
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .fold(String::new(), |mut out, (_, label)| {
                out.push_str(label);
                out.push('+');
                out
            })
    }

    /// Build a modifier set from raw CGEventFlags
    #[cfg(target_os = "macos")]
    pub fn from_event_flags(flags: core_graphics::event::CGEventFlags) -> Self {
        use core_graphics::event::CGEventFlags;

        let mut set = ModifierSet::empty();
        set.set(Self::COMMAND, flags.contains(CGEventFlags::CGEventFlagCommand));
        set.set(Self::SHIFT, flags.contains(CGEventFlags::CGEventFlagShift));
        set.set(Self::OPTION, flags.contains(CGEventFlags::CGEventFlagAlternate));
        set.set(Self::CONTROL, flags.contains(CGEventFlags::CGEventFlagControl));
        set.set(Self::CAPS_LOCK, flags.contains(CGEventFlags::CGEventFlagAlphaShift));
        set
    }
}

/// The four pre-resolved (Shift x CapsLock) combinations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharCombo {
    Plain = 0,
    Shift = 1,
    CapsLock = 2,
    ShiftCapsLock = 3,
}

impl CharCombo {
    pub const ALL: [CharCombo; 4] = [
        CharCombo::Plain,
        CharCombo::Shift,
        CharCombo::CapsLock,
        CharCombo::ShiftCapsLock,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Modifier set that produces this combination
    pub fn modifiers(self) -> ModifierSet {
        match self {
            CharCombo::Plain => ModifierSet::empty(),
            CharCombo::Shift => ModifierSet::SHIFT,
            CharCombo::CapsLock => ModifierSet::CAPS_LOCK,
            CharCombo::ShiftCapsLock => ModifierSet::SHIFT | ModifierSet::CAPS_LOCK,
        }
    }
}

/// A key plus its chord modifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChordKey {
    pub code: KeyCode,
    pub modifiers: ModifierSet,
}

impl ChordKey {
    /// Lock state in `modifiers` is discarded
    pub fn new(code: KeyCode, modifiers: ModifierSet) -> Self {
        Self {
            code,
            modifiers: modifiers.chord(),
        }
    }

    /// Pack into `keycode << 4 | modifier bits` for set membership
    pub fn packed(self) -> u32 {
        (u32::from(self.code.raw()) << 4) | u32::from(self.modifiers.chord().bits())
    }
}

impl fmt::Display for ChordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.modifiers.prefix())?;
        // Reference names: formatting must not depend on the live layout
        match special_name(self.code).or_else(|| reference_key(self.code).map(|key| key.name)) {
            Some(name) => f.write_str(name),
            None => write!(f, "#{}", self.code),
        }
    }
}
