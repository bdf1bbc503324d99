//! Pass-through hotkey set
//!
//! Chords in this set belong to someone else (registered or reserved
//! hotkeys) and are returned to the OS untouched.

use std::collections::HashSet;

use tracing::debug;

use crate::hotkeys::parse_hotkey_string;
use crate::keymap::{ChordKey, KeymapTranslator};

/// Packed `(keycode, modifiers)` chords the tap must not consume
#[derive(Debug, Clone, Default)]
pub struct HotkeyLookupSet {
    packed: HashSet<u32>,
}

impl HotkeyLookupSet {
    /// Resolve every hotkey string against the current keymap.
    ///
    /// Strings that do not parse are skipped.
    pub fn build<S: AsRef<str>>(hotkeys: &[S], translator: &KeymapTranslator) -> Self {
        let mut packed = HashSet::with_capacity(hotkeys.len());
        for hotkey in hotkeys {
            let hotkey = hotkey.as_ref();
            match parse_hotkey_string(hotkey, translator) {
                Some(chord) => {
                    packed.insert(chord.packed());
                }
                None => debug!(hotkey, "skipping unparseable pass-through hotkey"),
            }
        }
        Self { packed }
    }

    pub fn contains(&self, chord: ChordKey) -> bool {
        self.packed.contains(&chord.packed())
    }

    pub fn len(&self) -> usize {
        self.packed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packed.is_empty()
    }
}
