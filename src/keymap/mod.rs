//! Keymap translation
//!
//! Maintains keycode, name and character tables that follow the live
//! keyboard layout, rebuilt whenever the selected input source changes.

mod codes;
mod layout;
mod modifiers;
mod snapshot;
mod translator;

pub use codes::{
    printable_keycodes, reference_key, special_name, KeyCode, ReferenceKey, MAX_PRINTABLE_KEYCODE,
    NAVIGATION_KEYS, REFERENCE_LAYOUT, SPECIAL_ALIASES, SPECIAL_KEYS,
};
pub use layout::{printable, LayoutEngine, LayoutSource};
pub use modifiers::{CharCombo, ChordKey, ModifierSet};
pub use snapshot::KeymapSnapshot;
pub use translator::KeymapTranslator;
