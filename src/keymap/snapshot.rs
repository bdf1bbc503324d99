//! Immutable keymap tables for one layout generation
//!
//! A snapshot is built in one pass and never mutated afterwards; a layout
//! change produces a fresh snapshot that replaces the old one wholesale.

use std::collections::HashMap;

use tracing::{debug, trace};

use super::codes::{printable_keycodes, reference_key, KeyCode, SPECIAL_ALIASES, SPECIAL_KEYS};
use super::layout::{printable, LayoutEngine};
use super::modifiers::{CharCombo, ModifierSet};

/// Keycode/name/character tables valid for one keyboard layout
#[derive(Debug, Clone, Default)]
pub struct KeymapSnapshot {
    generation: u64,
    layout_backed: bool,
    name_to_code: HashMap<String, KeyCode>,
    /// Case-folded copy of `name_to_code` for case-insensitive lookups
    folded: HashMap<String, KeyCode>,
    code_to_name: HashMap<KeyCode, String>,
    chars: [HashMap<KeyCode, String>; 4],
}

impl KeymapSnapshot {
    /// Build the tables, consulting `layout` when one is available.
    ///
    /// Without a layout every non-special entry comes from the reference
    /// US-QWERTY table.
    pub fn build(layout: Option<&dyn LayoutEngine>, generation: u64) -> Self {
        let mut snapshot = Self {
            generation,
            layout_backed: layout.is_some(),
            ..Self::default()
        };

        for (name, code) in SPECIAL_KEYS.iter().chain(SPECIAL_ALIASES) {
            snapshot.name_to_code.insert((*name).to_string(), *code);
        }

        // Ascending key order: the first code to produce a name keeps it
        let mut resolved: Vec<(KeyCode, String)> = Vec::new();
        for code in printable_keycodes() {
            let reference = reference_key(code);
            let display = layout
                .and_then(|engine| engine.translate(code, ModifierSet::empty()))
                .and_then(printable)
                .or_else(|| reference.map(|key| key.name.to_string()));

            let Some(display) = display else {
                trace!(%code, "key code unresolved, skipping");
                continue;
            };

            for combo in CharCombo::ALL {
                let ch = layout
                    .and_then(|engine| engine.translate(code, combo.modifiers()))
                    .and_then(printable)
                    .or_else(|| reference.map(|key| key.chars[combo.index()].to_string()));
                if let Some(ch) = ch {
                    snapshot.chars[combo.index()].insert(code, ch);
                }
            }

            resolved.push((code, display.to_uppercase()));
        }

        for (code, name) in resolved {
            snapshot.name_to_code.entry(name.clone()).or_insert(code);
            snapshot.code_to_name.insert(code, name);
        }

        // Special keys always report their canonical name
        for (name, code) in SPECIAL_KEYS {
            snapshot.code_to_name.insert(*code, (*name).to_string());
        }

        for (name, code) in &snapshot.name_to_code {
            snapshot.folded.entry(name.to_lowercase()).or_insert(*code);
        }

        debug!(
            generation,
            layout_backed = snapshot.layout_backed,
            names = snapshot.name_to_code.len(),
            "keymap snapshot built"
        );

        snapshot
    }

    /// Snapshot made purely from the static tables
    pub fn reference(generation: u64) -> Self {
        Self::build(None, generation)
    }

    /// Layout generation this snapshot was built for
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the live layout engine contributed to this snapshot
    pub fn is_layout_backed(&self) -> bool {
        self.layout_backed
    }

    /// Exact name, then uppercased, then case-folded
    pub fn code_for(&self, name: &str) -> Option<KeyCode> {
        self.name_to_code
            .get(name)
            .or_else(|| self.name_to_code.get(&name.to_uppercase()))
            .or_else(|| self.folded.get(&name.to_lowercase()))
            .copied()
    }

    pub fn name_for(&self, code: KeyCode) -> Option<&str> {
        self.code_to_name.get(&code).map(String::as_str)
    }

    /// Pre-resolved character for one of the four cached combinations
    pub fn cached_char(&self, code: KeyCode, combo: CharCombo) -> Option<&str> {
        self.chars[combo.index()].get(&code).map(String::as_str)
    }

    /// All canonical names, for diagnostics
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.name_to_code.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymap::codes::REFERENCE_LAYOUT;
    use crate::platform::testing::MapLayout;

    #[test]
    fn test_reference_snapshot_has_special_keys() {
        let snapshot = KeymapSnapshot::reference(1);
        for (name, code) in SPECIAL_KEYS {
            assert_eq!(snapshot.code_for(name), Some(*code));
            assert_eq!(snapshot.name_for(*code), Some(*name));
        }
        assert!(!snapshot.is_layout_backed());
    }

    #[test]
    fn test_return_wins_over_enter() {
        let snapshot = KeymapSnapshot::reference(1);
        assert_eq!(snapshot.code_for("Enter"), Some(KeyCode::RETURN));
        assert_eq!(snapshot.name_for(KeyCode::RETURN), Some("Return"));
    }

    #[test]
    fn test_case_insensitive_names() {
        let snapshot = KeymapSnapshot::reference(1);
        assert_eq!(snapshot.code_for("a"), Some(KeyCode(0)));
        assert_eq!(snapshot.code_for("space"), Some(KeyCode::SPACE));
        assert_eq!(snapshot.code_for("PAGEDOWN"), Some(KeyCode::PAGE_DOWN));
        assert_eq!(snapshot.code_for("f5"), Some(KeyCode(96)));
    }

    #[test]
    fn test_first_keycode_wins_duplicate_names() {
        // Keypad 1 (83) and the top-row 1 (18) both display "1"
        let snapshot = KeymapSnapshot::reference(1);
        assert_eq!(snapshot.code_for("1"), Some(KeyCode(18)));
        assert_eq!(snapshot.name_for(KeyCode(83)), Some("1"));
    }

    #[test]
    fn test_reference_characters() {
        let snapshot = KeymapSnapshot::reference(1);
        for key in REFERENCE_LAYOUT {
            for combo in CharCombo::ALL {
                assert_eq!(snapshot.cached_char(key.code, combo), Some(key.chars[combo.index()]));
            }
        }
    }

    #[test]
    fn test_layout_overrides_reference() {
        // AZERTY: the key at the Q position types "a"
        let layout = MapLayout::azerty();
        let snapshot = KeymapSnapshot::build(Some(&layout), 2);
        assert!(snapshot.is_layout_backed());
        assert_eq!(snapshot.name_for(KeyCode(12)), Some("A"));
        assert_eq!(snapshot.code_for("A"), Some(KeyCode(12)));
        assert_eq!(snapshot.code_for("Q"), Some(KeyCode(0)));
        assert_eq!(snapshot.cached_char(KeyCode(12), CharCombo::Plain), Some("a"));
        assert_eq!(snapshot.cached_char(KeyCode(12), CharCombo::Shift), Some("A"));
    }

    #[test]
    fn test_engine_gaps_fall_back_per_combination() {
        let layout = MapLayout::new("gaps").with(KeyCode(40), ModifierSet::empty(), "x");
        let snapshot = KeymapSnapshot::build(Some(&layout), 3);
        assert_eq!(snapshot.name_for(KeyCode(40)), Some("X"));
        assert_eq!(snapshot.cached_char(KeyCode(40), CharCombo::Plain), Some("x"));
        // Shift is not in the engine map, so the reference value is used
        assert_eq!(snapshot.cached_char(KeyCode(40), CharCombo::Shift), Some("K"));
        assert_eq!(snapshot.name_for(KeyCode(0)), Some("A"));
    }

    #[test]
    fn test_layout_only_keys_are_named() {
        let yen = KeyCode(93);
        let layout = MapLayout::new("com.apple.keylayout.JIS")
            .with(yen, ModifierSet::empty(), "¥")
            .with(yen, ModifierSet::SHIFT, "|");
        let snapshot = KeymapSnapshot::build(Some(&layout), 4);
        assert_eq!(snapshot.name_for(yen), Some("¥"));
        assert_eq!(snapshot.code_for("¥"), Some(yen));
        assert_eq!(snapshot.cached_char(yen, CharCombo::Shift), Some("|"));
        // Nothing supplies caps lock for this key
        assert_eq!(snapshot.cached_char(yen, CharCombo::CapsLock), None);

        // Unresolved positions are skipped entirely
        let reference = KeymapSnapshot::reference(1);
        assert_eq!(reference.name_for(yen), None);
        assert_eq!(reference.cached_char(yen, CharCombo::Plain), None);
    }
}
