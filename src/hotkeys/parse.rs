//! Hotkey strings such as `"Cmd+Shift+K"`

use crate::keymap::{ChordKey, KeymapTranslator, ModifierSet};

/// Parse `"Cmd+Shift+K"` style text into a chord.
///
/// Tokens are split on `+` and trimmed. The last token is the key name,
/// resolved through the live keymap, and every earlier token must be a
/// modifier. Returns `None` for empty text, empty tokens, unknown modifiers
/// and unknown key names.
pub fn parse_hotkey_string(text: &str, translator: &KeymapTranslator) -> Option<ChordKey> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let tokens: Vec<&str> = text.split('+').map(str::trim).collect();
    let (key, modifier_tokens) = tokens.split_last()?;
    if key.is_empty() {
        return None;
    }

    let mut modifiers = ModifierSet::empty();
    for token in modifier_tokens {
        modifiers |= ModifierSet::from_token(token)?;
    }

    let code = translator.name_to_code(key)?;
    Some(ChordKey::new(code, modifiers))
}
