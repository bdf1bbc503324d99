//! Turning an intercepted key-down into a symbolic key name
//!
//! Priority order:
//! 1. Command/Option/Control chords become `Mod+...+Name`
//! 2. Shift-only chords become `Shift+Name`
//! 3. Delete and Escape become `delete` / `escape`
//! 4. Navigation keys are delivered by name
//! 5. Everything else is the character the live layout produces

use crate::keymap::{KeyCode, KeymapTranslator, ModifierSet};

/// Symbol delivered for the Delete/Backspace key
pub const DELETE_SYMBOL: &str = "delete";

/// Symbol delivered for the Escape key
pub const ESCAPE_SYMBOL: &str = "escape";

/// Symbolic name for a key-down, or `None` if the key is not ours.
///
/// Never waits on the UI thread: before the first keymap build lands the
/// reference tables answer.
pub fn classify(translator: &KeymapTranslator, code: KeyCode, modifiers: ModifierSet) -> Option<String> {
    let snapshot = translator.try_snapshot();
    let chord = modifiers.chord();

    if chord.has_command_like() || chord.is_shift_only() {
        if let Some(name) = snapshot.name_for(code) {
            return Some(format!("{}{}", chord.prefix(), name));
        }
    }

    match code {
        KeyCode::DELETE => Some(DELETE_SYMBOL.to_owned()),
        KeyCode::ESCAPE => Some(ESCAPE_SYMBOL.to_owned()),
        code if code.is_navigation() => snapshot.name_for(code).map(str::to_owned),
        code => translator.character_in(&snapshot, code, modifiers),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::runtime::Handle;

    use crate::keymap::REFERENCE_LAYOUT;
    use crate::platform::testing::{MapLayout, StalledMainThread, SwitchableLayouts};
    use crate::platform::InlineMainThread;
    use crate::scheduler::Scheduler;

    fn translator(source: Arc<SwitchableLayouts>) -> Arc<KeymapTranslator> {
        let scheduler = Scheduler::new(Handle::current(), Arc::new(InlineMainThread));
        KeymapTranslator::new(source, &scheduler, Duration::from_millis(120), Duration::from_secs(1))
    }

    const K: KeyCode = KeyCode(40);

    #[tokio::test]
    async fn test_command_chord_is_named() {
        let translator = translator(SwitchableLayouts::empty());
        assert_eq!(classify(&translator, K, ModifierSet::COMMAND).as_deref(), Some("Cmd+K"));
        assert_eq!(
            classify(&translator, K, ModifierSet::CONTROL | ModifierSet::OPTION | ModifierSet::COMMAND).as_deref(),
            Some("Cmd+Alt+Ctrl+K")
        );
    }

    #[tokio::test]
    async fn test_shift_chord_is_named_not_uppercased() {
        let translator = translator(SwitchableLayouts::empty());
        assert_eq!(classify(&translator, K, ModifierSet::SHIFT).as_deref(), Some("Shift+K"));
        // Caps lock alone is lock state, not a chord
        assert_eq!(classify(&translator, K, ModifierSet::CAPS_LOCK).as_deref(), Some("K"));
    }

    #[tokio::test]
    async fn test_modifier_chords_on_special_keys() {
        let translator = translator(SwitchableLayouts::empty());
        assert_eq!(
            classify(&translator, KeyCode::SPACE, ModifierSet::COMMAND | ModifierSet::SHIFT).as_deref(),
            Some("Cmd+Shift+Space")
        );
        assert_eq!(
            classify(&translator, KeyCode::DELETE, ModifierSet::SHIFT).as_deref(),
            Some("Shift+Delete")
        );
    }

    #[tokio::test]
    async fn test_fixed_symbols() {
        let translator = translator(SwitchableLayouts::empty());
        assert_eq!(classify(&translator, KeyCode::DELETE, ModifierSet::empty()).as_deref(), Some("delete"));
        assert_eq!(classify(&translator, KeyCode::ESCAPE, ModifierSet::empty()).as_deref(), Some("escape"));
        assert_eq!(classify(&translator, KeyCode::PAGE_UP, ModifierSet::empty()).as_deref(), Some("PageUp"));
        assert_eq!(classify(&translator, KeyCode::LEFT, ModifierSet::CAPS_LOCK).as_deref(), Some("Left"));
    }

    #[tokio::test]
    async fn test_plain_keys_use_live_layout() {
        let translator = translator(SwitchableLayouts::with(MapLayout::azerty()));
        assert_eq!(classify(&translator, KeyCode(12), ModifierSet::empty()).as_deref(), Some("a"));
        assert_eq!(classify(&translator, KeyCode::SPACE, ModifierSet::empty()).as_deref(), Some(" "));
    }

    #[tokio::test]
    async fn test_unknown_key_is_not_ours() {
        let translator = translator(SwitchableLayouts::empty());
        // Right-hand Command: no name, no character
        assert_eq!(classify(&translator, KeyCode(54), ModifierSet::empty()), None);
        assert_eq!(classify(&translator, KeyCode(54), ModifierSet::COMMAND), None);
    }

    #[tokio::test]
    async fn test_missing_layout_matches_reference_table() {
        let translator = translator(SwitchableLayouts::empty());
        for key in REFERENCE_LAYOUT {
            assert_eq!(
                classify(&translator, key.code, ModifierSet::empty()).as_deref(),
                Some(key.chars[0])
            );
            assert_eq!(
                classify(&translator, key.code, ModifierSet::CAPS_LOCK).as_deref(),
                Some(key.chars[2])
            );
            assert_eq!(
                classify(&translator, key.code, ModifierSet::SHIFT),
                Some(format!("Shift+{}", key.name))
            );
        }
    }

    #[tokio::test]
    async fn test_function_keys_pass_through_with_live_layout() {
        // UCKeyTranslate reports U+0010 for the function row
        let layout = MapLayout::azerty().with(KeyCode(96), ModifierSet::empty(), "\u{10}");
        let translator = translator(SwitchableLayouts::with(layout));
        assert_eq!(classify(&translator, KeyCode(96), ModifierSet::empty()), None);
        assert_eq!(classify(&translator, KeyCode(96), ModifierSet::COMMAND).as_deref(), Some("Cmd+F5"));
    }

    #[test]
    fn test_first_key_does_not_wait_for_ui_thread() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let main = Arc::new(StalledMainThread::default());
        let scheduler = Scheduler::new(runtime.handle().clone(), Arc::clone(&main) as _);
        let translator = KeymapTranslator::new(
            SwitchableLayouts::with(MapLayout::azerty()),
            &scheduler,
            Duration::from_millis(120),
            Duration::from_secs(2),
        );

        let tap_thread = {
            let translator = Arc::clone(&translator);
            std::thread::spawn(move || {
                let started = std::time::Instant::now();
                let symbol = classify(&translator, K, ModifierSet::empty());
                (started.elapsed(), symbol)
            })
        };
        let (elapsed, symbol) = tap_thread.join().unwrap();
        assert!(elapsed < Duration::from_millis(500), "classify took {elapsed:?}");
        assert_eq!(symbol.as_deref(), Some("k"));

        // The build waits for the UI thread and lands on its next turn
        assert_eq!(main.queued(), 1);
        main.drain();
        assert_eq!(classify(&translator, KeyCode(12), ModifierSet::empty()).as_deref(), Some("a"));
    }
}
