//! macOS backends: Quartz event taps, Carbon hotkeys, Text Input Sources

pub mod dispatch;
mod ffi;
pub mod hotkeys;
pub mod layout;
pub mod observer;
pub mod tap;

use crate::keymap::ModifierSet;

/// Carbon modifier mask (`cmdKey`, `shiftKey`, ...) for a modifier set
fn carbon_modifiers(modifiers: ModifierSet) -> u32 {
    [
        (ModifierSet::COMMAND, ffi::CMD_KEY),
        (ModifierSet::SHIFT, ffi::SHIFT_KEY),
        (ModifierSet::CAPS_LOCK, ffi::ALPHA_LOCK),
        (ModifierSet::OPTION, ffi::OPTION_KEY),
        (ModifierSet::CONTROL, ffi::CONTROL_KEY),
    ]
    .into_iter()
    .filter(|(flag, _)| modifiers.contains(*flag))
    .fold(0, |mask, (_, bit)| mask | bit)
}
