//! Keyboard layouts from the Text Input Sources API

use std::ffi::c_void;
use std::sync::Arc;

use core_foundation::base::{CFType, TCFType};
use core_foundation::data::{CFData, CFDataRef};
use core_foundation::string::{CFString, CFStringRef};
use tracing::debug;

use super::carbon_modifiers;
use super::ffi::{
    kTISPropertyInputSourceID, kTISPropertyUnicodeKeyLayoutData, LMGetKbdType,
    TISCopyCurrentKeyboardLayoutInputSource, TISGetInputSourceProperty, UCKeyTranslate,
    UC_KEY_ACTION_DOWN, UC_KEY_TRANSLATE_NO_DEAD_KEYS,
};
use crate::keymap::{printable, KeyCode, LayoutEngine, LayoutSource, ModifierSet};

/// The currently selected keyboard input source. Query on the main thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct TisLayoutSource;

impl LayoutSource for TisLayoutSource {
    fn current(&self) -> Option<Arc<dyn LayoutEngine>> {
        UnicodeLayout::current().map(|layout| Arc::new(layout) as Arc<dyn LayoutEngine>)
    }
}

/// A retained `uchr` layout resource
struct UnicodeLayout {
    data: CFData,
    id: String,
    keyboard_type: u32,
}

// The layout bytes are immutable and retained for the engine's lifetime,
// and UCKeyTranslate keeps no state between calls with dead keys disabled.
unsafe impl Send for UnicodeLayout {}
unsafe impl Sync for UnicodeLayout {}

impl UnicodeLayout {
    fn current() -> Option<Self> {
        unsafe {
            let source = TISCopyCurrentKeyboardLayoutInputSource();
            if source.is_null() {
                debug!("no keyboard input source selected");
                return None;
            }
            // Released when dropped; the layout data is retained separately
            let source = CFType::wrap_under_create_rule(source);

            let id = TISGetInputSourceProperty(source.as_CFTypeRef(), kTISPropertyInputSourceID);
            let id = if id.is_null() {
                "unknown".to_owned()
            } else {
                CFString::wrap_under_get_rule(id as CFStringRef).to_string()
            };

            let data =
                TISGetInputSourceProperty(source.as_CFTypeRef(), kTISPropertyUnicodeKeyLayoutData);
            if data.is_null() {
                debug!(source = %id, "input source has no unicode layout data");
                return None;
            }

            Some(Self {
                data: CFData::wrap_under_get_rule(data as CFDataRef),
                id,
                keyboard_type: u32::from(LMGetKbdType()),
            })
        }
    }
}

impl LayoutEngine for UnicodeLayout {
    fn translate(&self, code: KeyCode, modifiers: ModifierSet) -> Option<String> {
        let mut dead_key_state = 0u32;
        let mut buffer = [0u16; 8];
        let mut length = 0usize;

        let status = unsafe {
            UCKeyTranslate(
                self.data.bytes().as_ptr() as *const c_void,
                code.raw(),
                UC_KEY_ACTION_DOWN,
                (carbon_modifiers(modifiers) >> 8) & 0xFF,
                self.keyboard_type,
                UC_KEY_TRANSLATE_NO_DEAD_KEYS,
                &mut dead_key_state,
                buffer.len(),
                &mut length,
                buffer.as_mut_ptr(),
            )
        };

        if status != 0 || length == 0 {
            return None;
        }
        // Function keys, forward delete and friends translate to control codes
        String::from_utf16(&buffer[..length.min(buffer.len())])
            .ok()
            .and_then(printable)
    }

    fn id(&self) -> &str {
        &self.id
    }
}
