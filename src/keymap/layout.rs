//! Layout engine abstraction
//!
//! The OS layout engine turns a key code plus modifier state into the text
//! the active keyboard layout produces. The translator only sees it through
//! these traits; the macOS implementation wraps `UCKeyTranslate`.

use std::fmt;
use std::sync::Arc;

use super::codes::KeyCode;
use super::modifiers::ModifierSet;

/// One keyboard layout resource, valid for a single layout generation
pub trait LayoutEngine: Send + Sync {
    /// Text produced by `code` under `modifiers`, or `None` if the engine
    /// yields nothing printable
    fn translate(&self, code: KeyCode, modifiers: ModifierSet) -> Option<String>;

    /// Human-readable identifier, for logging
    fn id(&self) -> &str {
        "layout"
    }
}

impl fmt::Debug for dyn LayoutEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayoutEngine").field("id", &self.id()).finish()
    }
}

/// Provider of the currently selected keyboard layout
pub trait LayoutSource: Send + Sync {
    /// The active layout, or `None` when there is no input source or the
    /// source carries no layout data (common for CJK input methods)
    fn current(&self) -> Option<Arc<dyn LayoutEngine>>;
}

/// Keep only text a user could type: drops empty output and control
/// characters such as the ones keypad Enter or Clear translate to
pub fn printable(text: String) -> Option<String> {
    if text.is_empty() || text.chars().any(char::is_control) {
        None
    } else {
        Some(text)
    }
}
