//! keytap: layout-aware global keyboard interception for macOS
//!
//! - [`keymap`]: keycode, name and character translation that follows the
//!   live keyboard layout
//! - [`tap`]: the system-wide key-down filter and its classification rules
//! - [`hotkeys`]: global hotkey registration
//! - [`engine`]: the owned engine tying them together
//!
//! Everything OS-specific sits behind the traits in [`platform`].

pub mod config;
pub mod engine;
pub mod events;
pub mod hotkeys;
pub mod keymap;
pub mod lifecycle;
pub mod platform;
pub mod scheduler;
pub mod tap;

pub use engine::{Engine, EngineSettings};
pub use hotkeys::{HotkeyError, HotkeyId, HotkeyRegistry};
pub use keymap::{ChordKey, KeyCode, KeymapTranslator, ModifierSet};
pub use platform::Platform;
pub use tap::{EventTap, TapError, TapState};
