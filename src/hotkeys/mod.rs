//! Global hotkeys
//!
//! Hotkeys are registered with the OS by chord, and each registration is
//! keyed by a caller-chosen [`HotkeyId`]. One dispatch handler, installed on
//! first registration, routes OS notifications back to the callbacks.

mod parse;
mod registry;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::keymap::ChordKey;

pub use parse::parse_hotkey_string;
pub use registry::{HotkeyCallback, HotkeyRegistry};

/// Caller-chosen identifier for one registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HotkeyId(pub u32);

impl fmt::Display for HotkeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Routes an OS hotkey notification to its registration
pub type DispatchFn = Arc<dyn Fn(HotkeyId) + Send + Sync>;

#[derive(Debug, Error)]
pub enum HotkeyError {
    #[error("failed to parse hotkey string: {0:?}")]
    InvalidHotkey(String),

    #[error("OS rejected hotkey {hotkey} (status {status})")]
    Rejected { hotkey: String, status: i32 },

    #[error("failed to install hotkey dispatch handler (status {0})")]
    DispatchInstall(i32),

    #[error("UI thread did not respond in time")]
    MainThreadTimeout,
}

/// OS hotkey registration. Implementations do their own hop to the UI
/// thread where the OS requires it.
pub trait HotkeyBackend: Send + Sync {
    fn install_dispatch(&self, dispatch: DispatchFn) -> Result<(), HotkeyError>;

    fn remove_dispatch(&self);

    fn register(&self, chord: ChordKey, id: HotkeyId) -> Result<(), HotkeyError>;

    /// Unknown ids are ignored
    fn unregister(&self, id: HotkeyId);
}
