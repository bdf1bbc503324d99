//! System-wide key-down interception
//!
//! While enabled, the tap consumes every key-down that classifies to a
//! symbol and hands the symbol to the owner's callback. Chords in the
//! pass-through set, and keys with no name or character, go back to the OS.

mod classify;
mod event_tap;
mod lookup;

use std::sync::Arc;

use thiserror::Error;

use crate::keymap::{KeyCode, ModifierSet};

pub use classify::{classify, DELETE_SYMBOL, ESCAPE_SYMBOL};
pub use event_tap::{EventTap, KeyCallback, TapState};
pub use lookup::HotkeyLookupSet;

#[derive(Debug, Error)]
pub enum TapError {
    #[error("failed to create event tap - check Accessibility permissions")]
    Creation,

    #[error("failed to spawn event tap thread: {0}")]
    ThreadSpawn(String),

    #[error("event tap has been destroyed")]
    Destroyed,
}

/// What the OS should do with an intercepted key-down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapDecision {
    PassThrough,
    Consume,
}

/// Receives key-downs from the OS filter.
///
/// Called on the tap's own thread for every key-down while enabled, so it
/// must not block.
pub trait KeyDownHandler: Send + Sync {
    fn key_down(&self, code: KeyCode, modifiers: ModifierSet) -> TapDecision;
}

/// Installs the OS-level key-down filter
pub trait TapBackend: Send + Sync {
    /// Install a filter feeding `handler`. The filter starts disabled.
    fn install(&self, handler: Arc<dyn KeyDownHandler>) -> Result<Box<dyn TapHandle>, TapError>;
}

/// An installed OS filter. Both methods are called on the UI thread.
pub trait TapHandle: Send {
    fn set_enabled(&self, enabled: bool);

    /// Remove the filter. No callback runs after this returns.
    fn release(self: Box<Self>);
}
