//! Global hotkey bookkeeping
//!
//! One OS dispatch handler fans out to per-binding callbacks by id. The
//! handler is installed with the first registration and removed on cleanup.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use super::parse::parse_hotkey_string;
use super::{DispatchFn, HotkeyBackend, HotkeyError, HotkeyId};
use crate::keymap::{ChordKey, KeyCode, KeymapTranslator, ModifierSet};

/// Invoked when the OS reports a registered hotkey press
pub type HotkeyCallback = Arc<dyn Fn() + Send + Sync>;

struct HotkeyBinding {
    chord: ChordKey,
    callback: HotkeyCallback,
}

type BindingTable = Mutex<HashMap<HotkeyId, HotkeyBinding>>;

/// Owns every OS hotkey registration made by this process
pub struct HotkeyRegistry {
    backend: Arc<dyn HotkeyBackend>,
    translator: Arc<KeymapTranslator>,
    bindings: Arc<BindingTable>,
    dispatch_installed: Mutex<bool>,
    next_id: AtomicU32,
}

impl HotkeyRegistry {
    pub fn new(backend: Arc<dyn HotkeyBackend>, translator: Arc<KeymapTranslator>) -> Self {
        Self {
            backend,
            translator,
            bindings: Arc::new(Mutex::new(HashMap::new())),
            dispatch_installed: Mutex::new(false),
            next_id: AtomicU32::new(1),
        }
    }

    /// Bind `(code, modifiers)` to `id`. Re-registering an id replaces its
    /// previous binding.
    pub fn register<F>(
        &self,
        code: KeyCode,
        modifiers: ModifierSet,
        id: HotkeyId,
        callback: F,
    ) -> Result<(), HotkeyError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.ensure_dispatch()?;

        if self.bindings.lock().remove(&id).is_some() {
            self.backend.unregister(id);
        }

        let chord = ChordKey::new(code, modifiers);
        if let Err(e) = self.backend.register(chord, id) {
            warn!(%chord, %id, "failed to register hotkey: {}", e);
            return Err(e);
        }

        self.bindings.lock().insert(
            id,
            HotkeyBinding {
                chord,
                callback: Arc::new(callback),
            },
        );
        info!(%chord, %id, "registered hotkey");
        Ok(())
    }

    /// Parse `text` and register it under a fresh id
    pub fn bind<F>(&self, text: &str, callback: F) -> Result<HotkeyId, HotkeyError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let chord = parse_hotkey_string(text, &self.translator)
            .ok_or_else(|| HotkeyError::InvalidHotkey(text.to_owned()))?;
        let id = self.fresh_id();
        self.register(chord.code, chord.modifiers, id, callback)?;
        Ok(id)
    }

    pub fn parse(&self, text: &str) -> Option<ChordKey> {
        parse_hotkey_string(text, &self.translator)
    }

    pub fn unregister(&self, id: HotkeyId) {
        let removed = self.bindings.lock().remove(&id);
        if let Some(binding) = removed {
            self.backend.unregister(id);
            debug!(chord = %binding.chord, %id, "unregistered hotkey");
        }
    }

    pub fn unregister_all(&self) {
        let removed: Vec<_> = self.bindings.lock().drain().collect();
        for (id, _) in &removed {
            self.backend.unregister(*id);
        }
        if !removed.is_empty() {
            debug!(count = removed.len(), "unregistered all hotkeys");
        }
    }

    /// Unregister everything and remove the dispatch handler. Call once at
    /// shutdown.
    pub fn cleanup(&self) {
        self.unregister_all();
        let mut installed = self.dispatch_installed.lock();
        if *installed {
            self.backend.remove_dispatch();
            *installed = false;
            info!("hotkey dispatch handler removed");
        }
    }

    pub fn is_registered(&self, id: HotkeyId) -> bool {
        self.bindings.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.bindings.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.lock().is_empty()
    }

    fn ensure_dispatch(&self) -> Result<(), HotkeyError> {
        let mut installed = self.dispatch_installed.lock();
        if *installed {
            return Ok(());
        }

        let table = Arc::downgrade(&self.bindings);
        let dispatch: DispatchFn = Arc::new(move |id| {
            if let Some(table) = table.upgrade() {
                dispatch(&table, id);
            }
        });
        self.backend.install_dispatch(dispatch)?;
        *installed = true;
        debug!("hotkey dispatch handler installed");
        Ok(())
    }

    fn fresh_id(&self) -> HotkeyId {
        loop {
            let id = HotkeyId(self.next_id.fetch_add(1, Ordering::Relaxed));
            if !self.is_registered(id) {
                return id;
            }
        }
    }
}

/// Run the callback bound to `id` without holding the table lock
fn dispatch(table: &BindingTable, id: HotkeyId) {
    let callback = table.lock().get(&id).map(|binding| Arc::clone(&binding.callback));
    match callback {
        Some(callback) => callback(),
        None => trace!(%id, "hotkey press for unknown id"),
    }
}
