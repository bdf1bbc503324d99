//! The caller-owned key-down filter
//!
//! [`EventTap`] wraps an OS tap handle; the OS callback only sees the
//! `KeyFilter`. Pass-through hotkeys go straight back to the OS and every
//! other key-down is handed to [`classify`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::classify::classify;
use super::lookup::HotkeyLookupSet;
use super::{KeyDownHandler, TapBackend, TapDecision, TapError, TapHandle};
use crate::keymap::{ChordKey, KeyCode, KeymapTranslator, ModifierSet};
use crate::platform::{run_on_main, MainThread};
use crate::scheduler::{Debounced, Scheduler};

/// Receives every consumed key as its symbol. Runs on the tap thread.
pub type KeyCallback = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapState {
    Created,
    Enabled,
    Disabled,
    Destroyed,
}

/// The part of the tap the OS callback sees
struct KeyFilter {
    translator: Arc<KeymapTranslator>,
    hotkeys: Mutex<Vec<String>>,
    lookup: Mutex<Arc<HotkeyLookupSet>>,
    callback: KeyCallback,
    active: AtomicBool,
}

impl KeyFilter {
    /// Re-resolve the pass-through strings against the current keymap
    fn rebuild_lookup(&self) {
        let hotkeys = self.hotkeys.lock();
        let lookup = Arc::new(HotkeyLookupSet::build(&hotkeys, &self.translator));
        debug!(
            requested = hotkeys.len(),
            resolved = lookup.len(),
            "rebuilt pass-through hotkey set"
        );
        *self.lookup.lock() = lookup;
    }
}

impl KeyDownHandler for KeyFilter {
    fn key_down(&self, code: KeyCode, modifiers: ModifierSet) -> TapDecision {
        if !self.active.load(Ordering::Acquire) {
            return TapDecision::PassThrough;
        }

        let lookup = Arc::clone(&self.lookup.lock());
        if lookup.contains(ChordKey::new(code, modifiers)) {
            trace!(%code, ?modifiers, "passing through registered hotkey");
            return TapDecision::PassThrough;
        }

        match classify(&self.translator, code, modifiers) {
            Some(symbol) => {
                (self.callback)(&symbol);
                TapDecision::Consume
            }
            None => TapDecision::PassThrough,
        }
    }
}

/// A system-wide key-down filter owned by the caller.
///
/// Created disabled. `enable` and `disable` share one debounce slot, so
/// the last request in a burst is the one applied.
pub struct EventTap {
    filter: Arc<KeyFilter>,
    handle: Arc<Mutex<Option<Box<dyn TapHandle>>>>,
    state: Arc<Mutex<TapState>>,
    toggle: Debounced,
    watcher: CancellationToken,
    main: Arc<dyn MainThread>,
    main_timeout: Duration,
}

impl EventTap {
    pub fn create(
        translator: Arc<KeymapTranslator>,
        scheduler: &Scheduler,
        backend: &dyn TapBackend,
        toggle_debounce: Duration,
        main_timeout: Duration,
        callback: KeyCallback,
    ) -> Result<Self, TapError> {
        // Build the keymap now so the tap thread finds it ready
        translator.snapshot();

        let filter = Arc::new(KeyFilter {
            translator: Arc::clone(&translator),
            hotkeys: Mutex::new(Vec::new()),
            lookup: Mutex::new(Arc::new(HotkeyLookupSet::default())),
            callback,
            active: AtomicBool::new(true),
        });

        let handle = backend
            .install(Arc::clone(&filter) as Arc<dyn KeyDownHandler>)
            .map_err(|e| {
                error!("{}", e);
                e
            })?;

        // Re-resolve pass-through hotkeys whenever the keymap is rebuilt
        let watcher = scheduler.shutdown_token().child_token();
        let mut changes = translator.subscribe();
        let weak = Arc::downgrade(&filter);
        let cancelled = watcher.clone();
        scheduler.runtime().spawn(async move {
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    changed = changes.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let Some(filter) = weak.upgrade() else { break };
                        filter.rebuild_lookup();
                    }
                }
            }
            trace!("pass-through watcher stopped");
        });

        info!("event tap created");

        Ok(Self {
            filter,
            handle: Arc::new(Mutex::new(Some(handle))),
            state: Arc::new(Mutex::new(TapState::Created)),
            toggle: scheduler.debounced("tap-toggle", toggle_debounce),
            watcher,
            main: Arc::clone(scheduler.main_thread()),
            main_timeout,
        })
    }

    /// Replace the pass-through set. Strings that do not parse are skipped.
    pub fn set_hotkeys<S: AsRef<str>>(&self, hotkeys: &[S]) {
        *self.filter.hotkeys.lock() = hotkeys.iter().map(|s| s.as_ref().to_owned()).collect();
        self.filter.rebuild_lookup();
    }

    /// Start consuming keys after the toggle debounce
    pub fn enable(&self) {
        self.request(true);
    }

    /// Stop consuming keys after the toggle debounce
    pub fn disable(&self) {
        self.request(false);
    }

    fn request(&self, enabled: bool) {
        if self.state() == TapState::Destroyed {
            warn!(enabled, "ignoring toggle on destroyed event tap");
            return;
        }

        let handle = Arc::clone(&self.handle);
        let state = Arc::clone(&self.state);
        self.toggle.schedule(move || {
            let mut state = state.lock();
            if *state == TapState::Destroyed {
                return;
            }
            if let Some(handle) = handle.lock().as_ref() {
                handle.set_enabled(enabled);
            }
            *state = if enabled {
                TapState::Enabled
            } else {
                TapState::Disabled
            };
            debug!(state = ?*state, "event tap toggled");
        });
    }

    /// Disable and remove the OS filter.
    ///
    /// Pending toggles are cancelled first. Idempotent.
    pub fn destroy(&self) {
        if self.state() == TapState::Destroyed {
            return;
        }

        self.toggle.cancel();
        self.watcher.cancel();
        self.filter.active.store(false, Ordering::Release);

        let handle = Arc::clone(&self.handle);
        let state = Arc::clone(&self.state);
        let released = run_on_main(
            self.main.as_ref(),
            move || {
                let mut state = state.lock();
                if let Some(handle) = handle.lock().take() {
                    handle.set_enabled(false);
                    handle.release();
                }
                *state = TapState::Destroyed;
            },
            self.main_timeout,
        );

        if released.is_none() {
            warn!("UI thread busy; event tap will be released when it frees up");
            *self.state.lock() = TapState::Destroyed;
        }
        info!("event tap destroyed");
    }

    pub fn state(&self) -> TapState {
        *self.state.lock()
    }

    pub fn is_enabled(&self) -> bool {
        self.state() == TapState::Enabled
    }
}

impl Drop for EventTap {
    fn drop(&mut self) {
        self.destroy();
    }
}
