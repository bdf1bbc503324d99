//! The owned keyboard engine
//!
//! One `Engine` is constructed at startup and torn down explicitly. It owns
//! the translator, the hotkey registry and every background task, and is
//! the factory for event taps.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::{info, warn};

use crate::hotkeys::HotkeyRegistry;
use crate::keymap::KeymapTranslator;
use crate::platform::Platform;
use crate::scheduler::Scheduler;
use crate::tap::{EventTap, TapError};

/// Timing knobs, normally taken from the config file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Quiet period after a layout-change notification before rebuilding
    pub rebuild_debounce: Duration,
    /// Quiet period before an enable/disable request reaches the OS
    pub toggle_debounce: Duration,
    /// Longest a background caller waits on the UI thread
    pub main_thread_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            rebuild_debounce: Duration::from_millis(120),
            toggle_debounce: Duration::from_millis(150),
            main_thread_timeout: Duration::from_secs(2),
        }
    }
}

pub struct Engine {
    platform: Platform,
    scheduler: Scheduler,
    translator: Arc<KeymapTranslator>,
    hotkeys: HotkeyRegistry,
    settings: EngineSettings,
}

impl Engine {
    /// Wire the engine to `platform` and start listening for layout changes.
    ///
    /// The keymap itself is built on first use.
    pub fn init(platform: Platform, runtime: Handle, settings: EngineSettings) -> Self {
        let scheduler = Scheduler::new(runtime, Arc::clone(&platform.main));
        let translator = KeymapTranslator::new(
            Arc::clone(&platform.layouts),
            &scheduler,
            settings.rebuild_debounce,
            settings.main_thread_timeout,
        );

        let weak = Arc::downgrade(&translator);
        let watching = platform.layout_watcher.start(Arc::new(move || {
            if let Some(translator) = weak.upgrade() {
                translator.layout_changed();
            }
        }));
        if let Err(e) = watching {
            warn!("layout change notifications unavailable, keymap will not follow layout switches: {:#}", e);
        }

        let hotkeys = HotkeyRegistry::new(Arc::clone(&platform.hotkeys), Arc::clone(&translator));

        info!(?settings, "keyboard engine initialized");

        Self {
            platform,
            scheduler,
            translator,
            hotkeys,
            settings,
        }
    }

    pub fn translator(&self) -> &Arc<KeymapTranslator> {
        &self.translator
    }

    pub fn hotkeys(&self) -> &HotkeyRegistry {
        &self.hotkeys
    }

    pub fn settings(&self) -> EngineSettings {
        self.settings
    }

    /// Install a new event tap delivering symbols to `callback`
    pub fn create_event_tap<F>(&self, callback: F) -> Result<EventTap, TapError>
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        EventTap::create(
            Arc::clone(&self.translator),
            &self.scheduler,
            self.platform.tap.as_ref(),
            self.settings.toggle_debounce,
            self.settings.main_thread_timeout,
            Arc::new(callback),
        )
    }

    /// Forward an input-source change notification
    pub fn layout_changed(&self) {
        self.translator.layout_changed();
    }

    /// Stop notifications, drop every hotkey and cancel background work.
    ///
    /// Event taps are owned by the caller and should be destroyed first.
    pub fn shutdown(self) {
        self.platform.layout_watcher.stop();
        self.hotkeys.cleanup();
        self.translator.shutdown();
        self.scheduler.shutdown();
        info!("keyboard engine shut down");
    }
}
