//! OS integration seams
//!
//! The engine reaches the operating system only through the traits in this
//! module. The macOS implementation lives in [`macos`]; tests use the
//! doubles in `testing`.

use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use crate::hotkeys::HotkeyBackend;
use crate::keymap::LayoutSource;
use crate::tap::TapBackend;

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(test)]
pub(crate) mod testing;

/// Unit of work handed to the UI thread
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// The thread the OS requires for layout queries, tap toggling and hotkey
/// registration
pub trait MainThread: Send + Sync {
    /// Queue `job` to run on the UI thread. Never blocks.
    fn dispatch(&self, job: Job);

    fn is_main_thread(&self) -> bool;
}

/// Runs jobs immediately on the calling thread.
///
/// For hosts whose caller already is the UI thread, and for tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineMainThread;

impl MainThread for InlineMainThread {
    fn dispatch(&self, job: Job) {
        job();
    }

    fn is_main_thread(&self) -> bool {
        true
    }
}

/// Run `job` on the UI thread and wait for its result.
///
/// Runs inline when already on the UI thread. Otherwise waits at most
/// `timeout` and returns `None` if the UI thread did not get to it; the job
/// still runs later.
pub fn run_on_main<R, F>(main: &dyn MainThread, job: F, timeout: Duration) -> Option<R>
where
    R: Send + 'static,
    F: FnOnce() -> R + Send + 'static,
{
    if main.is_main_thread() {
        return Some(job());
    }

    let (tx, rx) = mpsc::sync_channel(1);
    main.dispatch(Box::new(move || {
        let _ = tx.send(job());
    }));
    rx.recv_timeout(timeout).ok()
}

/// Receives notifications when the selected keyboard input source changes
pub trait LayoutWatcher: Send + Sync {
    /// Start delivering notifications to `on_change`. Idempotent.
    fn start(&self, on_change: Arc<dyn Fn() + Send + Sync>) -> anyhow::Result<()>;

    /// Stop delivering notifications. Safe to call when not started.
    fn stop(&self);
}

/// Everything the engine needs from the OS
#[derive(Clone)]
pub struct Platform {
    pub main: Arc<dyn MainThread>,
    pub layouts: Arc<dyn LayoutSource>,
    pub layout_watcher: Arc<dyn LayoutWatcher>,
    pub tap: Arc<dyn TapBackend>,
    pub hotkeys: Arc<dyn HotkeyBackend>,
}

#[cfg(target_os = "macos")]
impl Platform {
    /// The macOS backends. Must be called on the main thread.
    pub fn native() -> Self {
        Self {
            main: Arc::new(macos::dispatch::MainQueue),
            layouts: Arc::new(macos::layout::TisLayoutSource),
            layout_watcher: Arc::new(macos::observer::InputSourceObserver::new()),
            tap: Arc::new(macos::tap::QuartzTapBackend),
            hotkeys: Arc::new(macos::hotkeys::CarbonHotkeys::new()),
        }
    }
}
