//! Layout-aware key translation
//!
//! The translator is the only authority for keycode, name and character
//! translation. It holds the current [`KeymapSnapshot`] and the live layout
//! engine behind one lock. Readers clone the `Arc`s and release the lock
//! before doing any work, so a rebuild never tears a lookup in progress and
//! the layout engine is never called while the lock is held.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, LazyLock, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use super::codes::{reference_key, special_char, KeyCode};
use super::layout::{printable, LayoutEngine, LayoutSource};
use super::modifiers::ModifierSet;
use super::snapshot::KeymapSnapshot;
use crate::platform::{run_on_main, MainThread};
use crate::scheduler::{Debounced, Scheduler};

/// Served while the first build is still waiting for the UI thread
static REFERENCE_SNAPSHOT: LazyLock<Arc<KeymapSnapshot>> =
    LazyLock::new(|| Arc::new(KeymapSnapshot::reference(0)));

/// State swapped as a unit on every rebuild
#[derive(Default)]
struct Tables {
    snapshot: Option<Arc<KeymapSnapshot>>,
    /// Last layout that carried layout data. Kept when a newer input
    /// source has none.
    layout: Option<Arc<dyn LayoutEngine>>,
}

/// Translates between key codes, names and characters for the live layout
pub struct KeymapTranslator {
    me: Weak<KeymapTranslator>,
    source: Arc<dyn LayoutSource>,
    main: Arc<dyn MainThread>,
    tables: Mutex<Tables>,
    next_generation: AtomicU64,
    /// A first build has been queued on the UI thread and not yet run
    build_queued: AtomicBool,
    generation: watch::Sender<u64>,
    rebuild_task: Debounced,
    main_timeout: Duration,
}

impl KeymapTranslator {
    /// Create a translator. Nothing is built until first use.
    pub fn new(
        source: Arc<dyn LayoutSource>,
        scheduler: &Scheduler,
        rebuild_debounce: Duration,
        main_timeout: Duration,
    ) -> Arc<Self> {
        let (generation, _) = watch::channel(0);
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            source,
            main: Arc::clone(scheduler.main_thread()),
            tables: Mutex::new(Tables::default()),
            next_generation: AtomicU64::new(0),
            build_queued: AtomicBool::new(false),
            generation,
            rebuild_task: scheduler.debounced("keymap-rebuild", rebuild_debounce),
            main_timeout,
        })
    }

    /// Key code for a name. Case-insensitive; blank names are never found.
    pub fn name_to_code(&self, name: &str) -> Option<KeyCode> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        self.snapshot().code_for(name)
    }

    /// Canonical name for a key code
    pub fn code_to_name(&self, code: KeyCode) -> Option<String> {
        self.snapshot().name_for(code).map(str::to_owned)
    }

    /// Text `code` produces under `modifiers` in the live layout.
    ///
    /// Degrades through the cached combinations, the live layout engine and
    /// finally the reference table. Control characters are never returned,
    /// except for the fixed text of Space, Return and Tab.
    pub fn code_to_character(&self, code: KeyCode, modifiers: ModifierSet) -> Option<String> {
        let snapshot = self.snapshot();
        self.character_in(&snapshot, code, modifiers)
    }

    /// [`code_to_character`](Self::code_to_character) against a snapshot
    /// the caller already holds
    pub(crate) fn character_in(
        &self,
        snapshot: &KeymapSnapshot,
        code: KeyCode,
        modifiers: ModifierSet,
    ) -> Option<String> {
        if let Some(combo) = modifiers.char_combo() {
            if let Some(ch) = snapshot.cached_char(code, combo) {
                return Some(ch.to_owned());
            }
        }

        let layout = self.tables.lock().layout.clone();
        if let Some(ch) = layout
            .and_then(|engine| engine.translate(code, modifiers))
            .and_then(printable)
        {
            return Some(ch);
        }

        reference_char(code, modifiers)
    }

    /// Current snapshot, building it on first use.
    ///
    /// If the UI thread does not complete the first build within the
    /// configured timeout, a reference-only snapshot is served and the
    /// build finishes in the background.
    pub fn snapshot(&self) -> Arc<KeymapSnapshot> {
        if let Some(snapshot) = self.current() {
            return snapshot;
        }

        let me = self.me.clone();
        let built = run_on_main(
            self.main.as_ref(),
            move || me.upgrade().map(|translator| translator.current_or_rebuild()),
            self.main_timeout,
        )
        .flatten();

        match built {
            Some(snapshot) => snapshot,
            None => {
                warn!(
                    timeout_ms = self.main_timeout.as_millis() as u64,
                    "keymap not built yet, serving reference table"
                );
                Arc::clone(&REFERENCE_SNAPSHOT)
            }
        }
    }

    /// Current snapshot without ever waiting on the UI thread.
    ///
    /// Before the first build has run this serves the reference tables and
    /// queues the build, so it is safe on the tap callback thread.
    pub fn try_snapshot(&self) -> Arc<KeymapSnapshot> {
        if let Some(snapshot) = self.current() {
            return snapshot;
        }
        if self.main.is_main_thread() {
            return self.current_or_rebuild();
        }

        if !self.build_queued.swap(true, Ordering::AcqRel) {
            trace!("queueing first keymap build");
            let me = self.me.clone();
            self.main.dispatch(Box::new(move || {
                if let Some(translator) = me.upgrade() {
                    translator.current_or_rebuild();
                    translator.build_queued.store(false, Ordering::Release);
                }
            }));
        }
        Arc::clone(&REFERENCE_SNAPSHOT)
    }

    /// Synchronously rebuild the tables. Returns false if the UI thread did
    /// not complete the rebuild in time.
    pub fn refresh_now(&self) -> bool {
        self.rebuild_task.cancel();
        let me = self.me.clone();
        let done = run_on_main(
            self.main.as_ref(),
            move || me.upgrade().map(|translator| translator.rebuild()).is_some(),
            self.main_timeout,
        );
        done.unwrap_or(false)
    }

    /// Layout-change notification entry point.
    ///
    /// Bursts collapse into one rebuild after the debounce window.
    pub fn layout_changed(&self) {
        debug!("keyboard input source changed, scheduling keymap rebuild");
        let me = self.me.clone();
        self.rebuild_task.schedule(move || {
            if let Some(translator) = me.upgrade() {
                translator.rebuild();
            }
        });
    }

    /// Latest installed layout generation; 0 before the first build
    pub fn generation(&self) -> u64 {
        *self.generation.borrow()
    }

    /// Observe generation bumps
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }

    /// Cancel a pending debounced rebuild
    pub fn shutdown(&self) {
        self.rebuild_task.cancel();
    }

    fn current(&self) -> Option<Arc<KeymapSnapshot>> {
        self.tables.lock().snapshot.clone()
    }

    fn current_or_rebuild(&self) -> Arc<KeymapSnapshot> {
        match self.current() {
            Some(snapshot) => snapshot,
            None => self.rebuild(),
        }
    }

    /// Build a new snapshot from the active layout and swap it in.
    ///
    /// Must run on the UI thread when backed by the OS layout source.
    pub(crate) fn rebuild(&self) -> Arc<KeymapSnapshot> {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let layout = self.source.current();

        if layout.is_none() {
            warn!(
                generation,
                "input source has no layout data, using reference table and previous layout"
            );
        }

        let snapshot = Arc::new(KeymapSnapshot::build(layout.as_deref(), generation));

        let mut tables = self.tables.lock();
        let stale = tables
            .snapshot
            .as_ref()
            .is_some_and(|current| current.generation() > generation);
        if stale {
            // A newer rebuild finished first
            let current = tables.snapshot.clone().unwrap_or(snapshot);
            drop(tables);
            return current;
        }

        tables.snapshot = Some(Arc::clone(&snapshot));
        let released = match layout {
            Some(layout) => tables.layout.replace(layout),
            None => None,
        };
        drop(tables);
        drop(released);

        self.generation.send_replace(generation);
        info!(
            generation,
            layout_backed = snapshot.is_layout_backed(),
            "keymap rebuilt"
        );

        snapshot
    }
}

/// Reference-table character for `modifiers`, ignoring command-like
/// modifiers the table has no column for
fn reference_char(code: KeyCode, modifiers: ModifierSet) -> Option<String> {
    if let Some(ch) = special_char(code) {
        return Some(ch.to_owned());
    }
    let combo = (modifiers - ModifierSet::COMMAND_LIKE).char_combo()?;
    reference_key(code).map(|key| key.chars[combo.index()].to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicBool;
    use std::thread;

    use tokio::runtime::Handle;

    use crate::keymap::codes::{REFERENCE_LAYOUT, SPECIAL_KEYS};
    use crate::platform::testing::{MapLayout, StalledMainThread, SwitchableLayouts};
    use crate::platform::InlineMainThread;

    fn translator(source: Arc<SwitchableLayouts>) -> Arc<KeymapTranslator> {
        let scheduler = Scheduler::new(Handle::current(), Arc::new(InlineMainThread));
        KeymapTranslator::new(source, &scheduler, Duration::from_millis(120), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_lazy_build_is_idempotent() {
        let source = SwitchableLayouts::empty();
        let translator = translator(Arc::clone(&source));
        assert_eq!(translator.generation(), 0);

        translator.code_to_name(KeyCode(0));
        translator.name_to_code("Space");
        assert_eq!(translator.generation(), 1);
        assert_eq!(source.queries(), 1);
    }

    #[tokio::test]
    async fn test_blank_name_skips_layout() {
        let source = SwitchableLayouts::empty();
        let translator = translator(Arc::clone(&source));
        assert_eq!(translator.name_to_code(""), None);
        assert_eq!(translator.name_to_code("   "), None);
        assert_eq!(source.queries(), 0);
    }

    #[tokio::test]
    async fn test_unshifted_coverage_without_layout() {
        let translator = translator(SwitchableLayouts::empty());
        for code in REFERENCE_LAYOUT.iter().map(|key| key.code) {
            let ch = translator.code_to_character(code, ModifierSet::empty());
            assert!(ch.is_some_and(|ch| !ch.is_empty()), "no character for {code}");
        }
    }

    #[tokio::test]
    async fn test_special_name_round_trip_is_stable() {
        let translator = translator(SwitchableLayouts::with(MapLayout::azerty()));
        for (name, _) in SPECIAL_KEYS {
            let first = translator.name_to_code(name).unwrap();
            let again = translator
                .name_to_code(&translator.code_to_name(first).unwrap())
                .unwrap();
            assert_eq!(first, again, "{name}");
        }
    }

    #[tokio::test]
    async fn test_return_reports_canonical_name() {
        let translator = translator(SwitchableLayouts::empty());
        let code = translator.name_to_code("enter").unwrap();
        assert_eq!(code, translator.name_to_code("Return").unwrap());
        assert_eq!(translator.code_to_name(code).as_deref(), Some("Return"));
    }

    #[tokio::test]
    async fn test_live_path_for_uncached_modifiers() {
        let layout = MapLayout::new("live").with(KeyCode(0), ModifierSet::OPTION, "å");
        let translator = translator(SwitchableLayouts::with(layout));
        // First call of the process builds the keymap before asking the engine
        assert_eq!(
            translator.code_to_character(KeyCode(0), ModifierSet::OPTION).as_deref(),
            Some("å")
        );
        assert_eq!(translator.generation(), 1);
        // Engine has nothing for Option+S: reference plain column
        assert_eq!(
            translator.code_to_character(KeyCode(1), ModifierSet::OPTION).as_deref(),
            Some("s")
        );
    }

    #[tokio::test]
    async fn test_live_path_drops_control_characters() {
        let f5 = KeyCode(96);
        let layout = MapLayout::new("live")
            .with(f5, ModifierSet::empty(), "\u{10}")
            .with(KeyCode::FORWARD_DELETE, ModifierSet::empty(), "\u{7f}")
            .with(KeyCode::RETURN, ModifierSet::empty(), "\r");
        let live = translator(SwitchableLayouts::with(layout));
        let fallback = translator(SwitchableLayouts::empty());

        for code in [f5, KeyCode::FORWARD_DELETE, KeyCode::RETURN] {
            assert_eq!(
                live.code_to_character(code, ModifierSet::empty()),
                fallback.code_to_character(code, ModifierSet::empty()),
                "{code}"
            );
        }
        assert_eq!(live.code_to_character(f5, ModifierSet::empty()), None);
        assert_eq!(
            live.code_to_character(KeyCode::RETURN, ModifierSet::empty()).as_deref(),
            Some("\r")
        );
    }

    #[test]
    fn test_try_snapshot_never_waits_for_ui_thread() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let main = Arc::new(StalledMainThread::default());
        let scheduler = Scheduler::new(runtime.handle().clone(), Arc::clone(&main) as _);
        let translator = KeymapTranslator::new(
            SwitchableLayouts::with(MapLayout::azerty()),
            &scheduler,
            Duration::from_millis(120),
            Duration::from_secs(2),
        );

        let started = std::time::Instant::now();
        let first = translator.try_snapshot();
        let second = translator.try_snapshot();
        assert!(started.elapsed() < Duration::from_millis(500));
        assert_eq!(first.generation(), 0);
        assert_eq!(second.name_for(KeyCode(12)), Some("Q"));
        // Repeated reads queue the build once
        assert_eq!(main.queued(), 1);

        main.drain();
        let built = translator.try_snapshot();
        assert_eq!(built.generation(), 1);
        assert_eq!(built.name_for(KeyCode(12)), Some("A"));
    }

    #[tokio::test]
    async fn test_space_has_a_character_without_layout() {
        let translator = translator(SwitchableLayouts::empty());
        assert_eq!(
            translator.code_to_character(KeyCode::SPACE, ModifierSet::empty()).as_deref(),
            Some(" ")
        );
        assert_eq!(translator.code_to_character(KeyCode::UP, ModifierSet::empty()), None);
    }

    #[tokio::test]
    async fn test_missing_layout_keeps_previous_engine() {
        let layout = MapLayout::new("live").with(KeyCode(0), ModifierSet::OPTION, "å");
        let source = SwitchableLayouts::with(layout);
        let translator = translator(Arc::clone(&source));
        translator.refresh_now();

        source.set(None);
        assert!(translator.refresh_now());

        let snapshot = translator.snapshot();
        assert!(!snapshot.is_layout_backed());
        assert_eq!(
            translator.code_to_character(KeyCode(0), ModifierSet::OPTION).as_deref(),
            Some("å")
        );
    }

    #[tokio::test]
    async fn test_refresh_picks_up_new_layout() {
        let source = SwitchableLayouts::empty();
        let translator = translator(Arc::clone(&source));
        assert_eq!(translator.name_to_code("A"), Some(KeyCode(0)));

        source.set(Some(MapLayout::azerty()));
        assert!(translator.refresh_now());
        assert_eq!(translator.name_to_code("A"), Some(KeyCode(12)));
        assert_eq!(translator.generation(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_notification_burst_rebuilds_once() {
        let source = SwitchableLayouts::empty();
        let translator = translator(Arc::clone(&source));
        translator.snapshot();
        let changes = translator.subscribe();

        for _ in 0..10 {
            translator.layout_changed();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(translator.generation(), 1);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(translator.generation(), 2);
        assert_eq!(source.queries(), 2);
        assert!(changes.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_pending_rebuild() {
        let source = SwitchableLayouts::empty();
        let translator = translator(Arc::clone(&source));
        translator.snapshot();

        translator.layout_changed();
        translator.shutdown();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(translator.generation(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_readers_never_see_torn_snapshots() {
        // Two layouts that disagree on every field read below
        let qwerty = MapLayout::new("one")
            .with(KeyCode(0), ModifierSet::empty(), "a")
            .with(KeyCode(0), ModifierSet::SHIFT, "A");
        let other = MapLayout::new("two")
            .with(KeyCode(0), ModifierSet::empty(), "z")
            .with(KeyCode(0), ModifierSet::SHIFT, "Z");

        let source = SwitchableLayouts::with(qwerty.clone());
        let translator = translator(Arc::clone(&source));
        translator.refresh_now();

        let stop = Arc::new(AtomicBool::new(false));
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let translator = Arc::clone(&translator);
                let stop = Arc::clone(&stop);
                thread::spawn(move || {
                    let mut seen = HashSet::new();
                    while !stop.load(Ordering::Relaxed) {
                        let snapshot = translator.snapshot();
                        let name = snapshot.name_for(KeyCode(0)).unwrap().to_owned();
                        let plain = snapshot
                            .cached_char(KeyCode(0), crate::keymap::CharCombo::Plain)
                            .unwrap()
                            .to_owned();
                        let shifted = snapshot
                            .cached_char(KeyCode(0), crate::keymap::CharCombo::Shift)
                            .unwrap()
                            .to_owned();
                        assert_eq!(name, shifted);
                        assert_eq!(plain.to_uppercase(), name);
                        seen.insert(name);
                    }
                    seen
                })
            })
            .collect();

        for round in 0..200 {
            let next = if round % 2 == 0 { other.clone() } else { qwerty.clone() };
            source.set(Some(next));
            translator.refresh_now();
        }
        stop.store(true, Ordering::Relaxed);

        for reader in readers {
            let seen = reader.join().unwrap();
            assert!(seen.iter().all(|name| name == "A" || name == "Z"));
        }
    }
}
