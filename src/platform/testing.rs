//! In-memory doubles for the OS seams

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{Job, LayoutWatcher, MainThread};
use crate::hotkeys::{DispatchFn, HotkeyBackend, HotkeyError, HotkeyId};
use crate::keymap::{ChordKey, KeyCode, LayoutEngine, LayoutSource, ModifierSet};
use crate::tap::{KeyDownHandler, TapBackend, TapDecision, TapError, TapHandle};

/// Layout engine answering from a fixed table
#[derive(Debug, Clone)]
pub struct MapLayout {
    id: String,
    keys: HashMap<(KeyCode, ModifierSet), String>,
}

impl MapLayout {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_owned(),
            keys: HashMap::new(),
        }
    }

    pub fn with(mut self, code: KeyCode, modifiers: ModifierSet, text: &str) -> Self {
        self.keys.insert((code, modifiers), text.to_owned());
        self
    }

    /// The four keys AZERTY moves around, in every cached combination
    pub fn azerty() -> Self {
        let mut layout = Self::new("com.apple.keylayout.French");
        for (code, lower, upper) in [(0, "q", "Q"), (12, "a", "A"), (13, "z", "Z"), (6, "w", "W")] {
            let code = KeyCode(code);
            layout = layout
                .with(code, ModifierSet::empty(), lower)
                .with(code, ModifierSet::SHIFT, upper)
                .with(code, ModifierSet::CAPS_LOCK, upper)
                .with(code, ModifierSet::SHIFT | ModifierSet::CAPS_LOCK, lower);
        }
        layout
    }
}

impl LayoutEngine for MapLayout {
    fn translate(&self, code: KeyCode, modifiers: ModifierSet) -> Option<String> {
        self.keys.get(&(code, modifiers)).cloned()
    }

    fn id(&self) -> &str {
        &self.id
    }
}

/// Layout source whose active layout tests can switch
#[derive(Debug, Default)]
pub struct SwitchableLayouts {
    current: Mutex<Option<MapLayout>>,
    queries: AtomicUsize,
}

impl SwitchableLayouts {
    /// No input source with layout data
    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with(layout: MapLayout) -> Arc<Self> {
        let source = Self::default();
        *source.current.lock() = Some(layout);
        Arc::new(source)
    }

    pub fn set(&self, layout: Option<MapLayout>) {
        *self.current.lock() = layout;
    }

    /// How many times the translator asked for the active layout
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl LayoutSource for SwitchableLayouts {
    fn current(&self) -> Option<Arc<dyn LayoutEngine>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.current
            .lock()
            .clone()
            .map(|layout| Arc::new(layout) as Arc<dyn LayoutEngine>)
    }
}

#[derive(Default)]
struct TapShared {
    handler: Mutex<Option<Arc<dyn KeyDownHandler>>>,
    enabled: AtomicBool,
    released: AtomicBool,
    toggles: Mutex<Vec<bool>>,
}

/// Tap backend that delivers key-downs on demand
#[derive(Default)]
pub struct RecordingTap {
    shared: Arc<TapShared>,
    deny: bool,
}

impl RecordingTap {
    /// A backend that fails like a missing Accessibility permission
    pub fn denied() -> Self {
        Self {
            deny: true,
            ..Self::default()
        }
    }

    /// Deliver a key-down the way the OS would: only while enabled
    pub fn press(&self, code: KeyCode, modifiers: ModifierSet) -> TapDecision {
        if !self.is_enabled() || self.is_released() {
            return TapDecision::PassThrough;
        }
        let handler = self.shared.handler.lock().clone();
        match handler {
            Some(handler) => handler.key_down(code, modifiers),
            None => TapDecision::PassThrough,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::SeqCst)
    }

    pub fn is_released(&self) -> bool {
        self.shared.released.load(Ordering::SeqCst)
    }

    /// Every `set_enabled` call, in order
    pub fn toggles(&self) -> Vec<bool> {
        self.shared.toggles.lock().clone()
    }
}

impl TapBackend for RecordingTap {
    fn install(&self, handler: Arc<dyn KeyDownHandler>) -> Result<Box<dyn TapHandle>, TapError> {
        if self.deny {
            return Err(TapError::Creation);
        }
        *self.shared.handler.lock() = Some(handler);
        Ok(Box::new(RecordingHandle(Arc::clone(&self.shared))))
    }
}

struct RecordingHandle(Arc<TapShared>);

impl TapHandle for RecordingHandle {
    fn set_enabled(&self, enabled: bool) {
        self.0.enabled.store(enabled, Ordering::SeqCst);
        self.0.toggles.lock().push(enabled);
    }

    fn release(self: Box<Self>) {
        self.0.enabled.store(false, Ordering::SeqCst);
        self.0.released.store(true, Ordering::SeqCst);
        self.0.handler.lock().take();
    }
}

/// Hotkey backend that rejects chords another application already owns
#[derive(Default)]
pub struct FakeHotkeys {
    taken: HashSet<ChordKey>,
    bound: Mutex<HashMap<HotkeyId, ChordKey>>,
    dispatch: Mutex<Option<DispatchFn>>,
    installs: AtomicUsize,
}

impl FakeHotkeys {
    pub fn with_taken(chords: &[ChordKey]) -> Self {
        Self {
            taken: chords.iter().copied().collect(),
            ..Self::default()
        }
    }

    /// Simulate the OS reporting a hotkey press
    pub fn press(&self, chord: ChordKey) -> bool {
        let id = self
            .bound
            .lock()
            .iter()
            .find(|(_, bound)| **bound == chord)
            .map(|(id, _)| *id);
        let dispatch = self.dispatch.lock().clone();
        match (id, dispatch) {
            (Some(id), Some(dispatch)) => {
                dispatch(id);
                true
            }
            _ => false,
        }
    }

    pub fn bound(&self) -> usize {
        self.bound.lock().len()
    }

    pub fn installs(&self) -> usize {
        self.installs.load(Ordering::SeqCst)
    }

    pub fn has_dispatch(&self) -> bool {
        self.dispatch.lock().is_some()
    }
}

impl HotkeyBackend for FakeHotkeys {
    fn install_dispatch(&self, dispatch: DispatchFn) -> Result<(), HotkeyError> {
        self.installs.fetch_add(1, Ordering::SeqCst);
        *self.dispatch.lock() = Some(dispatch);
        Ok(())
    }

    fn remove_dispatch(&self) {
        self.dispatch.lock().take();
    }

    fn register(&self, chord: ChordKey, id: HotkeyId) -> Result<(), HotkeyError> {
        let mut bound = self.bound.lock();
        if self.taken.contains(&chord) || bound.values().any(|c| *c == chord) {
            return Err(HotkeyError::Rejected {
                hotkey: chord.to_string(),
                status: -9878,
            });
        }
        bound.insert(id, chord);
        Ok(())
    }

    fn unregister(&self, id: HotkeyId) {
        self.bound.lock().remove(&id);
    }
}

/// Layout watcher tests fire by hand
#[derive(Default)]
pub struct ManualWatcher {
    on_change: Mutex<Option<Arc<dyn Fn() + Send + Sync>>>,
}

impl ManualWatcher {
    pub fn fire(&self) {
        let on_change = self.on_change.lock().clone();
        if let Some(on_change) = on_change {
            on_change();
        }
    }

    pub fn is_started(&self) -> bool {
        self.on_change.lock().is_some()
    }
}

impl LayoutWatcher for ManualWatcher {
    fn start(&self, on_change: Arc<dyn Fn() + Send + Sync>) -> anyhow::Result<()> {
        *self.on_change.lock() = Some(on_change);
        Ok(())
    }

    fn stop(&self) {
        self.on_change.lock().take();
    }
}

/// A UI thread that only runs its queue when a test drains it
#[derive(Default)]
pub struct StalledMainThread {
    queue: Mutex<Vec<Job>>,
}

impl StalledMainThread {
    pub fn queued(&self) -> usize {
        self.queue.lock().len()
    }

    /// Run everything queued so far, from the calling thread
    pub fn drain(&self) {
        let jobs = std::mem::take(&mut *self.queue.lock());
        for job in jobs {
            job();
        }
    }
}

impl MainThread for StalledMainThread {
    fn dispatch(&self, job: Job) {
        self.queue.lock().push(job);
    }

    fn is_main_thread(&self) -> bool {
        false
    }
}
