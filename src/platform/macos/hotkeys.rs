//! Carbon global hotkeys
//!
//! Registration and the event handler must be touched on the main thread,
//! so every call hops there and waits for the result.

use std::collections::HashMap;
use std::ffi::c_void;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, warn};

use super::carbon_modifiers;
use super::dispatch::MainQueue;
use super::ffi::{
    GetApplicationEventTarget, GetEventParameter, InstallEventHandler, RegisterEventHotKey,
    RemoveEventHandler, UnregisterEventHotKey, EventHandlerCallRef, EventHotKeyID, EventRef,
    EventTypeSpec, SendPtr, EVENT_NOT_HANDLED_ERR, K_EVENT_CLASS_KEYBOARD, K_EVENT_HOTKEY_PRESSED,
    K_EVENT_PARAM_DIRECT_OBJECT, NO_ERR, TYPE_EVENT_HOTKEY_ID,
};
use crate::hotkeys::{DispatchFn, HotkeyBackend, HotkeyError, HotkeyId};
use crate::keymap::ChordKey;
use crate::platform::run_on_main;

/// Hotkey signature: 'ktap'
const SIGNATURE: u32 = 0x6B74_6170;

const MAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Default)]
struct CarbonState {
    handler: Option<SendPtr>,
    dispatch: Option<SendPtr>,
    hotkeys: HashMap<HotkeyId, SendPtr>,
}

#[derive(Default)]
pub struct CarbonHotkeys {
    state: Arc<Mutex<CarbonState>>,
}

impl CarbonHotkeys {
    pub fn new() -> Self {
        Self::default()
    }

    fn on_main<R, F>(&self, job: F) -> Result<R, HotkeyError>
    where
        R: Send + 'static,
        F: FnOnce(&mut CarbonState) -> Result<R, HotkeyError> + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        run_on_main(&MainQueue, move || job(&mut state.lock()), MAIN_TIMEOUT)
            .ok_or(HotkeyError::MainThreadTimeout)?
    }
}

impl HotkeyBackend for CarbonHotkeys {
    fn install_dispatch(&self, dispatch: DispatchFn) -> Result<(), HotkeyError> {
        self.on_main(move |state| {
            if state.handler.is_some() {
                return Ok(());
            }

            let user_data = Box::into_raw(Box::new(dispatch));
            let spec = EventTypeSpec {
                event_class: K_EVENT_CLASS_KEYBOARD,
                event_kind: K_EVENT_HOTKEY_PRESSED,
            };
            let mut handler = ptr::null_mut();
            let status = unsafe {
                InstallEventHandler(
                    GetApplicationEventTarget(),
                    hotkey_handler,
                    1,
                    &spec,
                    user_data as *mut c_void,
                    &mut handler,
                )
            };
            if status != NO_ERR {
                drop(unsafe { Box::from_raw(user_data) });
                return Err(HotkeyError::DispatchInstall(status));
            }

            state.handler = Some(SendPtr(handler));
            state.dispatch = Some(SendPtr(user_data as *mut c_void));
            Ok(())
        })
    }

    fn remove_dispatch(&self) {
        let removed = self.on_main(|state| {
            if let Some(handler) = state.handler.take() {
                unsafe { RemoveEventHandler(handler.0) };
            }
            if let Some(dispatch) = state.dispatch.take() {
                drop(unsafe { Box::from_raw(dispatch.0 as *mut DispatchFn) });
            }
            Ok(())
        });
        if let Err(e) = removed {
            warn!("failed to remove hotkey handler: {}", e);
        }
    }

    fn register(&self, chord: ChordKey, id: HotkeyId) -> Result<(), HotkeyError> {
        self.on_main(move |state| {
            let hotkey_id = EventHotKeyID {
                signature: SIGNATURE,
                id: id.0,
            };
            let mut hotkey = ptr::null_mut();
            let status = unsafe {
                RegisterEventHotKey(
                    u32::from(chord.code.raw()),
                    carbon_modifiers(chord.modifiers),
                    hotkey_id,
                    GetApplicationEventTarget(),
                    0,
                    &mut hotkey,
                )
            };
            if status != NO_ERR || hotkey.is_null() {
                return Err(HotkeyError::Rejected {
                    hotkey: chord.to_string(),
                    status,
                });
            }

            if let Some(previous) = state.hotkeys.insert(id, SendPtr(hotkey)) {
                unsafe { UnregisterEventHotKey(previous.0) };
            }
            debug!(%chord, %id, "carbon hotkey registered");
            Ok(())
        })
    }

    fn unregister(&self, id: HotkeyId) {
        let removed = self.on_main(move |state| {
            if let Some(hotkey) = state.hotkeys.remove(&id) {
                let status = unsafe { UnregisterEventHotKey(hotkey.0) };
                if status != NO_ERR {
                    warn!(%id, status, "failed to unregister hotkey");
                }
            }
            Ok(())
        });
        if let Err(e) = removed {
            warn!(%id, "failed to unregister hotkey: {}", e);
        }
    }
}

extern "C" fn hotkey_handler(
    _call: EventHandlerCallRef,
    event: EventRef,
    user_data: *mut c_void,
) -> i32 {
    if user_data.is_null() {
        return EVENT_NOT_HANDLED_ERR;
    }

    let mut hotkey = EventHotKeyID::default();
    let status = unsafe {
        GetEventParameter(
            event,
            K_EVENT_PARAM_DIRECT_OBJECT,
            TYPE_EVENT_HOTKEY_ID,
            ptr::null_mut(),
            mem::size_of::<EventHotKeyID>() as u32,
            ptr::null_mut(),
            &mut hotkey as *mut EventHotKeyID as *mut c_void,
        )
    };
    if status != NO_ERR || hotkey.signature != SIGNATURE {
        return EVENT_NOT_HANDLED_ERR;
    }

    let dispatch = unsafe { &*(user_data as *const DispatchFn) };
    if panic::catch_unwind(AssertUnwindSafe(|| dispatch(HotkeyId(hotkey.id)))).is_err() {
        error!(id = hotkey.id, "hotkey callback panicked");
    }
    NO_ERR
}
