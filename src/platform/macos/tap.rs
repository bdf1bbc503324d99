//! Quartz event tap on a dedicated run-loop thread
//!
//! Requires Accessibility permission. The OS disables slow or interrupted
//! taps; the callback re-enables them while the owner wants them on.

use std::ffi::c_void;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use core_foundation::base::CFRelease;
use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop};
use core_graphics::event::CGEventFlags;
use tracing::{error, info, trace, warn};

use super::ffi::{
    CFMachPortCreateRunLoopSource, CFMachPortInvalidate, CFRunLoopAddSource, CFRunLoopGetCurrent,
    CFRunLoopStop, CGEventGetFlags, CGEventGetIntegerValueField, CGEventRef, CGEventTapCreate,
    CGEventTapEnable, CGEventTapProxy, SendPtr, CG_EVENT_KEY_DOWN, CG_EVENT_TAP_DISABLED_BY_TIMEOUT,
    CG_EVENT_TAP_DISABLED_BY_USER_INPUT, CG_EVENT_TAP_OPTION_DEFAULT, CG_HEAD_INSERT_EVENT_TAP,
    CG_KEYBOARD_EVENT_KEYCODE, CG_SESSION_EVENT_TAP,
};
use crate::keymap::{KeyCode, ModifierSet};
use crate::tap::{KeyDownHandler, TapBackend, TapDecision, TapError, TapHandle};

/// How often the tap thread checks whether it should exit
const RUN_LOOP_SLICE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, Default)]
pub struct QuartzTapBackend;

/// Shared between the owner and the OS callback
struct TapContext {
    handler: Arc<dyn KeyDownHandler>,
    port: AtomicPtr<c_void>,
    enabled: AtomicBool,
    running: AtomicBool,
}

impl TapBackend for QuartzTapBackend {
    fn install(&self, handler: Arc<dyn KeyDownHandler>) -> Result<Box<dyn TapHandle>, TapError> {
        let context = Arc::new(TapContext {
            handler,
            port: AtomicPtr::new(ptr::null_mut()),
            enabled: AtomicBool::new(false),
            running: AtomicBool::new(true),
        });

        let (ready_tx, ready_rx) = mpsc::channel();
        let thread_context = Arc::clone(&context);
        let thread = thread::Builder::new()
            .name("event-tap".to_string())
            .spawn(move || run_tap_loop(thread_context, ready_tx))
            .map_err(|e| TapError::ThreadSpawn(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(run_loop)) => Ok(Box::new(QuartzTap {
                context,
                run_loop,
                thread: Some(thread),
            })),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(TapError::Creation)
            }
        }
    }
}

struct QuartzTap {
    context: Arc<TapContext>,
    run_loop: SendPtr,
    thread: Option<JoinHandle<()>>,
}

impl TapHandle for QuartzTap {
    fn set_enabled(&self, enabled: bool) {
        self.context.enabled.store(enabled, Ordering::SeqCst);
        let port = self.context.port.load(Ordering::SeqCst);
        if !port.is_null() {
            unsafe { CGEventTapEnable(port as CGEventRef, enabled) };
        }
    }

    fn release(mut self: Box<Self>) {
        self.context.enabled.store(false, Ordering::SeqCst);
        self.context.running.store(false, Ordering::SeqCst);
        unsafe { CFRunLoopStop(self.run_loop.0 as _) };

        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("event tap thread panicked");
            }
        }
    }
}

fn run_tap_loop(context: Arc<TapContext>, ready: mpsc::Sender<Result<SendPtr, TapError>>) {
    let user_info = Arc::as_ptr(&context) as *mut c_void;

    unsafe {
        let port = CGEventTapCreate(
            CG_SESSION_EVENT_TAP,
            CG_HEAD_INSERT_EVENT_TAP,
            CG_EVENT_TAP_OPTION_DEFAULT,
            1 << CG_EVENT_KEY_DOWN,
            tap_callback,
            user_info,
        );
        if port.is_null() {
            let _ = ready.send(Err(TapError::Creation));
            return;
        }
        // Taps are created enabled; ours start off
        CGEventTapEnable(port, false);

        let source = CFMachPortCreateRunLoopSource(ptr::null(), port, 0);
        if source.is_null() {
            CFMachPortInvalidate(port);
            CFRelease(port);
            let _ = ready.send(Err(TapError::Creation));
            return;
        }
        let run_loop = CFRunLoopGetCurrent();
        CFRunLoopAddSource(run_loop, source, kCFRunLoopCommonModes);
        context.port.store(port as *mut c_void, Ordering::SeqCst);

        let _ = ready.send(Ok(SendPtr(run_loop as *mut c_void)));
        info!("event tap thread started");

        while context.running.load(Ordering::SeqCst) {
            CFRunLoop::run_in_mode(kCFRunLoopDefaultMode, RUN_LOOP_SLICE, false);
        }

        context.port.store(ptr::null_mut(), Ordering::SeqCst);
        CGEventTapEnable(port, false);
        CFMachPortInvalidate(port);
        CFRelease(source);
        CFRelease(port);
    }

    info!("event tap thread stopped");
}

extern "C" fn tap_callback(
    _proxy: CGEventTapProxy,
    event_type: u32,
    event: CGEventRef,
    user_info: *mut c_void,
) -> CGEventRef {
    if user_info.is_null() {
        return event;
    }
    let context = unsafe { &*(user_info as *const TapContext) };

    match event_type {
        CG_EVENT_TAP_DISABLED_BY_TIMEOUT | CG_EVENT_TAP_DISABLED_BY_USER_INPUT => {
            let port = context.port.load(Ordering::SeqCst);
            if context.enabled.load(Ordering::SeqCst) && !port.is_null() {
                warn!("event tap disabled by the OS, re-enabling");
                unsafe { CGEventTapEnable(port as CGEventRef, true) };
            }
            event
        }
        CG_EVENT_KEY_DOWN => {
            let (code, flags) = unsafe {
                (
                    CGEventGetIntegerValueField(event, CG_KEYBOARD_EVENT_KEYCODE),
                    CGEventGetFlags(event),
                )
            };
            let code = KeyCode(code as u16);
            let modifiers = ModifierSet::from_event_flags(CGEventFlags::from_bits_truncate(flags));

            let decision = panic::catch_unwind(AssertUnwindSafe(|| {
                context.handler.key_down(code, modifiers)
            }))
            .unwrap_or_else(|_| {
                error!(%code, "key handler panicked, passing event through");
                TapDecision::PassThrough
            });

            match decision {
                TapDecision::Consume => {
                    trace!(%code, "consumed key-down");
                    ptr::null()
                }
                TapDecision::PassThrough => event,
            }
        }
        _ => event,
    }
}
