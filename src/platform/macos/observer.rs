//! Input source change notifications
//!
//! The distributed notification center posts
//! `kTISNotifySelectedKeyboardInputSourceChanged` on the main run loop,
//! sometimes several times per switch.

use std::ffi::c_void;
use std::ptr;
use std::sync::Arc;

use anyhow::bail;
use core_foundation::string::CFStringRef;
use parking_lot::Mutex;
use tracing::{info, trace};

use super::ffi::{
    kTISNotifySelectedKeyboardInputSourceChanged, CFNotificationCenterAddObserver,
    CFNotificationCenterGetDistributedCenter, CFNotificationCenterRemoveObserver,
    CFNotificationCenterRef, SendPtr, CF_NOTIFICATION_DELIVER_IMMEDIATELY,
};
use crate::platform::LayoutWatcher;

type OnChange = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
pub struct InputSourceObserver {
    observer: Mutex<Option<SendPtr>>,
}

impl InputSourceObserver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LayoutWatcher for InputSourceObserver {
    fn start(&self, on_change: OnChange) -> anyhow::Result<()> {
        let mut observer = self.observer.lock();
        if observer.is_some() {
            return Ok(());
        }

        let context = Box::into_raw(Box::new(on_change)) as *mut c_void;
        unsafe {
            let center = CFNotificationCenterGetDistributedCenter();
            if center.is_null() {
                drop(Box::from_raw(context as *mut OnChange));
                bail!("distributed notification center unavailable");
            }
            CFNotificationCenterAddObserver(
                center,
                context,
                input_source_changed,
                kTISNotifySelectedKeyboardInputSourceChanged,
                ptr::null(),
                CF_NOTIFICATION_DELIVER_IMMEDIATELY,
            );
        }

        *observer = Some(SendPtr(context));
        info!("watching keyboard input source changes");
        Ok(())
    }

    /// Call on the main thread, where notifications are delivered
    fn stop(&self) {
        let Some(context) = self.observer.lock().take() else {
            return;
        };
        unsafe {
            CFNotificationCenterRemoveObserver(
                CFNotificationCenterGetDistributedCenter(),
                context.0,
                kTISNotifySelectedKeyboardInputSourceChanged,
                ptr::null(),
            );
            drop(Box::from_raw(context.0 as *mut OnChange));
        }
        info!("stopped watching keyboard input source changes");
    }
}

impl Drop for InputSourceObserver {
    fn drop(&mut self) {
        self.stop();
    }
}

extern "C" fn input_source_changed(
    _center: CFNotificationCenterRef,
    observer: *mut c_void,
    _name: CFStringRef,
    _object: *const c_void,
    _user_info: *const c_void,
) {
    if observer.is_null() {
        return;
    }
    trace!("input source change notification");
    let on_change = unsafe { &*(observer as *const OnChange) };
    on_change();
}
