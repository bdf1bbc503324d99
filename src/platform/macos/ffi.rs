//! Raw bindings the core-foundation / core-graphics crates do not cover
//!
//! Event taps are created through the C API directly so the callback can
//! consume an event by returning null.

#![allow(non_upper_case_globals, non_snake_case)]

use std::ffi::c_void;

use core_foundation::base::CFTypeRef;
use core_foundation::string::CFStringRef;

/// A CF/Carbon pointer handed across threads. Only thread-safe calls are
/// made through it, or calls confined to the thread that owns it.
#[derive(Debug, Clone, Copy)]
pub struct SendPtr(pub *mut c_void);

unsafe impl Send for SendPtr {}
unsafe impl Sync for SendPtr {}

// === Quartz event taps ===

pub type CGEventRef = CFTypeRef;
pub type CGEventTapProxy = *const c_void;
pub type CGEventMask = u64;
pub type CFMachPortRef = CFTypeRef;
pub type CFRunLoopSourceRef = CFTypeRef;
pub type CFRunLoopRef = CFTypeRef;

pub type CGEventTapCallBack =
    extern "C" fn(CGEventTapProxy, u32, CGEventRef, *mut c_void) -> CGEventRef;

pub const CG_SESSION_EVENT_TAP: u32 = 1;
pub const CG_HEAD_INSERT_EVENT_TAP: u32 = 0;
pub const CG_EVENT_TAP_OPTION_DEFAULT: u32 = 0;

pub const CG_EVENT_KEY_DOWN: u32 = 10;
pub const CG_EVENT_TAP_DISABLED_BY_TIMEOUT: u32 = 0xFFFF_FFFE;
pub const CG_EVENT_TAP_DISABLED_BY_USER_INPUT: u32 = 0xFFFF_FFFF;

pub const CG_KEYBOARD_EVENT_KEYCODE: u32 = 9;

#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    pub fn CGEventTapCreate(
        tap: u32,
        place: u32,
        options: u32,
        events_of_interest: CGEventMask,
        callback: CGEventTapCallBack,
        user_info: *mut c_void,
    ) -> CFMachPortRef;

    pub fn CGEventTapEnable(tap: CFMachPortRef, enable: bool);

    pub fn CGEventGetIntegerValueField(event: CGEventRef, field: u32) -> i64;

    pub fn CGEventGetFlags(event: CGEventRef) -> u64;
}

// === Core Foundation ===

pub type CFNotificationCenterRef = *mut c_void;

pub type CFNotificationCallback = extern "C" fn(
    center: CFNotificationCenterRef,
    observer: *mut c_void,
    name: CFStringRef,
    object: *const c_void,
    user_info: CFTypeRef,
);

pub const CF_NOTIFICATION_DELIVER_IMMEDIATELY: isize = 4;

#[link(name = "CoreFoundation", kind = "framework")]
extern "C" {
    pub fn CFMachPortCreateRunLoopSource(
        allocator: CFTypeRef,
        port: CFMachPortRef,
        order: isize,
    ) -> CFRunLoopSourceRef;

    pub fn CFMachPortInvalidate(port: CFMachPortRef);

    pub fn CFRunLoopGetCurrent() -> CFRunLoopRef;

    pub fn CFRunLoopAddSource(rl: CFRunLoopRef, source: CFRunLoopSourceRef, mode: CFStringRef);

    pub fn CFRunLoopStop(rl: CFRunLoopRef);

    pub fn CFNotificationCenterGetDistributedCenter() -> CFNotificationCenterRef;

    pub fn CFNotificationCenterAddObserver(
        center: CFNotificationCenterRef,
        observer: *const c_void,
        callback: CFNotificationCallback,
        name: CFStringRef,
        object: *const c_void,
        suspension_behavior: isize,
    );

    pub fn CFNotificationCenterRemoveObserver(
        center: CFNotificationCenterRef,
        observer: *const c_void,
        name: CFStringRef,
        object: *const c_void,
    );
}

// === Text input sources ===

pub type TISInputSourceRef = CFTypeRef;

pub const UC_KEY_ACTION_DOWN: u16 = 0;
pub const UC_KEY_TRANSLATE_NO_DEAD_KEYS: u32 = 1;

// === Carbon event manager (hotkeys) ===

pub type EventTargetRef = *mut c_void;
pub type EventHandlerRef = *mut c_void;
pub type EventHandlerCallRef = *mut c_void;
pub type EventRef = *mut c_void;
pub type EventHotKeyRef = *mut c_void;
pub type EventHandlerUPP = extern "C" fn(EventHandlerCallRef, EventRef, *mut c_void) -> i32;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct EventTypeSpec {
    pub event_class: u32,
    pub event_kind: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct EventHotKeyID {
    pub signature: u32,
    pub id: u32,
}

pub const NO_ERR: i32 = 0;
pub const EVENT_NOT_HANDLED_ERR: i32 = -9874;
pub const K_EVENT_CLASS_KEYBOARD: u32 = 0x6B65_7962; // 'keyb'
pub const K_EVENT_HOTKEY_PRESSED: u32 = 6;
pub const K_EVENT_PARAM_DIRECT_OBJECT: u32 = 0x2D2D_2D2D; // '----'
pub const TYPE_EVENT_HOTKEY_ID: u32 = 0x686B_6964; // 'hkid'

// Carbon modifier bits
pub const CMD_KEY: u32 = 1 << 8;
pub const SHIFT_KEY: u32 = 1 << 9;
pub const ALPHA_LOCK: u32 = 1 << 10;
pub const OPTION_KEY: u32 = 1 << 11;
pub const CONTROL_KEY: u32 = 1 << 12;

#[link(name = "Carbon", kind = "framework")]
extern "C" {
    pub static kTISPropertyUnicodeKeyLayoutData: CFStringRef;
    pub static kTISPropertyInputSourceID: CFStringRef;
    pub static kTISNotifySelectedKeyboardInputSourceChanged: CFStringRef;

    pub fn TISCopyCurrentKeyboardLayoutInputSource() -> TISInputSourceRef;

    pub fn TISGetInputSourceProperty(source: TISInputSourceRef, key: CFStringRef) -> CFTypeRef;

    pub fn UCKeyTranslate(
        key_layout: *const c_void,
        virtual_key_code: u16,
        key_action: u16,
        modifier_key_state: u32,
        keyboard_type: u32,
        key_translate_options: u32,
        dead_key_state: *mut u32,
        max_string_length: usize,
        actual_string_length: *mut usize,
        unicode_string: *mut u16,
    ) -> i32;

    pub fn LMGetKbdType() -> u8;

    pub fn RegisterEventHotKey(
        inHotKeyCode: u32,
        inHotKeyModifiers: u32,
        inHotKeyID: EventHotKeyID,
        inTarget: EventTargetRef,
        inOptions: u32,
        outRef: *mut EventHotKeyRef,
    ) -> i32;

    pub fn UnregisterEventHotKey(inHotKeyRef: EventHotKeyRef) -> i32;

    pub fn InstallEventHandler(
        inTarget: EventTargetRef,
        inHandler: EventHandlerUPP,
        inNumTypes: u32,
        inList: *const EventTypeSpec,
        inUserData: *mut c_void,
        outRef: *mut EventHandlerRef,
    ) -> i32;

    pub fn RemoveEventHandler(inHandlerRef: EventHandlerRef) -> i32;

    pub fn GetApplicationEventTarget() -> EventTargetRef;

    pub fn GetEventParameter(
        inEvent: EventRef,
        inName: u32,
        inDesiredType: u32,
        outActualType: *mut u32,
        inBufferSize: u32,
        outActualSize: *mut u32,
        outData: *mut c_void,
    ) -> i32;
}

// === libdispatch / pthread (libSystem) ===

#[repr(C)]
pub struct DispatchQueue {
    _private: [u8; 0],
}

extern "C" {
    static _dispatch_main_q: DispatchQueue;

    pub fn dispatch_async_f(
        queue: *const DispatchQueue,
        context: *mut c_void,
        work: extern "C" fn(*mut c_void),
    );

    pub fn pthread_main_np() -> i32;
}

/// The main dispatch queue, serviced by the main thread's run loop
pub fn main_queue() -> *const DispatchQueue {
    unsafe { std::ptr::addr_of!(_dispatch_main_q) }
}
