//! Main-thread dispatch through libdispatch

use std::ffi::c_void;
use std::panic::{self, AssertUnwindSafe};

use core_foundation::runloop::CFRunLoop;
use tracing::error;

use super::ffi::{dispatch_async_f, main_queue, pthread_main_np};
use crate::platform::{Job, MainThread};

/// The process main queue. Jobs run while the main run loop is running.
#[derive(Debug, Clone, Copy, Default)]
pub struct MainQueue;

impl MainThread for MainQueue {
    fn dispatch(&self, job: Job) {
        let context = Box::into_raw(Box::new(job)) as *mut c_void;
        unsafe { dispatch_async_f(main_queue(), context, run_job) };
    }

    fn is_main_thread(&self) -> bool {
        unsafe { pthread_main_np() != 0 }
    }
}

extern "C" fn run_job(context: *mut c_void) {
    let job = unsafe { Box::from_raw(context as *mut Job) };
    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
        error!("main-thread job panicked");
    }
}

/// Run the main run loop on the calling (main) thread until
/// [`stop_main_loop`] is called
pub fn run_main_loop() {
    CFRunLoop::run_current();
}

pub fn stop_main_loop() {
    CFRunLoop::get_main().stop();
}
