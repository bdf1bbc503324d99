//! Debounced, cancellable delayed tasks
//!
//! Every delayed action in the engine (layout rebuilds, tap enable/disable)
//! goes through [`Debounced`]: scheduling cancels whatever is still pending
//! in the same slot, waits out the delay on the tokio runtime, then hands
//! the job to the UI thread. Cancellation is checked again on the UI thread
//! so a job queued just before a cancel never runs.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::platform::MainThread;

/// Factory for delayed tasks sharing one runtime and one UI thread
#[derive(Clone)]
pub struct Scheduler {
    runtime: Handle,
    main: Arc<dyn MainThread>,
    root: CancellationToken,
}

impl Scheduler {
    pub fn new(runtime: Handle, main: Arc<dyn MainThread>) -> Self {
        Self {
            runtime,
            main,
            root: CancellationToken::new(),
        }
    }

    /// A new debounce slot. Tasks in the slot are also cancelled by
    /// [`Scheduler::shutdown`].
    pub fn debounced(&self, name: &'static str, delay: Duration) -> Debounced {
        Debounced {
            name,
            delay,
            runtime: self.runtime.clone(),
            main: Arc::clone(&self.main),
            root: self.root.child_token(),
            pending: Mutex::new(None),
        }
    }

    pub fn main_thread(&self) -> &Arc<dyn MainThread> {
        &self.main
    }

    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    /// Token cancelled on shutdown, for long-running helper tasks
    pub fn shutdown_token(&self) -> CancellationToken {
        self.root.child_token()
    }

    /// Cancel every outstanding task created by this scheduler
    pub fn shutdown(&self) {
        self.root.cancel();
    }
}

/// One debounce slot: at most one job is pending at a time
pub struct Debounced {
    name: &'static str,
    delay: Duration,
    runtime: Handle,
    main: Arc<dyn MainThread>,
    root: CancellationToken,
    pending: Mutex<Option<CancellationToken>>,
}

impl Debounced {
    /// Run `job` on the UI thread after the delay, replacing any job that
    /// has not run yet
    pub fn schedule<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let token = self.root.child_token();
        if let Some(previous) = self.pending.lock().replace(token.clone()) {
            if !previous.is_cancelled() {
                trace!(task = self.name, "superseding pending task");
            }
            previous.cancel();
        }

        let name = self.name;
        let delay = self.delay;
        let main = Arc::clone(&self.main);
        let cancelled = token.clone();

        self.runtime.spawn(async move {
            tokio::select! {
                biased;
                _ = cancelled.cancelled() => {
                    trace!(task = name, "delayed task cancelled");
                }
                _ = tokio::time::sleep(delay) => {
                    main.dispatch(Box::new(move || {
                        if token.is_cancelled() {
                            trace!(task = name, "delayed task cancelled before running");
                            return;
                        }
                        job();
                        // Finished jobs read as no longer pending
                        token.cancel();
                    }));
                }
            }
        });
    }

    /// Cancel the pending job, if any
    pub fn cancel(&self) {
        if let Some(token) = self.pending.lock().take() {
            token.cancel();
        }
    }

    /// Whether a job is scheduled and has neither run nor been cancelled
    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Drop for Debounced {
    fn drop(&mut self) {
        self.root.cancel();
    }
}
