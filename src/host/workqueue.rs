//! Delayed work on top of tokio.
//!
//! Mirrors the kernel's `delayed_work`: one callback, at most one pending
//! timer, and a synchronous cancel that waits for a running callback and
//! refuses any re-arm while it does so.

use crate::error::{Error, Result};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Runtime the deferred callbacks execute on.
#[derive(Clone)]
pub struct Workqueue {
    handle: Handle,
}

impl Workqueue {
    /// The workqueue of the tokio runtime we are running in.
    pub fn system() -> Result<Self> {
        let handle = Handle::try_current().map_err(|_| Error::NoRuntime)?;
        Ok(Self { handle })
    }
}

type WorkFn = Box<dyn Fn(&DelayedWork) + Send + Sync>;

#[derive(Default)]
struct State {
    timer: Option<JoinHandle<()>>,
    // Bumped on every arm so a stale timer recognises itself.
    seq: u64,
    running: bool,
    canceling: bool,
}

struct Inner {
    func: WorkFn,
    queue: Workqueue,
    state: Mutex<State>,
    idle: Notify,
}

#[derive(Clone)]
pub struct DelayedWork {
    inner: Arc<Inner>,
}

impl DelayedWork {
    pub fn new<F>(queue: &Workqueue, func: F) -> Self
    where
        F: Fn(&DelayedWork) + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                func: Box::new(func),
                queue: queue.clone(),
                state: Mutex::new(State::default()),
                idle: Notify::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Arms the work to run after `delay`.
    ///
    /// Returns false if it was already pending or is being cancelled.
    pub fn schedule(&self, delay: Duration) -> bool {
        let mut state = self.state();
        if state.canceling || state.timer.is_some() {
            return false;
        }
        state.seq += 1;
        let seq = state.seq;
        // Weak, so an aborted timer never keeps the callback's captures alive.
        let inner = Arc::downgrade(&self.inner);
        state.timer = Some(self.inner.queue.handle.spawn(async move {
            sleep(delay).await;
            if let Some(inner) = inner.upgrade() {
                DelayedWork { inner }.run(seq);
            }
        }));
        true
    }

    pub fn is_pending(&self) -> bool {
        self.state().timer.is_some()
    }

    fn run(&self, seq: u64) {
        {
            let mut state = self.state();
            if state.seq != seq || state.timer.is_none() {
                return;
            }
            state.timer = None;
            state.running = true;
        }
        let _running = Running(self);
        (self.inner.func)(self);
    }

    /// Drops a pending timer without waiting for a running callback.
    pub fn cancel(&self) -> bool {
        match self.state().timer.take() {
            Some(timer) => {
                timer.abort();
                true
            }
            None => false,
        }
    }

    async fn wait_idle(&self) -> bool {
        let mut waited = false;
        loop {
            // Registered before the check so a wakeup in between is not lost.
            let idle = self.inner.idle.notified();
            if !self.state().running {
                return waited;
            }
            waited = true;
            idle.await;
        }
    }

    /// Waits for an in-flight invocation of the callback, if any.
    ///
    /// A pending timer stays armed.
    pub async fn flush(&self) -> bool {
        self.wait_idle().await
    }

    /// Cancels the work and waits until the callback is no longer running.
    ///
    /// Re-arming from inside the callback fails for the whole duration of the
    /// call, so once this returns nothing is pending and nothing is running.
    /// Returns whether a timer was pending.
    pub async fn cancel_sync(&self) -> bool {
        self.state().canceling = true;
        let pending = self.cancel();
        self.wait_idle().await;
        self.state().canceling = false;
        pending
    }
}

// Clears `running` even if the callback panics, so cancel_sync cannot hang.
struct Running<'a>(&'a DelayedWork);

impl Drop for Running<'_> {
    fn drop(&mut self) {
        self.0.state().running = false;
        self.0.inner.idle.notify_waiters();
    }
}
