//! Thread-safe inbox of readiness events for one run loop.
//!
//! Resources post into the inbox from whichever thread changed their state;
//! only the owning run loop drains it. Events come out in the order they were
//! posted.

use crate::watcher::observer::{Notification, WatchId};

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// A readiness transition observed for one armed watch.
#[derive(Debug)]
pub(crate) struct ReadyEvent {
    pub(crate) id: WatchId,
    pub(crate) notification: Notification,
}

/// FIFO queue of [`ReadyEvent`]s with a condition variable for idle waits.
pub(crate) struct Inbox {
    events: Mutex<VecDeque<ReadyEvent>>,
    ready: Condvar,
    closed: AtomicBool,
}

impl Inbox {
    pub(crate) fn new() -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            ready: Condvar::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Enqueues an event and wakes the run loop if it is idle.
    ///
    /// Events posted after [`Inbox::close`] are dropped.
    pub(crate) fn push(&self, event: ReadyEvent) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }

        self.events.lock().push_back(event);
        self.ready.notify_one();
    }

    /// Takes every queued event, oldest first.
    pub(crate) fn take_all(&self) -> VecDeque<ReadyEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Blocks until an event arrives or `timeout` elapses.
    ///
    /// Returns immediately if events are already queued.
    pub(crate) fn wait(&self, timeout: Option<Duration>) {
        let mut events = self.events.lock();
        if !events.is_empty() {
            return;
        }

        match timeout {
            Some(timeout) => {
                self.ready.wait_for(&mut events, timeout);
            }
            None => self.ready.wait(&mut events),
        }
    }

    /// Stops accepting events and discards anything still queued.
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.events.lock().clear();
        self.ready.notify_all();
    }
}
