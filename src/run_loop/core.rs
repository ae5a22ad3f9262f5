//! Single-threaded cooperative dispatcher for watcher callbacks.
//!
//! A run loop only does work while its owner is inside [`RunLoop::run`] or
//! [`RunLoop::run_until_idle`]. Each pass drains, in order:
//!
//! 1. readiness events posted by resources (oldest first),
//! 2. tasks posted with [`RunLoop::post_task`],
//! 3. delayed tasks whose deadline has passed.
//!
//! Callbacks always run on the owning thread and never re-enter themselves,
//! because there is exactly one queue per loop and it is drained by one
//! caller at a time.

use crate::error::Result;
use crate::run_loop::context;
use crate::run_loop::queue::{Inbox, ReadyEvent};
use crate::run_loop::timer::{LocalTask, TimerQueue};
use crate::watcher::WatcherCell;
use crate::watcher::observer::WatchId;

use log::{debug, trace};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Handle to the current thread's run loop.
///
/// Cloning yields another reference to the same loop. The loop lives until
/// [`RunLoop::destroy`] is called, after which a new one may be created on
/// the thread.
#[derive(Clone)]
pub struct RunLoop {
    inner: Rc<RunLoopInner>,
}

struct RunLoopInner {
    inbox: Arc<Inbox>,
    handlers: RefCell<HashMap<WatchId, Rc<WatcherCell>>>,
    tasks: RefCell<VecDeque<LocalTask>>,
    timers: RefCell<TimerQueue>,
    quit: Cell<bool>,
    destroyed: Cell<bool>,
}

impl RunLoop {
    /// Creates the run loop for the calling thread and makes it current.
    ///
    /// # Errors
    /// [`Error::FailedPrecondition`](crate::Error::FailedPrecondition) if the
    /// thread already has a run loop.
    ///
    /// # Example
    /// ```ignore
    /// let run_loop = RunLoop::create_default()?;
    /// assert!(RunLoop::create_default().is_err());
    /// run_loop.destroy();
    /// ```
    pub fn create_default() -> Result<RunLoop> {
        let run_loop = context::install(|| RunLoop {
            inner: Rc::new(RunLoopInner {
                inbox: Arc::new(Inbox::new()),
                handlers: RefCell::new(HashMap::new()),
                tasks: RefCell::new(VecDeque::new()),
                timers: RefCell::new(TimerQueue::new()),
                quit: Cell::new(false),
                destroyed: Cell::new(false),
            }),
        })?;
        debug!("run loop created on {:?}", std::thread::current().id());

        Ok(run_loop)
    }

    /// Returns the calling thread's run loop, if one has been created.
    pub fn current() -> Option<RunLoop> {
        context::current()
    }

    /// Dispatches events until [`RunLoop::quit`] is called.
    ///
    /// Blocks the thread while there is nothing to do, waking for posted
    /// readiness events and delayed-task deadlines.
    pub fn run(&self) {
        loop {
            let did_work = self.dispatch_once();

            if self.inner.quit.replace(false) || self.inner.destroyed.get() {
                break;
            }

            if did_work || !self.inner.tasks.borrow().is_empty() {
                continue;
            }

            let timeout = self.inner.timers.borrow().next_remaining(Instant::now());
            self.inner.inbox.wait(timeout);
        }
    }

    /// Dispatches everything that is ready now, then returns without
    /// blocking. Delayed tasks that are not yet due stay queued.
    pub fn run_until_idle(&self) {
        while self.dispatch_once() {
            if self.inner.quit.replace(false) || self.inner.destroyed.get() {
                break;
            }
        }
    }

    /// Makes the innermost [`RunLoop::run`] return after the current callback.
    pub fn quit(&self) {
        self.inner.quit.set(true);
    }

    /// Queues `task` to run on the next dispatch pass.
    pub fn post_task<F>(&self, task: F)
    where
        F: FnOnce() + 'static,
    {
        if self.inner.destroyed.get() {
            return;
        }

        self.inner.tasks.borrow_mut().push_back(Box::new(task));
    }

    /// Queues `task` to run once `delay` has elapsed.
    ///
    /// # Example
    /// ```ignore
    /// let rl = run_loop.clone();
    /// run_loop.post_delayed_task(move || rl.quit(), Duration::from_millis(50));
    /// run_loop.run();
    /// ```
    pub fn post_delayed_task<F>(&self, task: F, delay: Duration)
    where
        F: FnOnce() + 'static,
    {
        if self.inner.destroyed.get() {
            return;
        }

        self.inner
            .timers
            .borrow_mut()
            .register(Instant::now() + delay, Box::new(task));
    }

    /// Tears the loop down and clears it as the thread's current loop.
    ///
    /// Armed watchers on this loop are cancelled without a callback; queued
    /// events and tasks are discarded.
    pub fn destroy(self) {
        if self.inner.destroyed.replace(true) {
            return;
        }

        context::uninstall(&self);
        self.inner.inbox.close();

        let cells: Vec<_> = self.inner.handlers.borrow_mut().drain().collect();
        for (_, cell) in cells {
            cell.detach();
        }

        self.inner.tasks.borrow_mut().clear();
        self.inner.timers.borrow_mut().clear();
        debug!("run loop destroyed on {:?}", std::thread::current().id());
    }

    /// Returns `true` once [`RunLoop::destroy`] has been called on any clone.
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }

    pub(crate) fn ptr_eq(&self, other: &RunLoop) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn inbox(&self) -> Arc<Inbox> {
        self.inner.inbox.clone()
    }

    pub(crate) fn register(&self, id: WatchId, cell: Rc<WatcherCell>) {
        self.inner.handlers.borrow_mut().insert(id, cell);
    }

    pub(crate) fn unregister(&self, id: WatchId) {
        self.inner.handlers.borrow_mut().remove(&id);
    }

    // One pass over every source of work. Returns whether anything ran.
    fn dispatch_once(&self) -> bool {
        let mut did_work = false;

        for event in self.inner.inbox.take_all() {
            if self.inner.destroyed.get() {
                return true;
            }
            did_work = true;
            self.dispatch(event);
        }

        let tasks = std::mem::take(&mut *self.inner.tasks.borrow_mut());
        for task in tasks {
            if self.inner.destroyed.get() {
                return true;
            }
            did_work = true;
            task();
        }

        let expired = self.inner.timers.borrow_mut().take_expired(Instant::now());
        for task in expired {
            if self.inner.destroyed.get() {
                return true;
            }
            did_work = true;
            trace!("run loop: delayed task due");
            task();
        }

        did_work
    }

    fn dispatch(&self, event: ReadyEvent) {
        let cell = if event.notification.is_terminal() {
            self.inner.handlers.borrow_mut().remove(&event.id)
        } else {
            self.inner.handlers.borrow().get(&event.id).cloned()
        };

        // Cancelled after the event was queued.
        let Some(cell) = cell else {
            trace!("run loop: dropping event for stale watch {}", event.id);
            return;
        };

        trace!(
            "run loop: dispatching watch {} ({:?})",
            event.id, event.notification.result
        );
        cell.fire(event.id, event.notification);
    }
}
