//! Watchers: callbacks invoked on a run loop when a handle's signals change.
//!
//! A [`Watcher`] is bound to one [`RunLoop`] for its whole life. Arming it
//! registers an observer on the watched end; every time the end's state
//! satisfies one of the watched signals, one readiness event is queued on
//! the loop and the callback runs from inside [`RunLoop::run`] or
//! [`RunLoop::run_until_idle`].
//!
//! # State machine
//!
//! ```text
//! Unarmed --start--> Armed --ready--> Firing --return--> Armed
//!                      |                 |
//!                      +----cancel-------+------> Cancelled --start--> Armed
//! ```
//!
//! A watch ends in `Cancelled` when it is cancelled explicitly (no callback),
//! when the watched handle is closed or sent away (one final callback with
//! [`Error::Cancelled`]), or when the watched signals can never be satisfied
//! again (one final callback with [`Error::FailedPrecondition`]).
//!
//! - [`observer`]: the half that lives inside resources

pub(crate) mod observer;

use crate::core::Core;
use crate::error::{Error, Result};
use crate::handle::Handle;
use crate::handle::resource::WatchTarget;
use crate::run_loop::RunLoop;
use crate::signals::{Signals, SignalsState};
use crate::watcher::observer::{Notification, Observer, WatchId, next_watch_id};

use log::trace;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

type Callback = Box<dyn FnMut(Result<()>, SignalsState)>;

/// Lifecycle of a [`Watcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    /// Never started.
    Unarmed,
    /// Observing a handle.
    Armed,
    /// Inside its callback.
    Firing,
    /// Stopped; may be started again.
    Cancelled,
}

struct ArmedWatch {
    id: WatchId,
    handle: Handle,
    target: WatchTarget,
    pending: Arc<AtomicBool>,
}

/// Loop-side half of a watcher, shared between the [`Watcher`] and the run
/// loop's handler map.
pub(crate) struct WatcherCell {
    state: Cell<WatcherState>,
    armed: RefCell<Option<ArmedWatch>>,
    callback: RefCell<Option<Callback>>,
}

impl WatcherCell {
    fn new() -> Self {
        Self {
            state: Cell::new(WatcherState::Unarmed),
            armed: RefCell::new(None),
            callback: RefCell::new(None),
        }
    }

    fn is_current(&self, id: WatchId) -> bool {
        matches!(&*self.armed.borrow(), Some(armed) if armed.id == id)
    }

    /// Runs the callback for one dispatched event.
    ///
    /// No borrow is held across the callback, so it may cancel or restart
    /// its own watcher.
    pub(crate) fn fire(&self, id: WatchId, notification: Notification) {
        if !self.is_current(id) {
            return;
        }

        let terminal = notification.is_terminal();
        if terminal {
            self.armed.borrow_mut().take();
        } else if let Some(armed) = &*self.armed.borrow() {
            // Changes made from here on need a fresh event.
            armed.pending.store(false, Ordering::Release);
        }

        let Some(mut callback) = self.callback.borrow_mut().take() else {
            return;
        };

        self.state.set(WatcherState::Firing);
        callback(notification.result, notification.state);

        if self.is_current(id) {
            *self.callback.borrow_mut() = Some(callback);
            self.state.set(WatcherState::Armed);
        } else if self.armed.borrow().is_none() {
            self.state.set(WatcherState::Cancelled);
        }
    }

    /// Disarms without a callback. Used when the owning loop goes away.
    pub(crate) fn detach(&self) {
        let armed = self.armed.borrow_mut().take();
        if let Some(armed) = armed {
            armed.target.remove_observer(armed.id);
        }

        self.callback.borrow_mut().take();
        if self.state.get() != WatcherState::Unarmed {
            self.state.set(WatcherState::Cancelled);
        }
    }
}

/// Runs a callback on a run loop whenever a handle's signals are satisfied.
///
/// Callbacks for one watcher never overlap: they run one at a time on the
/// loop's thread. Dropping the watcher cancels it.
///
/// # Example
/// ```ignore
/// let run_loop = RunLoop::create_default()?;
/// let mut watcher = Watcher::new(&run_loop);
/// watcher.start(&core, consumer, Signals::READABLE, |result, state| {
///     println!("{:?} {:?}", result, state.satisfied);
/// })?;
/// core.write_data(producer, b"x", WriteDataFlags::empty())?;
/// run_loop.run_until_idle();
/// ```
pub struct Watcher {
    run_loop: RunLoop,
    cell: Rc<WatcherCell>,
}

impl Watcher {
    /// Creates an unarmed watcher bound to `run_loop`.
    pub fn new(run_loop: &RunLoop) -> Self {
        Self {
            run_loop: run_loop.clone(),
            cell: Rc::new(WatcherCell::new()),
        }
    }

    /// Starts watching `handle` for any of `signals`.
    ///
    /// If the handle already satisfies one of the signals, the first callback
    /// is queued right away.
    ///
    /// # Arguments
    /// * `core` - The core `handle` belongs to
    /// * `handle` - Handle to watch
    /// * `signals` - Signals of interest; the callback fires when any is set
    /// * `callback` - Receives `Ok(())` on readiness, or a terminal error
    ///
    /// # Errors
    /// - [`Error::InvalidArgument`] if the watcher is already armed, `handle`
    ///   is not live, or `signals` is empty
    /// - [`Error::FailedPrecondition`] if the run loop was destroyed
    pub fn start<F>(&mut self, core: &Core, handle: Handle, signals: Signals, callback: F) -> Result<()>
    where
        F: FnMut(Result<()>, SignalsState) + 'static,
    {
        if self.cell.armed.borrow().is_some() || signals.is_empty() {
            return Err(Error::InvalidArgument);
        }
        if self.run_loop.is_destroyed() {
            return Err(Error::FailedPrecondition);
        }

        let id = next_watch_id();
        let pending = Arc::new(AtomicBool::new(false));
        let observer = Observer::new(id, signals, self.run_loop.inbox(), pending.clone());

        // Holding the table lock keeps the handle from closing or moving
        // before the observer is in place.
        let target = core
            .with_resource(handle, |resource| {
                let target = resource.target();
                target.add_observer(observer);
                Ok(target)
            })
            .map_err(|_| Error::InvalidArgument)?;

        *self.cell.armed.borrow_mut() = Some(ArmedWatch {
            id,
            handle,
            target,
            pending,
        });
        *self.cell.callback.borrow_mut() = Some(Box::new(callback));
        self.cell.state.set(WatcherState::Armed);
        self.run_loop.register(id, self.cell.clone());
        trace!("watch {} armed on {:?} for {:?}", id, handle, signals);

        Ok(())
    }

    /// Stops watching. Queued events for this watch are dropped and the
    /// callback is not invoked. Calling it again, or on an unarmed watcher,
    /// does nothing.
    pub fn cancel(&mut self) {
        let armed = self.cell.armed.borrow_mut().take();
        let Some(armed) = armed else {
            return;
        };

        armed.target.remove_observer(armed.id);
        self.run_loop.unregister(armed.id);
        self.cell.callback.borrow_mut().take();
        self.cell.state.set(WatcherState::Cancelled);
        trace!("watch {} cancelled", armed.id);
    }

    /// Cancels the watcher and releases it.
    pub fn destroy(mut self) {
        self.cancel();
    }

    pub fn state(&self) -> WatcherState {
        self.cell.state.get()
    }

    pub fn is_armed(&self) -> bool {
        self.cell.armed.borrow().is_some()
    }

    /// The handle currently being watched, if armed.
    pub fn handle(&self) -> Option<Handle> {
        self.cell.armed.borrow().as_ref().map(|armed| armed.handle)
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        self.cancel();
    }
}
