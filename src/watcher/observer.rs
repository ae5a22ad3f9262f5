//! Resource-side half of a watch.
//!
//! Each watchable end keeps an [`ObserverList`] inside its own lock. Whenever
//! the end's signal state changes, the list is re-evaluated and matching
//! observers post a [`ReadyEvent`] into the inbox of the run loop that owns
//! the watcher. Posting never runs user code, so it is safe from any thread
//! and while holding the resource lock.

use crate::error::{Error, Result};
use crate::run_loop::queue::{Inbox, ReadyEvent};
use crate::signals::{Signals, SignalsState};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

pub(crate) type WatchId = u64;

static NEXT_WATCH_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_watch_id() -> WatchId {
    NEXT_WATCH_ID.fetch_add(1, Ordering::Relaxed)
}

/// What a watcher callback receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Notification {
    pub(crate) result: Result<()>,
    pub(crate) state: SignalsState,
}

impl Notification {
    pub(crate) fn is_terminal(&self) -> bool {
        self.result.is_err()
    }
}

pub(crate) struct Observer {
    id: WatchId,
    signals: Signals,
    inbox: Arc<Inbox>,
    // Set while a readiness event sits undispatched in the inbox.
    pending: Arc<AtomicBool>,
}

impl Observer {
    pub(crate) fn new(
        id: WatchId,
        signals: Signals,
        inbox: Arc<Inbox>,
        pending: Arc<AtomicBool>,
    ) -> Self {
        Self {
            id,
            signals,
            inbox,
            pending,
        }
    }

    /// Posts a readiness event unless one is already queued for this watch.
    fn post_ready(&self, state: SignalsState) {
        if self.pending.swap(true, Ordering::AcqRel) {
            return;
        }

        self.post(Ok(()), state);
    }

    fn post(&self, result: Result<()>, state: SignalsState) {
        self.inbox.push(ReadyEvent {
            id: self.id,
            notification: Notification { result, state },
        });
    }

    /// Evaluates `state` for this observer.
    ///
    /// Returns `false` once the watched signals can never be satisfied again,
    /// in which case the terminal notification has already been posted and
    /// the observer should be dropped.
    fn evaluate(&self, state: SignalsState) -> bool {
        if state.satisfies(self.signals) {
            self.post_ready(state);
            return true;
        }

        if !state.can_satisfy(self.signals) {
            self.post(Err(Error::FailedPrecondition), state);
            return false;
        }

        true
    }

    pub(crate) fn cancel(self, state: SignalsState) {
        self.post(Err(Error::Cancelled), state);
    }

    /// Delivers the terminal notification for a resource that cannot signal
    /// at all.
    pub(crate) fn reject(self) {
        self.post(Err(Error::FailedPrecondition), SignalsState::NEVER);
    }
}

/// Observers registered on one end of a resource.
#[derive(Default)]
pub(crate) struct ObserverList {
    observers: Vec<Observer>,
}

impl ObserverList {
    /// Registers `observer`, reporting the current state to it right away.
    pub(crate) fn add(&mut self, observer: Observer, state: SignalsState) {
        if observer.evaluate(state) {
            self.observers.push(observer);
        }
    }

    pub(crate) fn remove(&mut self, id: WatchId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|observer| observer.id != id);

        before != self.observers.len()
    }

    /// Re-evaluates every observer against a freshly computed state.
    pub(crate) fn notify(&mut self, state: SignalsState) {
        self.observers.retain(|observer| observer.evaluate(state));
    }

    /// Sends every observer its cancellation and forgets them.
    pub(crate) fn cancel_all(&mut self, state: SignalsState) {
        for observer in self.observers.drain(..) {
            observer.cancel(state);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.observers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observer(signals: Signals, inbox: &Arc<Inbox>) -> (Observer, Arc<AtomicBool>) {
        let pending = Arc::new(AtomicBool::new(false));
        let observer = Observer::new(next_watch_id(), signals, inbox.clone(), pending.clone());

        (observer, pending)
    }

    #[test]
    fn ready_events_coalesce_until_dispatched() {
        let inbox = Arc::new(Inbox::new());
        let (obs, pending) = observer(Signals::READABLE, &inbox);
        let readable = SignalsState::new(Signals::READABLE, Signals::all());

        let mut list = ObserverList::default();
        list.add(obs, readable);
        list.notify(readable);
        list.notify(readable);
        assert_eq!(inbox.take_all().len(), 1);

        pending.store(false, Ordering::Release);
        list.notify(readable);
        assert_eq!(inbox.take_all().len(), 1);
    }

    #[test]
    fn unsatisfiable_state_drops_observer() {
        let inbox = Arc::new(Inbox::new());
        let (obs, _) = observer(Signals::READABLE, &inbox);

        let mut list = ObserverList::default();
        list.add(obs, SignalsState::new(Signals::empty(), Signals::all()));
        assert_eq!(list.len(), 1);

        list.notify(SignalsState::new(Signals::PEER_CLOSED, Signals::PEER_CLOSED));
        assert_eq!(list.len(), 0);

        let events = inbox.take_all();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].notification.result, Err(Error::FailedPrecondition));
    }

    #[test]
    fn cancel_all_reports_cancelled() {
        let inbox = Arc::new(Inbox::new());
        let (a, _) = observer(Signals::READABLE, &inbox);
        let (b, _) = observer(Signals::WRITABLE, &inbox);
        let idle = SignalsState::new(Signals::empty(), Signals::all());

        let mut list = ObserverList::default();
        list.add(a, idle);
        list.add(b, idle);
        list.cancel_all(idle);

        let events = inbox.take_all();
        assert_eq!(events.len(), 2);
        assert!(
            events
                .iter()
                .all(|e| e.notification.result == Err(Error::Cancelled))
        );
    }
}
