//! Two-ended message queue shared by both endpoints of a pipe.
//!
//! Both directions live behind one lock, so a write, a read and a close on
//! either end are totally ordered and every signal change is observed
//! consistently by both sides.

use crate::error::{Error, Result};
use crate::message_pipe::message::PendingMessage;
use crate::signals::{Signals, SignalsState};
use crate::watcher::observer::{Observer, ObserverList, WatchId};

use log::{debug, trace, warn};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Side {
    A,
    B,
}

impl Side {
    fn index(self) -> usize {
        match self {
            Side::A => 0,
            Side::B => 1,
        }
    }

    fn peer(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

pub(crate) struct MessagePipe {
    state: Mutex<PipeState>,
}

struct PipeState {
    ends: [EndState; 2],
}

struct EndState {
    open: bool,
    /// Messages waiting to be read on this end.
    incoming: VecDeque<PendingMessage>,
    observers: ObserverList,
}

impl EndState {
    fn new() -> Self {
        Self {
            open: true,
            incoming: VecDeque::new(),
            observers: ObserverList::default(),
        }
    }
}

impl PipeState {
    fn end(&mut self, side: Side) -> &mut EndState {
        &mut self.ends[side.index()]
    }

    fn signals(&self, side: Side) -> SignalsState {
        let readable = !self.ends[side.index()].incoming.is_empty();
        let peer_open = self.ends[side.peer().index()].open;

        let mut satisfied = Signals::empty();
        let mut satisfiable = Signals::PEER_CLOSED;

        if readable {
            satisfied |= Signals::READABLE;
            satisfiable |= Signals::READABLE;
        }

        if peer_open {
            satisfied |= Signals::WRITABLE;
            satisfiable |= Signals::READABLE | Signals::WRITABLE;
        } else {
            satisfied |= Signals::PEER_CLOSED;
        }

        SignalsState::new(satisfied, satisfiable)
    }

    fn notify(&mut self, side: Side) {
        let state = self.signals(side);
        self.end(side).observers.notify(state);
    }
}

impl MessagePipe {
    /// Creates a pipe and returns its two owned ends.
    pub(crate) fn new() -> (MessagePipeEnd, MessagePipeEnd) {
        let pipe = Arc::new(MessagePipe {
            state: Mutex::new(PipeState {
                ends: [EndState::new(), EndState::new()],
            }),
        });
        debug!("message pipe created");

        (
            MessagePipeEnd {
                pipe: pipe.clone(),
                side: Side::A,
            },
            MessagePipeEnd {
                pipe,
                side: Side::B,
            },
        )
    }

    pub(crate) fn signals_state(&self, side: Side) -> SignalsState {
        self.state.lock().signals(side)
    }

    pub(crate) fn is_peer_open(&self, side: Side) -> bool {
        self.state.lock().ends[side.peer().index()].open
    }

    /// Queues `message` for the peer of `from`.
    ///
    /// If the peer closed in the meantime the message is handed back so the
    /// caller can drop it (and its cargo) outside the lock.
    pub(crate) fn enqueue(&self, from: Side, message: PendingMessage) -> Option<PendingMessage> {
        let to = from.peer();
        let mut state = self.state.lock();

        if !state.end(to).open {
            return Some(message);
        }

        trace!(
            "message pipe: enqueue {} bytes, {} handles",
            message.bytes.len(),
            message.cargo.len()
        );
        state.end(to).incoming.push_back(message);
        state.notify(to);

        None
    }

    /// Pops the oldest message for `side`.
    ///
    /// `room` is how many cargo handles the caller can still mint; a message
    /// carrying more stays queued and the call fails with
    /// [`Error::ResourceExhausted`].
    pub(crate) fn dequeue(&self, side: Side, room: usize) -> Result<PendingMessage> {
        let mut state = self.state.lock();

        if state
            .end(side)
            .incoming
            .front()
            .is_some_and(|front| front.cargo.len() > room)
        {
            return Err(Error::ResourceExhausted);
        }

        let Some(message) = state.end(side).incoming.pop_front() else {
            return if state.ends[side.peer().index()].open {
                Err(Error::ShouldWait)
            } else {
                Err(Error::PeerClosed)
            };
        };
        state.notify(side);

        Ok(message)
    }

    pub(crate) fn add_observer(&self, side: Side, observer: Observer) {
        let mut state = self.state.lock();

        if !state.end(side).open {
            observer.cancel(SignalsState::NEVER);
            return;
        }

        let current = state.signals(side);
        state.end(side).observers.add(observer, current);
    }

    pub(crate) fn remove_observer(&self, side: Side, id: WatchId) {
        self.state.lock().end(side).observers.remove(id);
    }

    pub(crate) fn cancel_observers(&self, side: Side) {
        let mut state = self.state.lock();
        let current = state.signals(side);
        state.end(side).observers.cancel_all(current);
    }

    fn close(&self, side: Side) {
        let orphaned = {
            let mut state = self.state.lock();
            let current = state.signals(side);
            let end = state.end(side);

            end.open = false;
            end.observers.cancel_all(current);
            let orphaned = std::mem::take(&mut end.incoming);

            state.notify(side.peer());
            orphaned
        };

        let cargo: usize = orphaned.iter().map(|m| m.cargo.len()).sum();
        if cargo > 0 {
            warn!(
                "message pipe end closed with {} unread messages carrying {} handles",
                orphaned.len(),
                cargo
            );
        }
        debug!("message pipe end {:?} closed", side);

        // Cargo closes here, outside the pipe lock; it may be the peer end.
        drop(orphaned);
    }
}

/// Owned reference to one end of a message pipe. Dropping it closes the end.
pub(crate) struct MessagePipeEnd {
    pipe: Arc<MessagePipe>,
    side: Side,
}

impl MessagePipeEnd {
    pub(crate) fn pipe(&self) -> &Arc<MessagePipe> {
        &self.pipe
    }

    pub(crate) fn side(&self) -> Side {
        self.side
    }
}

impl Drop for MessagePipeEnd {
    fn drop(&mut self) {
        self.pipe.close(self.side);
    }
}
