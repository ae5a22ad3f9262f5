//! Resource variants owned by handle table entries.
//!
//! A [`Resource`] value is exactly one reference to one end: dropping it is
//! what closing a handle means. Moving it out of the table and into a
//! message is what sending a handle means. Operations that must run outside
//! the table lock work on a [`WatchTarget`], a non-owning view of the same
//! end.

use crate::data_pipe::pipe::{ConsumerEnd, DataPipe, ProducerEnd};
use crate::handle::ResourceKind;
use crate::message_pipe::pipe::{MessagePipe, MessagePipeEnd, Side};
use crate::shared_buffer::region::BufferHandle;
use crate::signals::SignalsState;
use crate::watcher::observer::{Observer, WatchId};

use std::sync::Arc;

pub(crate) enum Resource {
    MessagePipe(MessagePipeEnd),
    DataPipeProducer(ProducerEnd),
    DataPipeConsumer(ConsumerEnd),
    SharedBuffer(BufferHandle),
    Untyped(u64),
}

impl Resource {
    pub(crate) fn kind(&self) -> ResourceKind {
        match self {
            Resource::MessagePipe(_) => ResourceKind::MessagePipe,
            Resource::DataPipeProducer(_) => ResourceKind::DataPipeProducer,
            Resource::DataPipeConsumer(_) => ResourceKind::DataPipeConsumer,
            Resource::SharedBuffer(_) => ResourceKind::SharedBuffer,
            Resource::Untyped(_) => ResourceKind::Untyped,
        }
    }

    pub(crate) fn target(&self) -> WatchTarget {
        match self {
            Resource::MessagePipe(end) => WatchTarget::MessagePipe(end.pipe().clone(), end.side()),
            Resource::DataPipeProducer(end) => WatchTarget::Producer(end.pipe().clone()),
            Resource::DataPipeConsumer(end) => WatchTarget::Consumer(end.pipe().clone()),
            Resource::SharedBuffer(_) | Resource::Untyped(_) => WatchTarget::Inert,
        }
    }

    /// Returns `true` while a two-phase operation is outstanding on this end.
    pub(crate) fn is_busy(&self) -> bool {
        match self {
            Resource::DataPipeProducer(end) => end.pipe().has_two_phase_write(),
            Resource::DataPipeConsumer(end) => end.pipe().has_two_phase_read(),
            _ => false,
        }
    }

    /// Detaches everything bound to the sender's handle before the end moves
    /// into a message: armed watches get their cancellation.
    pub(crate) fn prepare_transfer(&self) {
        self.target().cancel_observers();
    }
}

/// Non-owning view of a resource end, used for signal queries and watches.
#[derive(Clone)]
pub(crate) enum WatchTarget {
    MessagePipe(Arc<MessagePipe>, Side),
    Producer(Arc<DataPipe>),
    Consumer(Arc<DataPipe>),
    /// Resources that never signal.
    Inert,
}

impl WatchTarget {
    pub(crate) fn state(&self) -> SignalsState {
        match self {
            WatchTarget::MessagePipe(pipe, side) => pipe.signals_state(*side),
            WatchTarget::Producer(pipe) => pipe.producer_state(),
            WatchTarget::Consumer(pipe) => pipe.consumer_state(),
            WatchTarget::Inert => SignalsState::NEVER,
        }
    }

    pub(crate) fn add_observer(&self, observer: Observer) {
        match self {
            WatchTarget::MessagePipe(pipe, side) => pipe.add_observer(*side, observer),
            WatchTarget::Producer(pipe) => pipe.add_producer_observer(observer),
            WatchTarget::Consumer(pipe) => pipe.add_consumer_observer(observer),
            WatchTarget::Inert => observer.reject(),
        }
    }

    pub(crate) fn remove_observer(&self, id: WatchId) {
        match self {
            WatchTarget::MessagePipe(pipe, side) => pipe.remove_observer(*side, id),
            WatchTarget::Producer(pipe) => pipe.remove_producer_observer(id),
            WatchTarget::Consumer(pipe) => pipe.remove_consumer_observer(id),
            WatchTarget::Inert => {}
        }
    }

    fn cancel_observers(&self) {
        match self {
            WatchTarget::MessagePipe(pipe, side) => pipe.cancel_observers(*side),
            WatchTarget::Producer(pipe) => pipe.cancel_producer_observers(),
            WatchTarget::Consumer(pipe) => pipe.cancel_consumer_observers(),
            WatchTarget::Inert => {}
        }
    }
}
