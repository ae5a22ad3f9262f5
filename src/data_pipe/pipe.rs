//! Shared state of a data pipe: the ring, both ends' liveness and the
//! two-phase bookkeeping.
//!
//! All bookkeeping sits behind one lock, and every checked byte copy happens
//! under it. Only the raw slices of a two-phase region bypass it; the open
//! phase keeps the other side out of those bytes.

use crate::data_pipe::region::{ReadRegion, WriteRegion};
use crate::data_pipe::ring::{Cursor, RingStorage};
use crate::data_pipe::{ReadDataFlags, WriteDataFlags};
use crate::error::{Error, Result};
use crate::signals::{Signals, SignalsState};
use crate::watcher::observer::{Observer, ObserverList, WatchId};

use log::{debug, trace};
use parking_lot::Mutex;
use std::ptr;
use std::sync::Arc;

/// An outstanding two-phase operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Phase {
    pub(crate) epoch: u64,
    pub(crate) offset: usize,
    pub(crate) len: usize,
}

pub(crate) struct DataPipe {
    element_num_bytes: usize,
    storage: RingStorage,
    state: Mutex<DataPipeState>,
}

struct DataPipeState {
    cursor: Cursor,
    producer_open: bool,
    consumer_open: bool,
    write_phase: Option<Phase>,
    read_phase: Option<Phase>,
    next_epoch: u64,
    /// Data was committed since the consumer last read.
    new_data: bool,
    producer_observers: ObserverList,
    consumer_observers: ObserverList,
}

impl DataPipeState {
    fn producer_signals(&self) -> SignalsState {
        if !self.consumer_open {
            return SignalsState::new(Signals::PEER_CLOSED, Signals::PEER_CLOSED);
        }

        let mut satisfied = Signals::empty();
        if self.cursor.free() > 0 && self.write_phase.is_none() {
            satisfied |= Signals::WRITABLE;
        }

        SignalsState::new(satisfied, Signals::WRITABLE | Signals::PEER_CLOSED)
    }

    fn consumer_signals(&self) -> SignalsState {
        let available = self.cursor.len() > 0;

        let mut satisfied = Signals::empty();
        if available && self.read_phase.is_none() {
            satisfied |= Signals::READABLE;
        }
        if available && self.new_data {
            satisfied |= Signals::NEW_DATA_READABLE;
        }

        let satisfiable = if self.producer_open {
            Signals::READABLE | Signals::NEW_DATA_READABLE | Signals::PEER_CLOSED
        } else {
            satisfied |= Signals::PEER_CLOSED;

            // Whatever is buffered is all that will ever arrive.
            let mut remaining = Signals::PEER_CLOSED;
            if available {
                remaining |= Signals::READABLE;
            }
            if available && self.new_data {
                remaining |= Signals::NEW_DATA_READABLE;
            }
            remaining
        };

        SignalsState::new(satisfied, satisfiable)
    }

    fn notify(&mut self) {
        if self.producer_open {
            let state = self.producer_signals();
            self.producer_observers.notify(state);
        }
        if self.consumer_open {
            let state = self.consumer_signals();
            self.consumer_observers.notify(state);
        }
    }

    fn begin_phase(&mut self, offset: usize, len: usize) -> Phase {
        self.next_epoch += 1;

        Phase {
            epoch: self.next_epoch,
            offset,
            len,
        }
    }

    /// The error for "nothing to read right now".
    fn empty_error(&self) -> Error {
        if self.producer_open {
            Error::ShouldWait
        } else {
            Error::PeerClosed
        }
    }
}

impl DataPipe {
    /// Creates a pipe and returns its two owned ends.
    ///
    /// Callers validate the geometry: `element_num_bytes` is non-zero and
    /// divides `capacity_num_bytes`, which is non-zero.
    pub(crate) fn new(
        element_num_bytes: usize,
        capacity_num_bytes: usize,
    ) -> (ProducerEnd, ConsumerEnd) {
        debug_assert!(element_num_bytes > 0);
        debug_assert!(capacity_num_bytes > 0 && capacity_num_bytes % element_num_bytes == 0);

        let pipe = Arc::new(DataPipe {
            element_num_bytes,
            storage: RingStorage::new(capacity_num_bytes),
            state: Mutex::new(DataPipeState {
                cursor: Cursor::new(capacity_num_bytes),
                producer_open: true,
                consumer_open: true,
                write_phase: None,
                read_phase: None,
                next_epoch: 0,
                new_data: false,
                producer_observers: ObserverList::default(),
                consumer_observers: ObserverList::default(),
            }),
        });
        debug!(
            "data pipe created: {} bytes, {}-byte elements",
            capacity_num_bytes, element_num_bytes
        );

        (
            ProducerEnd { pipe: pipe.clone() },
            ConsumerEnd { pipe },
        )
    }

    pub(crate) fn element_num_bytes(&self) -> usize {
        self.element_num_bytes
    }

    pub(crate) fn capacity_num_bytes(&self) -> usize {
        self.storage.capacity()
    }

    pub(crate) fn storage(&self) -> &RingStorage {
        &self.storage
    }

    fn is_whole(&self, num_bytes: usize) -> bool {
        num_bytes % self.element_num_bytes == 0
    }

    pub(crate) fn has_two_phase_write(&self) -> bool {
        self.state.lock().write_phase.is_some()
    }

    pub(crate) fn has_two_phase_read(&self) -> bool {
        self.state.lock().read_phase.is_some()
    }

    pub(crate) fn producer_state(&self) -> SignalsState {
        self.state.lock().producer_signals()
    }

    pub(crate) fn consumer_state(&self) -> SignalsState {
        self.state.lock().consumer_signals()
    }

    /// Copies as many whole elements of `data` as fit.
    pub(crate) fn write(&self, data: &[u8], flags: WriteDataFlags) -> Result<usize> {
        if !self.is_whole(data.len()) {
            return Err(Error::InvalidArgument);
        }

        let mut state = self.state.lock();
        if state.write_phase.is_some() {
            return Err(Error::Busy);
        }
        if !state.consumer_open {
            return Err(Error::PeerClosed);
        }
        if data.is_empty() {
            return Ok(0);
        }

        let free = state.cursor.free();
        if free == 0 || (flags.contains(WriteDataFlags::ALL_OR_NONE) && free < data.len()) {
            return Err(Error::ShouldWait);
        }

        // Free space is always a whole number of elements.
        let n = free.min(data.len());
        let start = state.cursor.write_pos();
        unsafe { self.storage.copy_in(start, &data[..n]) };

        state.cursor.commit(n);
        state.new_data = true;
        state.notify();
        trace!("data pipe: wrote {} bytes", n);

        Ok(n)
    }

    /// Opens a two-phase write over the contiguous free space at the write
    /// position.
    pub(crate) fn begin_write(
        self: &Arc<Self>,
        size_hint: usize,
        flags: WriteDataFlags,
    ) -> Result<WriteRegion> {
        if !self.is_whole(size_hint) {
            return Err(Error::InvalidArgument);
        }

        let mut state = self.state.lock();
        if state.write_phase.is_some() {
            return Err(Error::Busy);
        }
        if !state.consumer_open {
            return Err(Error::PeerClosed);
        }

        let len = state.cursor.contiguous_free();
        if len == 0 || (flags.contains(WriteDataFlags::ALL_OR_NONE) && len < size_hint) {
            return Err(Error::ShouldWait);
        }

        let offset = state.cursor.write_pos();
        let phase = state.begin_phase(offset, len);
        state.write_phase = Some(phase);
        state.notify();

        Ok(WriteRegion::new(self.clone(), phase))
    }

    /// Commits `num_bytes` of the open write region.
    ///
    /// A bad count still ends the phase: nothing is committed.
    pub(crate) fn end_write(&self, num_bytes: usize) -> Result<()> {
        let mut state = self.state.lock();
        let phase = state.write_phase.take().ok_or(Error::FailedPrecondition)?;

        let result = if !self.is_whole(num_bytes) || num_bytes > phase.len {
            Err(Error::InvalidArgument)
        } else {
            // Once the consumer is gone the bytes have nowhere to go.
            if state.consumer_open && num_bytes > 0 {
                debug_assert_eq!(phase.offset, state.cursor.write_pos());
                state.cursor.commit(num_bytes);
                state.new_data = true;
            }
            Ok(())
        };

        state.notify();
        result
    }

    /// Copies whole elements into `buf`, consuming them unless `PEEK` is set.
    pub(crate) fn read(&self, buf: &mut [u8], flags: ReadDataFlags) -> Result<usize> {
        if !self.is_whole(buf.len()) {
            return Err(Error::InvalidArgument);
        }

        let mut state = self.state.lock();
        if state.read_phase.is_some() {
            return Err(Error::Busy);
        }

        let available = state.cursor.len();
        if available == 0 {
            return Err(state.empty_error());
        }
        if buf.is_empty() {
            return Ok(0);
        }
        if flags.contains(ReadDataFlags::ALL_OR_NONE) && available < buf.len() {
            return Err(state.empty_error());
        }

        let n = available.min(buf.len());
        let start = state.cursor.read_pos();
        unsafe { self.storage.copy_out(start, &mut buf[..n]) };

        if !flags.contains(ReadDataFlags::PEEK) {
            state.cursor.consume(n);
            state.new_data = false;
            state.notify();
        }
        trace!("data pipe: read {} bytes", n);

        Ok(n)
    }

    /// Drops up to `num_bytes` of buffered data without copying it.
    pub(crate) fn discard(&self, num_bytes: usize, flags: ReadDataFlags) -> Result<usize> {
        if !self.is_whole(num_bytes) {
            return Err(Error::InvalidArgument);
        }

        let mut state = self.state.lock();
        if state.read_phase.is_some() {
            return Err(Error::Busy);
        }
        if num_bytes == 0 {
            return Ok(0);
        }

        let available = state.cursor.len();
        if available == 0
            || (flags.contains(ReadDataFlags::ALL_OR_NONE) && available < num_bytes)
        {
            return Err(state.empty_error());
        }

        let n = available.min(num_bytes);
        state.cursor.consume(n);
        state.new_data = false;
        state.notify();

        Ok(n)
    }

    /// Opens a two-phase read over the contiguous committed bytes at the read
    /// position.
    pub(crate) fn begin_read(
        self: &Arc<Self>,
        size_hint: usize,
        flags: ReadDataFlags,
    ) -> Result<ReadRegion> {
        if !self.is_whole(size_hint) {
            return Err(Error::InvalidArgument);
        }

        let mut state = self.state.lock();
        if state.read_phase.is_some() {
            return Err(Error::Busy);
        }

        let len = state.cursor.contiguous_readable();
        if len == 0 || (flags.contains(ReadDataFlags::ALL_OR_NONE) && len < size_hint) {
            return Err(state.empty_error());
        }

        let offset = state.cursor.read_pos();
        let phase = state.begin_phase(offset, len);
        state.read_phase = Some(phase);
        state.new_data = false;
        state.notify();

        Ok(ReadRegion::new(self.clone(), phase))
    }

    /// Consumes `num_bytes` of the open read region.
    ///
    /// A bad count still ends the phase: nothing is consumed.
    pub(crate) fn end_read(&self, num_bytes: usize) -> Result<()> {
        let mut state = self.state.lock();
        let phase = state.read_phase.take().ok_or(Error::FailedPrecondition)?;

        let result = if !self.is_whole(num_bytes) || num_bytes > phase.len {
            Err(Error::InvalidArgument)
        } else {
            debug_assert_eq!(phase.offset, state.cursor.read_pos());
            state.cursor.consume(num_bytes);
            Ok(())
        };

        state.notify();
        result
    }

    /// Bytes currently buffered.
    pub(crate) fn available(&self) -> usize {
        self.state.lock().cursor.len()
    }

    /// Copies `data` into the region of `phase`, which must still be the
    /// open write phase. Bounds are checked by the caller.
    pub(crate) fn copy_into_phase(&self, phase: Phase, offset: usize, data: &[u8]) -> Result<()> {
        let state = self.state.lock();
        if !matches!(state.write_phase, Some(open) if open.epoch == phase.epoch) {
            return Err(Error::FailedPrecondition);
        }

        debug_assert!(offset + data.len() <= phase.len);
        unsafe {
            let dst = self.storage.ptr_at(phase.offset + offset);
            ptr::copy_nonoverlapping(data.as_ptr(), dst, data.len());
        }

        Ok(())
    }

    /// Copies out of the region of `phase`, which must still be the open
    /// read phase. Bounds are checked by the caller.
    pub(crate) fn copy_from_phase(&self, phase: Phase, offset: usize, buf: &mut [u8]) -> Result<()> {
        let state = self.state.lock();
        if !matches!(state.read_phase, Some(open) if open.epoch == phase.epoch) {
            return Err(Error::FailedPrecondition);
        }

        debug_assert!(offset + buf.len() <= phase.len);
        unsafe {
            let src = self.storage.ptr_at(phase.offset + offset);
            ptr::copy_nonoverlapping(src, buf.as_mut_ptr(), buf.len());
        }

        Ok(())
    }

    pub(crate) fn add_producer_observer(&self, observer: Observer) {
        let mut state = self.state.lock();
        if !state.producer_open {
            observer.cancel(SignalsState::NEVER);
            return;
        }

        let current = state.producer_signals();
        state.producer_observers.add(observer, current);
    }

    pub(crate) fn add_consumer_observer(&self, observer: Observer) {
        let mut state = self.state.lock();
        if !state.consumer_open {
            observer.cancel(SignalsState::NEVER);
            return;
        }

        let current = state.consumer_signals();
        state.consumer_observers.add(observer, current);
    }

    pub(crate) fn remove_producer_observer(&self, id: WatchId) {
        self.state.lock().producer_observers.remove(id);
    }

    pub(crate) fn remove_consumer_observer(&self, id: WatchId) {
        self.state.lock().consumer_observers.remove(id);
    }

    pub(crate) fn cancel_producer_observers(&self) {
        let mut state = self.state.lock();
        let current = state.producer_signals();
        state.producer_observers.cancel_all(current);
    }

    pub(crate) fn cancel_consumer_observers(&self) {
        let mut state = self.state.lock();
        let current = state.consumer_signals();
        state.consumer_observers.cancel_all(current);
    }

    fn close_producer(&self) {
        let mut state = self.state.lock();
        let current = state.producer_signals();

        state.producer_open = false;
        if state.write_phase.take().is_some() {
            debug!("data pipe: producer closed with a two-phase write open");
        }
        state.producer_observers.cancel_all(current);
        state.notify();
        debug!("data pipe producer closed, {} bytes left", state.cursor.len());
    }

    fn close_consumer(&self) {
        let mut state = self.state.lock();
        let current = state.consumer_signals();

        state.consumer_open = false;
        state.read_phase = None;
        if state.cursor.len() > 0 {
            debug!("data pipe: consumer closed, discarding {} bytes", state.cursor.len());
        }
        state.cursor.clear();
        state.new_data = false;
        state.consumer_observers.cancel_all(current);
        state.notify();
    }
}

/// Owned producer end. Dropping it closes the end.
pub(crate) struct ProducerEnd {
    pipe: Arc<DataPipe>,
}

impl ProducerEnd {
    pub(crate) fn pipe(&self) -> &Arc<DataPipe> {
        &self.pipe
    }
}

impl Drop for ProducerEnd {
    fn drop(&mut self) {
        self.pipe.close_producer();
    }
}

/// Owned consumer end. Dropping it closes the end.
pub(crate) struct ConsumerEnd {
    pipe: Arc<DataPipe>,
}

impl ConsumerEnd {
    pub(crate) fn pipe(&self) -> &Arc<DataPipe> {
        &self.pipe
    }
}

impl Drop for ConsumerEnd {
    fn drop(&mut self) {
        self.pipe.close_consumer();
    }
}
