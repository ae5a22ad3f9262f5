//! Data pipes: unidirectional byte streams with a bounded ring buffer.
//!
//! A data pipe has a producer end and a consumer end. Data moves in whole
//! elements of a fixed size chosen at creation. Besides copying reads and
//! writes, both ends support two-phase access: `begin_*` hands out a
//! contiguous region of the ring, `end_*` commits or consumes part of it.
//!
//! - [`ring`]: cursor arithmetic and raw storage
//! - [`pipe`]: shared state, signals and both ends
//! - [`region`]: two-phase regions

pub(crate) mod pipe;
pub(crate) mod region;
pub(crate) mod ring;

pub use region::{ReadRegion, WriteRegion};

use crate::core::Core;
use crate::data_pipe::pipe::DataPipe;
use crate::error::{Error, Result};
use crate::handle::Handle;
use crate::handle::resource::Resource;

use bitflags::bitflags;
use std::sync::Arc;

bitflags! {
    /// Flags for producer operations.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct WriteDataFlags: u32 {
        /// Fail with `ShouldWait` rather than transfer less than requested.
        const ALL_OR_NONE = 1 << 0;
    }
}

bitflags! {
    /// Flags for consumer operations.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ReadDataFlags: u32 {
        /// Fail rather than transfer less than requested.
        const ALL_OR_NONE = 1 << 0;
        /// Copy without consuming. Only meaningful for `read_data`.
        const PEEK = 1 << 1;
    }
}

/// Options for [`Core::create_data_pipe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataPipeOptions {
    /// Size of one element. Every transfer is a whole number of elements.
    pub element_num_bytes: usize,
    /// Ring capacity; 0 selects the configured default. Must be a multiple
    /// of `element_num_bytes`.
    pub capacity_num_bytes: usize,
}

impl Default for DataPipeOptions {
    fn default() -> Self {
        Self {
            element_num_bytes: 1,
            capacity_num_bytes: 0,
        }
    }
}

impl DataPipeOptions {
    pub fn with_capacity(capacity_num_bytes: usize) -> Self {
        Self {
            capacity_num_bytes,
            ..Self::default()
        }
    }
}

fn producer_of(resource: &Resource) -> Result<Arc<DataPipe>> {
    match resource {
        Resource::DataPipeProducer(end) => Ok(end.pipe().clone()),
        _ => Err(Error::InvalidHandle),
    }
}

fn consumer_of(resource: &Resource) -> Result<Arc<DataPipe>> {
    match resource {
        Resource::DataPipeConsumer(end) => Ok(end.pipe().clone()),
        _ => Err(Error::InvalidHandle),
    }
}

impl Core {
    /// Creates a data pipe and returns `(producer, consumer)` handles.
    ///
    /// # Errors
    /// - [`Error::InvalidArgument`] if the element size is 0 or does not
    ///   divide the capacity
    /// - [`Error::ResourceExhausted`] if the capacity exceeds
    ///   [`Config::max_data_pipe_capacity_bytes`](crate::Config::max_data_pipe_capacity_bytes)
    ///
    /// # Example
    /// ```ignore
    /// let (producer, consumer) = core.create_data_pipe(&DataPipeOptions::with_capacity(4))?;
    /// assert_eq!(core.write_data(producer, b"AB", WriteDataFlags::empty())?, 2);
    /// ```
    pub fn create_data_pipe(&self, options: &DataPipeOptions) -> Result<(Handle, Handle)> {
        let element = options.element_num_bytes;
        if element == 0 {
            return Err(Error::InvalidArgument);
        }

        let capacity = if options.capacity_num_bytes == 0 {
            // Round the default down to whole elements, keeping at least one.
            let default = self.config().default_data_pipe_capacity_bytes;
            (default / element).max(1) * element
        } else {
            options.capacity_num_bytes
        };

        if capacity % element != 0 {
            return Err(Error::InvalidArgument);
        }
        if capacity > self.config().max_data_pipe_capacity_bytes {
            return Err(Error::ResourceExhausted);
        }

        let (producer, consumer) = DataPipe::new(element, capacity);
        let handles = self.insert(vec![
            Resource::DataPipeProducer(producer),
            Resource::DataPipeConsumer(consumer),
        ])?;

        Ok((handles[0], handles[1]))
    }

    /// Copies as many whole elements of `data` as fit and returns the number
    /// of bytes written.
    ///
    /// # Errors
    /// - [`Error::ShouldWait`] if the ring is full, or with `ALL_OR_NONE` if
    ///   not all of `data` fits
    /// - [`Error::PeerClosed`] if the consumer is closed
    /// - [`Error::Busy`] if a two-phase write is open
    /// - [`Error::InvalidArgument`] if `data` is not a whole number of elements
    pub fn write_data(&self, producer: Handle, data: &[u8], flags: WriteDataFlags) -> Result<usize> {
        let pipe = self.with_resource(producer, producer_of)?;
        pipe.write(data, flags)
    }

    /// Starts a two-phase write and returns the writable region.
    ///
    /// `size_hint` is advisory unless `ALL_OR_NONE` is set, in which case the
    /// region is at least that large or the call fails with `ShouldWait`.
    pub fn begin_write_data(
        &self,
        producer: Handle,
        size_hint: usize,
        flags: WriteDataFlags,
    ) -> Result<WriteRegion> {
        let pipe = self.with_resource(producer, producer_of)?;
        pipe.begin_write(size_hint, flags)
    }

    /// Commits the first `num_bytes` of the open write region.
    ///
    /// # Errors
    /// - [`Error::FailedPrecondition`] if no two-phase write is open
    /// - [`Error::InvalidArgument`] if `num_bytes` exceeds the region or is
    ///   not whole elements; the two-phase write still ends
    pub fn end_write_data(&self, producer: Handle, num_bytes: usize) -> Result<()> {
        let pipe = self.with_resource(producer, producer_of)?;
        pipe.end_write(num_bytes)
    }

    /// Reads up to `buf.len()` bytes and returns how many were copied.
    ///
    /// A buffer smaller than the buffered data is filled and the rest stays
    /// queued.
    ///
    /// # Errors
    /// - [`Error::ShouldWait`] if nothing is buffered and the producer is open
    /// - [`Error::PeerClosed`] if nothing is buffered and the producer is
    ///   closed
    /// - [`Error::Busy`] if a two-phase read is open
    /// - [`Error::InvalidArgument`] if `buf` is not a whole number of elements
    pub fn read_data(&self, consumer: Handle, buf: &mut [u8], flags: ReadDataFlags) -> Result<usize> {
        let pipe = self.with_resource(consumer, consumer_of)?;
        pipe.read(buf, flags)
    }

    /// Starts a two-phase read and returns the readable region.
    pub fn begin_read_data(
        &self,
        consumer: Handle,
        size_hint: usize,
        flags: ReadDataFlags,
    ) -> Result<ReadRegion> {
        let pipe = self.with_resource(consumer, consumer_of)?;
        pipe.begin_read(size_hint, flags)
    }

    /// Consumes the first `num_bytes` of the open read region.
    pub fn end_read_data(&self, consumer: Handle, num_bytes: usize) -> Result<()> {
        let pipe = self.with_resource(consumer, consumer_of)?;
        pipe.end_read(num_bytes)
    }

    /// Skips up to `num_bytes` of buffered data and returns how many bytes
    /// were dropped. Without `ALL_OR_NONE` the count clamps to what is
    /// buffered.
    pub fn discard_data(&self, consumer: Handle, num_bytes: usize, flags: ReadDataFlags) -> Result<usize> {
        let pipe = self.with_resource(consumer, consumer_of)?;
        pipe.discard(num_bytes, flags)
    }

    /// Returns the number of bytes currently buffered.
    pub fn query_data(&self, consumer: Handle) -> Result<usize> {
        let pipe = self.with_resource(consumer, consumer_of)?;
        Ok(pipe.available())
    }

    /// Returns `(element_num_bytes, capacity_num_bytes)` of the pipe behind
    /// either end.
    pub fn data_pipe_geometry(&self, end: Handle) -> Result<(usize, usize)> {
        let pipe = self.with_resource(end, |resource| match resource {
            Resource::DataPipeProducer(end) => Ok(end.pipe().clone()),
            Resource::DataPipeConsumer(end) => Ok(end.pipe().clone()),
            _ => Err(Error::InvalidHandle),
        })?;

        Ok((pipe.element_num_bytes(), pipe.capacity_num_bytes()))
    }
}
