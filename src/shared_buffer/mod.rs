//! Shared buffers: reference-counted memory regions mappable by any holder
//! of a handle.
//!
//! - [`region`]: the backing memory and handle references
//! - [`mapping`]: views handed out by [`Core::map_buffer`]

pub(crate) mod mapping;
pub(crate) mod region;

pub use mapping::Mapping;
pub use region::page_size;

use crate::core::Core;
use crate::error::{Error, Result};
use crate::handle::Handle;
use crate::handle::resource::Resource;
use crate::shared_buffer::region::{BufferHandle, Region};

use bitflags::bitflags;
use std::sync::Arc;

/// Options for [`Core::create_shared_buffer`]. No options are defined yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct SharedBufferOptions {}

/// Options for [`Core::duplicate_buffer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DuplicateBufferOptions {
    /// The new handle can only produce read-only mappings.
    pub read_only: bool,
}

bitflags! {
    /// Flags for [`Core::map_buffer`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MapFlags: u32 {
        /// Map without write access, even through a writable handle.
        const READ_ONLY = 1 << 0;
    }
}

/// Snapshot returned by [`Core::buffer_info`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferInfo {
    pub size: usize,
    /// Live handles to the region across the whole core.
    pub handle_count: usize,
    /// Whether this particular handle is read-only.
    pub read_only: bool,
}

fn buffer_of(resource: &Resource) -> Result<&BufferHandle> {
    match resource {
        Resource::SharedBuffer(buffer) => Ok(buffer),
        _ => Err(Error::InvalidHandle),
    }
}

impl Core {
    /// Allocates a zero-filled shared buffer of `num_bytes`.
    ///
    /// # Errors
    /// - [`Error::InvalidArgument`] if `num_bytes` is 0
    /// - [`Error::ResourceExhausted`] if `num_bytes` exceeds
    ///   [`Config::max_shared_buffer_num_bytes`](crate::Config::max_shared_buffer_num_bytes)
    ///   or the memory cannot be mapped
    pub fn create_shared_buffer(&self, _options: &SharedBufferOptions, num_bytes: usize) -> Result<Handle> {
        if num_bytes > self.config().max_shared_buffer_num_bytes {
            return Err(Error::ResourceExhausted);
        }

        let region = Region::allocate(num_bytes)?;
        let handles = self.insert(vec![Resource::SharedBuffer(BufferHandle::new(region, false))])?;

        handles.into_iter().next().ok_or(Error::ResourceExhausted)
    }

    /// Creates an independent handle to the same region.
    ///
    /// # Errors
    /// [`Error::FailedPrecondition`] if a writable duplicate is requested
    /// from a read-only handle or once a read-only duplicate exists.
    pub fn duplicate_buffer(&self, handle: Handle, options: &DuplicateBufferOptions) -> Result<Handle> {
        let duplicate = self.with_resource(handle, |resource| {
            buffer_of(resource)?.duplicate(options.read_only)
        })?;
        let handles = self.insert(vec![Resource::SharedBuffer(duplicate)])?;

        handles.into_iter().next().ok_or(Error::ResourceExhausted)
    }

    /// Maps `num_bytes` of the buffer starting at `offset`.
    ///
    /// The mapping stays valid after `handle` is closed.
    ///
    /// # Errors
    /// [`Error::InvalidArgument`] if `num_bytes` is 0, `offset` is not a
    /// multiple of [`page_size`], or the range runs past the buffer.
    ///
    /// # Example
    /// ```ignore
    /// let buffer = core.create_shared_buffer(&SharedBufferOptions::default(), 64)?;
    /// let mut mapping = core.map_buffer(buffer, 0, 64, MapFlags::empty())?;
    /// mapping.write(0, b"hello")?;
    /// ```
    pub fn map_buffer(&self, handle: Handle, offset: usize, num_bytes: usize, flags: MapFlags) -> Result<Mapping> {
        let (region, read_only) = self.with_resource(handle, |resource| {
            let buffer = buffer_of(resource)?;
            Ok((buffer.region().clone(), buffer.is_read_only()))
        })?;

        if num_bytes == 0 || offset % page_size() != 0 {
            return Err(Error::InvalidArgument);
        }
        match offset.checked_add(num_bytes) {
            Some(end) if end <= region.size() => {}
            _ => return Err(Error::InvalidArgument),
        }

        let writable = !read_only && !flags.contains(MapFlags::READ_ONLY);
        Ok(Mapping::new(region, offset, num_bytes, writable))
    }

    /// Describes the buffer behind `handle`.
    pub fn buffer_info(&self, handle: Handle) -> Result<BufferInfo> {
        self.with_resource(handle, |resource| {
            let buffer = buffer_of(resource)?;
            let region: &Arc<Region> = buffer.region();

            Ok(BufferInfo {
                size: region.size(),
                handle_count: region.handle_count(),
                read_only: buffer.is_read_only(),
            })
        })
    }
}
