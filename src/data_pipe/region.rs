//! Regions handed out by two-phase data pipe operations.
//!
//! A region stays usable until the matching `end_*_data` call or until its
//! end of the pipe is closed. The checked accessors verify that on every
//! call and fail with [`Error::FailedPrecondition`] afterwards. The raw slice
//! accessors skip the check and are `unsafe` for that reason.

use crate::data_pipe::pipe::{DataPipe, Phase};
use crate::error::{Error, Result};

use std::sync::Arc;

/// Writable window into a data pipe's free space.
pub struct WriteRegion {
    pipe: Arc<DataPipe>,
    phase: Phase,
}

impl WriteRegion {
    pub(crate) fn new(pipe: Arc<DataPipe>, phase: Phase) -> Self {
        Self { pipe, phase }
    }

    /// Size of the region in bytes; always a whole number of elements.
    pub fn len(&self) -> usize {
        self.phase.len
    }

    pub fn is_empty(&self) -> bool {
        self.phase.len == 0
    }

    /// Copies `data` into the region at `offset`.
    ///
    /// # Errors
    /// - [`Error::InvalidArgument`] if the copy would run past the region
    /// - [`Error::FailedPrecondition`] if the write phase is over
    pub fn write(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        let end = offset.checked_add(data.len()).ok_or(Error::InvalidArgument)?;
        if end > self.phase.len {
            return Err(Error::InvalidArgument);
        }

        self.pipe.copy_into_phase(self.phase, offset, data)
    }

    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        unsafe { self.pipe.storage().ptr_at(self.phase.offset) }
    }

    /// The whole region as a mutable slice.
    ///
    /// # Safety
    /// The slice must not be used after `end_write_data` is called or the
    /// producer handle is closed.
    pub unsafe fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.as_mut_ptr(), self.phase.len) }
    }
}

/// Readable window onto a data pipe's committed bytes.
pub struct ReadRegion {
    pipe: Arc<DataPipe>,
    phase: Phase,
}

impl ReadRegion {
    pub(crate) fn new(pipe: Arc<DataPipe>, phase: Phase) -> Self {
        Self { pipe, phase }
    }

    pub fn len(&self) -> usize {
        self.phase.len
    }

    pub fn is_empty(&self) -> bool {
        self.phase.len == 0
    }

    /// Copies bytes starting at `offset` into `buf`, filling it.
    ///
    /// # Errors
    /// - [`Error::InvalidArgument`] if the copy would run past the region
    /// - [`Error::FailedPrecondition`] if the read phase is over
    pub fn read(&self, offset: usize, buf: &mut [u8]) -> Result<()> {
        let end = offset.checked_add(buf.len()).ok_or(Error::InvalidArgument)?;
        if end > self.phase.len {
            return Err(Error::InvalidArgument);
        }

        self.pipe.copy_from_phase(self.phase, offset, buf)
    }

    /// Copies the whole region out.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        let mut out = vec![0u8; self.phase.len];
        self.read(0, &mut out)?;

        Ok(out)
    }

    pub fn as_ptr(&self) -> *const u8 {
        unsafe { self.pipe.storage().ptr_at(self.phase.offset) }
    }

    /// The whole region as a slice.
    ///
    /// # Safety
    /// The slice must not be used after `end_read_data` is called or the
    /// consumer handle is closed.
    pub unsafe fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.as_ptr(), self.phase.len) }
    }
}

impl std::fmt::Debug for WriteRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteRegion").field("len", &self.phase.len).finish()
    }
}

impl std::fmt::Debug for ReadRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadRegion").field("len", &self.phase.len).finish()
    }
}
