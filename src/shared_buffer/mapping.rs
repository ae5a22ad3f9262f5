//! A view of part of a shared buffer region.

use crate::error::{Error, Result};
use crate::shared_buffer::region::Region;

use log::trace;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

/// A mapped range of a shared buffer.
///
/// The mapping keeps the region's memory alive even after every handle to
/// it is closed. [`read`](Self::read) and [`write`](Self::write) access the
/// bytes one relaxed atomic at a time, so they may overlap with other
/// mappings of the same region. Ordering between such accesses is up to the
/// application.
pub struct Mapping {
    region: Arc<Region>,
    offset: usize,
    len: usize,
    writable: bool,
}

impl Mapping {
    pub(crate) fn new(region: Arc<Region>, offset: usize, len: usize, writable: bool) -> Self {
        trace!("shared buffer: mapped [{}, {})", offset, offset + len);

        Self {
            region,
            offset,
            len,
            writable,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Address of the first mapped byte.
    pub fn as_ptr(&self) -> *mut u8 {
        unsafe { self.region.ptr_at(self.offset) }
    }

    fn check_range(&self, offset: usize, len: usize) -> Result<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.len => Ok(()),
            _ => Err(Error::InvalidArgument),
        }
    }

    /// `len` bytes starting at `offset`, viewed as atomics.
    fn cells(&self, offset: usize, len: usize) -> Result<&[AtomicU8]> {
        self.check_range(offset, len)?;

        // `AtomicU8` has the layout of `u8`, and the region outlives `self`.
        Ok(unsafe {
            std::slice::from_raw_parts(self.as_ptr().add(offset).cast::<AtomicU8>(), len)
        })
    }

    /// Copies `buf.len()` bytes starting at `offset` into `buf`.
    pub fn read(&self, offset: usize, buf: &mut [u8]) -> Result<()> {
        let cells = self.cells(offset, buf.len())?;
        for (byte, cell) in buf.iter_mut().zip(cells) {
            *byte = cell.load(Ordering::Relaxed);
        }

        Ok(())
    }

    /// Copies `data` into the mapping at `offset`.
    ///
    /// # Errors
    /// - [`Error::PermissionDenied`] if the mapping is read-only
    /// - [`Error::InvalidArgument`] if the range runs past the mapping
    pub fn write(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        if !self.writable {
            return Err(Error::PermissionDenied);
        }
        let cells = self.cells(offset, data.len())?;
        for (cell, &byte) in cells.iter().zip(data) {
            cell.store(byte, Ordering::Relaxed);
        }

        Ok(())
    }

    /// The mapped bytes as a slice.
    ///
    /// # Safety
    /// No other mapping of an overlapping range may write while the slice is
    /// alive.
    pub unsafe fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.as_ptr(), self.len) }
    }

    /// The mapped bytes as a mutable slice, or `None` for a read-only
    /// mapping.
    ///
    /// # Safety
    /// No other mapping of an overlapping range may be accessed while the
    /// slice is alive.
    pub unsafe fn as_mut_slice(&mut self) -> Option<&mut [u8]> {
        if !self.writable {
            return None;
        }

        Some(unsafe { std::slice::from_raw_parts_mut(self.as_ptr(), self.len) })
    }

    /// Releases the mapping. Dropping it has the same effect.
    pub fn unmap(self) {
        drop(self);
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        trace!("shared buffer: unmapped [{}, {})", self.offset, self.offset + self.len);
    }
}

impl std::fmt::Debug for Mapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mapping")
            .field("offset", &self.offset)
            .field("len", &self.len)
            .field("writable", &self.writable)
            .finish()
    }
}
