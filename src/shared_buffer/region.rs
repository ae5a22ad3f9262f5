//! Anonymous shared memory regions and the handles that reference them.
//!
//! A [`Region`] owns one `mmap`ed block. Handles and mappings both keep it
//! alive through an `Arc`, but only handles are counted in
//! [`Region::handle_count`]: mapping and unmapping never change it.

use crate::error::{Error, Result};

use libc::{MAP_ANONYMOUS, MAP_FAILED, MAP_SHARED, PROT_READ, PROT_WRITE, _SC_PAGESIZE, mmap, munmap, sysconf};
use log::{debug, trace};
use std::ptr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

const FALLBACK_PAGE_SIZE: usize = 4096;

/// The system page size. Mapping offsets must be a multiple of it.
pub fn page_size() -> usize {
    let size = unsafe { sysconf(_SC_PAGESIZE) };
    if size <= 0 {
        FALLBACK_PAGE_SIZE
    } else {
        size as usize
    }
}

pub(crate) struct Region {
    ptr: *mut u8,
    size: usize,
    mapped_size: usize,
    handles: AtomicUsize,
    /// Set once a read-only handle to this region exists.
    read_only_shared: AtomicBool,
}

// The region only hands out raw pointers; synchronizing access to the bytes
// is the owners' business.
unsafe impl Send for Region {}
unsafe impl Sync for Region {}

impl Region {
    /// Maps `size` zeroed bytes, rounded up to whole pages.
    pub(crate) fn allocate(size: usize) -> Result<Arc<Region>> {
        if size == 0 {
            return Err(Error::InvalidArgument);
        }

        let page = page_size();
        let mapped_size = size
            .checked_add(page - 1)
            .ok_or(Error::ResourceExhausted)?
            / page
            * page;

        let ptr = unsafe {
            mmap(
                ptr::null_mut(),
                mapped_size,
                PROT_READ | PROT_WRITE,
                MAP_SHARED | MAP_ANONYMOUS,
                -1,
                0,
            )
        };

        if ptr == MAP_FAILED {
            debug!("shared buffer: mmap of {} bytes failed", mapped_size);
            return Err(Error::ResourceExhausted);
        }
        debug!("shared buffer region of {} bytes mapped", size);

        Ok(Arc::new(Region {
            ptr: ptr as *mut u8,
            size,
            mapped_size,
            handles: AtomicUsize::new(0),
            read_only_shared: AtomicBool::new(false),
        }))
    }

    pub(crate) fn size(&self) -> usize {
        self.size
    }

    pub(crate) fn handle_count(&self) -> usize {
        self.handles.load(Ordering::Acquire)
    }

    pub(crate) fn is_read_only_shared(&self) -> bool {
        self.read_only_shared.load(Ordering::Acquire)
    }

    /// Pointer to the byte at `offset`.
    ///
    /// # Safety
    /// `offset` must be at most `size`.
    pub(crate) unsafe fn ptr_at(&self, offset: usize) -> *mut u8 {
        debug_assert!(offset <= self.size);
        unsafe { self.ptr.add(offset) }
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        let ret = unsafe { munmap(self.ptr as *mut libc::c_void, self.mapped_size) };
        if ret != 0 {
            debug!("shared buffer: munmap failed for {} bytes", self.mapped_size);
        } else {
            debug!("shared buffer region of {} bytes released", self.size);
        }
    }
}

/// One handle's reference to a region.
pub(crate) struct BufferHandle {
    region: Arc<Region>,
    read_only: bool,
}

impl BufferHandle {
    pub(crate) fn new(region: Arc<Region>, read_only: bool) -> Self {
        if read_only {
            region.read_only_shared.store(true, Ordering::Release);
        }
        region.handles.fetch_add(1, Ordering::AcqRel);

        Self { region, read_only }
    }

    pub(crate) fn region(&self) -> &Arc<Region> {
        &self.region
    }

    pub(crate) fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Creates another handle to the same region.
    ///
    /// # Errors
    /// [`Error::FailedPrecondition`] if a writable duplicate is requested
    /// from a read-only handle, or after any read-only handle exists.
    pub(crate) fn duplicate(&self, read_only: bool) -> Result<BufferHandle> {
        if !read_only && (self.read_only || self.region.is_read_only_shared()) {
            return Err(Error::FailedPrecondition);
        }

        Ok(BufferHandle::new(self.region.clone(), read_only))
    }
}

impl Drop for BufferHandle {
    fn drop(&mut self) {
        let remaining = self.region.handles.fetch_sub(1, Ordering::AcqRel) - 1;
        trace!("shared buffer handle closed, {} left", remaining);
    }
}
