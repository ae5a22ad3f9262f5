//! Ring buffer storage and cursor arithmetic for data pipes.
//!
//! [`Cursor`] is pure bookkeeping and lives under the pipe lock.
//! [`RingStorage`] is the byte array itself. It is reached through raw
//! pointers because two-phase regions hand out access to parts of it
//! without holding the lock. The cursor guarantees those parts never
//! overlap: the producer only ever touches free space and the consumer only
//! ever touches committed bytes.

use std::ptr;

/// Read position and fill level of a ring of `capacity` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Cursor {
    capacity: usize,
    read: usize,
    len: usize,
}

impl Cursor {
    pub(crate) fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0);
        Self {
            capacity,
            read: 0,
            len: 0,
        }
    }

    /// Bytes committed and not yet consumed.
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn free(&self) -> usize {
        self.capacity - self.len
    }

    pub(crate) fn read_pos(&self) -> usize {
        self.read
    }

    pub(crate) fn write_pos(&self) -> usize {
        (self.read + self.len) % self.capacity
    }

    /// Free bytes available from the write position up to the wrap point.
    pub(crate) fn contiguous_free(&self) -> usize {
        self.free().min(self.capacity - self.write_pos())
    }

    /// Committed bytes available from the read position up to the wrap point.
    pub(crate) fn contiguous_readable(&self) -> usize {
        self.len.min(self.capacity - self.read)
    }

    pub(crate) fn commit(&mut self, n: usize) {
        debug_assert!(n <= self.free());
        self.len += n;
    }

    pub(crate) fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.len);
        self.read = (self.read + n) % self.capacity;
        self.len -= n;
    }

    pub(crate) fn clear(&mut self) {
        self.read = 0;
        self.len = 0;
    }
}

/// Heap bytes backing a ring.
pub(crate) struct RingStorage {
    ptr: *mut u8,
    capacity: usize,
}

// Access is partitioned by `Cursor` and the two-phase bookkeeping.
unsafe impl Send for RingStorage {}
unsafe impl Sync for RingStorage {}

impl RingStorage {
    pub(crate) fn new(capacity: usize) -> Self {
        let bytes = vec![0u8; capacity].into_boxed_slice();
        let ptr = Box::into_raw(bytes) as *mut u8;

        Self { ptr, capacity }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Pointer to the byte at `offset`.
    ///
    /// # Safety
    /// `offset` must be at most `capacity`.
    pub(crate) unsafe fn ptr_at(&self, offset: usize) -> *mut u8 {
        debug_assert!(offset <= self.capacity);
        unsafe { self.ptr.add(offset) }
    }

    /// Copies `data` in starting at `start`, wrapping at the end of the ring.
    ///
    /// # Safety
    /// The target bytes must be free space that no outstanding region covers.
    pub(crate) unsafe fn copy_in(&self, start: usize, data: &[u8]) {
        debug_assert!(data.len() <= self.capacity);
        let first = data.len().min(self.capacity - start);

        unsafe {
            ptr::copy_nonoverlapping(data.as_ptr(), self.ptr.add(start), first);
            ptr::copy_nonoverlapping(data.as_ptr().add(first), self.ptr, data.len() - first);
        }
    }

    /// Copies `out.len()` bytes out starting at `start`, wrapping at the end
    /// of the ring.
    ///
    /// # Safety
    /// The source bytes must be committed data that no outstanding write
    /// region covers.
    pub(crate) unsafe fn copy_out(&self, start: usize, out: &mut [u8]) {
        debug_assert!(out.len() <= self.capacity);
        let first = out.len().min(self.capacity - start);

        unsafe {
            ptr::copy_nonoverlapping(self.ptr.add(start), out.as_mut_ptr(), first);
            ptr::copy_nonoverlapping(self.ptr, out.as_mut_ptr().add(first), out.len() - first);
        }
    }
}

impl Drop for RingStorage {
    fn drop(&mut self) {
        let slice = ptr::slice_from_raw_parts_mut(self.ptr, self.capacity);
        unsafe { drop(Box::from_raw(slice)) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_tracks_wraparound() {
        let mut cursor = Cursor::new(8);
        cursor.commit(6);
        cursor.consume(4);

        assert_eq!(cursor.len(), 2);
        assert_eq!(cursor.write_pos(), 6);
        assert_eq!(cursor.free(), 6);
        // Free space is split: [6, 8) and [0, 4).
        assert_eq!(cursor.contiguous_free(), 2);

        cursor.commit(4);
        assert_eq!(cursor.write_pos(), 2);
        assert_eq!(cursor.contiguous_readable(), 4);
    }

    #[test]
    fn full_ring_has_no_free_space() {
        let mut cursor = Cursor::new(4);
        cursor.commit(4);

        assert_eq!(cursor.free(), 0);
        assert_eq!(cursor.contiguous_free(), 0);
        assert_eq!(cursor.contiguous_readable(), 4);
    }

    #[test]
    fn storage_copies_across_the_wrap_point() {
        let storage = RingStorage::new(4);
        let mut out = [0u8; 4];

        unsafe {
            storage.copy_in(2, b"abcd");
            storage.copy_out(2, &mut out);
        }

        assert_eq!(&out, b"abcd");
        assert_eq!(storage.capacity(), 4);
    }
}
