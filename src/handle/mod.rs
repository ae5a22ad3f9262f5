//! Opaque handles and the table that resolves them.
//!
//! A [`Handle`] packs a slot index and a generation. Closing or transferring
//! a handle frees its slot and bumps the generation, so the old value keeps
//! failing with [`Error::InvalidHandle`](crate::Error::InvalidHandle) even
//! after the slot is reused for another resource.

pub(crate) mod resource;
pub(crate) mod table;

use crate::utils::slab::Key;

use std::fmt;

/// Process-local identifier of one resource end.
///
/// Handles are plain values; copying one does not duplicate the resource.
/// Whoever holds the value owns the end until it is closed or sent as cargo.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u64);

impl Handle {
    /// The value that never refers to a resource.
    pub const INVALID: Handle = Handle(0);

    /// Reconstructs a handle from [`Handle::raw`].
    pub const fn from_raw(raw: u64) -> Handle {
        Handle(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    pub const fn is_valid_value(self) -> bool {
        self.0 != 0
    }

    pub(crate) fn from_key(key: Key) -> Handle {
        // Index is stored off by one so that no live handle is zero.
        Handle(((key.generation as u64) << 32) | (key.index as u64 + 1))
    }

    pub(crate) fn key(self) -> Option<Key> {
        let low = (self.0 & 0xffff_ffff) as u32;
        if low == 0 {
            return None;
        }

        Some(Key {
            index: low - 1,
            generation: (self.0 >> 32) as u32,
        })
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({:#x})", self.0)
    }
}

/// The kind of resource a handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    MessagePipe,
    DataPipeProducer,
    DataPipeConsumer,
    SharedBuffer,
    /// A wrapped opaque value with no signals.
    Untyped,
}
