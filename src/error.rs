//! Error kinds returned by every primitive operation.
//!
//! Two families live in the same enum:
//!
//! - **Transient** conditions ([`Error::ShouldWait`], [`Error::PeerClosed`]) are
//!   ordinary outcomes. The caller is expected to arm a
//!   [`Watcher`](crate::Watcher) and retry, or to wind down because the other
//!   side is gone.
//! - **Misuse** conditions (everything else) point at a programming error and
//!   should be surfaced immediately. Nothing in this crate retries internally.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure kinds produced by handle operations, watchers and run loops.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Error {
    /// Malformed parameters: bad options, self-referential cargo, an
    /// unaligned or out-of-range mapping, a bad two-phase commit count.
    #[error("invalid argument")]
    InvalidArgument,

    /// The handle is closed, was transferred, never existed, or refers to a
    /// resource of the wrong kind for this operation.
    #[error("invalid handle")]
    InvalidHandle,

    /// The operation is not valid in the current state, e.g. a second run
    /// loop on one thread or `end_*` without a matching `begin_*`.
    #[error("failed precondition")]
    FailedPrecondition,

    /// Nothing to read or no room to write yet. Watch the handle and retry.
    #[error("operation should wait")]
    ShouldWait,

    /// A two-phase operation is already outstanding on this end.
    #[error("resource busy")]
    Busy,

    /// The peer end is closed and nothing more will ever arrive or be
    /// accepted.
    #[error("peer closed")]
    PeerClosed,

    /// Reported to a watcher whose handle was closed or transferred.
    #[error("watch cancelled")]
    Cancelled,

    /// A configured limit (table size, message size, capacity) was exceeded,
    /// or the system refused to provide memory.
    #[error("resource exhausted")]
    ResourceExhausted,

    /// Write access through a read-only shared buffer handle or mapping.
    #[error("permission denied")]
    PermissionDenied,
}

impl Error {
    /// Returns `true` for conditions the caller is expected to handle as part
    /// of normal flow rather than as a bug.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::ShouldWait | Error::PeerClosed)
    }
}
