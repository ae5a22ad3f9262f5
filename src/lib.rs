//! Handle-based in-process IPC primitives with readiness notification.
//!
//! Every resource is reached through an opaque [`Handle`] minted by a
//! [`Core`]. Operations never block: when a call cannot make progress it
//! returns [`Error::ShouldWait`], and the caller arms a [`Watcher`] to be
//! told, on its thread's [`RunLoop`], when to try again.
//!
//! # Architecture
//!
//! - **Core**: Handle table and entry point for every operation
//! - **CoreBuilder**: Fluent builder for cores with custom limits
//! - **Message pipe**: Bidirectional queue of messages that can carry handles
//! - **Data pipe**: Unidirectional byte stream over a bounded ring buffer,
//!   with copying and two-phase access
//! - **Shared buffer**: Reference-counted memory region mappable by any holder
//! - **Signals**: Per-handle readiness state (`satisfied` / `satisfiable`)
//! - **Watcher**: Callback armed on a handle for a set of signals
//! - **RunLoop**: Per-thread dispatcher that runs watcher callbacks and tasks

mod builder;
mod core;
mod data_pipe;
mod error;
mod handle;
mod message_pipe;
mod run_loop;
mod shared_buffer;
mod signals;
mod utils;
mod watcher;

pub use builder::{Config, CoreBuilder};
pub use self::core::Core;
pub use data_pipe::{DataPipeOptions, ReadDataFlags, ReadRegion, WriteDataFlags, WriteRegion};
pub use error::{Error, Result};
pub use handle::{Handle, ResourceKind};
pub use message_pipe::{Message, MessagePipeOptions};
pub use run_loop::RunLoop;
pub use shared_buffer::{
    BufferInfo, DuplicateBufferOptions, MapFlags, Mapping, SharedBufferOptions, page_size,
};
pub use signals::{Signals, SignalsState};
pub use watcher::{Watcher, WatcherState};
