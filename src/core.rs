//! The handle table and the operations common to every resource kind.
//!
//! A [`Core`] owns one handle table. Resource-specific operations live next
//! to their resources (`message_pipe`, `data_pipe`, `shared_buffer`) as
//! further `impl Core` blocks; this module holds the shared plumbing:
//! closing, signal queries, kind queries and untyped handles.
//!
//! Every operation is non-blocking. Table lookups happen under the table
//! lock; the work on the resource itself happens under the resource's own
//! lock, so unrelated pipes never contend with each other.

use crate::builder::Config;
use crate::error::{Error, Result};
use crate::handle::resource::{Resource, WatchTarget};
use crate::handle::table::HandleTable;
use crate::handle::{Handle, ResourceKind};
use crate::signals::SignalsState;

use log::trace;
use parking_lot::{Mutex, MutexGuard};
use std::sync::{Arc, OnceLock};

static GLOBAL_CORE: OnceLock<Core> = OnceLock::new();

/// Entry point for every handle operation.
///
/// Cloning a `Core` yields another reference to the same handle table.
/// When the last clone is dropped, every handle still in the table is
/// closed.
///
/// # Example
/// ```ignore
/// let core = Core::new();
/// let (a, b) = core.create_message_pipe(&MessagePipeOptions::default())?;
/// core.write_message(a, b"ping", &[])?;
/// assert_eq!(core.read_message(b)?.bytes, b"ping");
/// ```
#[derive(Clone)]
pub struct Core {
    inner: Arc<CoreInner>,
}

struct CoreInner {
    config: Config,
    table: Mutex<HandleTable>,
}

impl Core {
    /// Creates a core with the default [`Config`].
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub(crate) fn with_config(config: Config) -> Self {
        let table = HandleTable::new(config.max_handle_table_size);

        Self {
            inner: Arc::new(CoreInner {
                config,
                table: Mutex::new(table),
            }),
        }
    }

    /// The process-wide core, created with the default configuration on
    /// first use.
    pub fn global() -> &'static Core {
        GLOBAL_CORE.get_or_init(Core::new)
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Closes `handle`, releasing its reference to the underlying resource.
    ///
    /// Closing one end of a pipe makes its peer observe `PEER_CLOSED`;
    /// watchers armed on the closed handle receive a final cancellation.
    /// Closing a data pipe end aborts any outstanding two-phase operation on
    /// it.
    ///
    /// # Errors
    /// [`Error::InvalidHandle`] if the handle is not live, including on a
    /// second close.
    pub fn close(&self, handle: Handle) -> Result<()> {
        let resource = self.table().remove(handle)?;
        trace!("close {:?} ({:?})", handle, resource.kind());

        // Teardown runs outside the table lock.
        drop(resource);

        Ok(())
    }

    /// Returns the current signal state of `handle`.
    pub fn query_state(&self, handle: Handle) -> Result<SignalsState> {
        Ok(self.target(handle)?.state())
    }

    /// Returns what kind of resource `handle` refers to.
    pub fn resource_kind(&self, handle: Handle) -> Result<ResourceKind> {
        Ok(self.table().get(handle)?.kind())
    }

    /// Returns `true` if `handle` currently refers to a live resource.
    pub fn is_valid(&self, handle: Handle) -> bool {
        self.table().contains(handle)
    }

    /// Number of live handles in this core.
    pub fn handle_count(&self) -> usize {
        self.table().len()
    }

    /// Wraps an opaque value in an untyped handle.
    ///
    /// Untyped handles carry no signals; they exist so that values such as
    /// platform descriptors can travel as message cargo.
    pub fn wrap_platform_value(&self, value: u64) -> Result<Handle> {
        let handles = self.insert(vec![Resource::Untyped(value)])?;

        handles.into_iter().next().ok_or(Error::ResourceExhausted)
    }

    /// Consumes an untyped handle and returns the value it wrapped.
    ///
    /// # Errors
    /// [`Error::InvalidHandle`] if `handle` is not a live untyped handle.
    pub fn unwrap_platform_value(&self, handle: Handle) -> Result<u64> {
        let mut table = self.table();

        match table.get(handle)? {
            Resource::Untyped(_) => {}
            _ => return Err(Error::InvalidHandle),
        }

        match table.remove(handle)? {
            Resource::Untyped(value) => Ok(value),
            _ => Err(Error::InvalidHandle),
        }
    }

    pub(crate) fn table(&self) -> MutexGuard<'_, HandleTable> {
        self.inner.table.lock()
    }

    /// Mints handles for `resources`, all or nothing.
    pub(crate) fn insert(&self, resources: Vec<Resource>) -> Result<Vec<Handle>> {
        let rejected = match self.table().insert_all(resources) {
            Ok(handles) => return Ok(handles),
            Err(rejected) => rejected,
        };

        drop(rejected);
        Err(Error::ResourceExhausted)
    }

    pub(crate) fn target(&self, handle: Handle) -> Result<WatchTarget> {
        Ok(self.table().get(handle)?.target())
    }

    /// Runs `f` on the resource behind `handle` while the table lock is held.
    pub(crate) fn with_resource<R>(
        &self,
        handle: Handle,
        f: impl FnOnce(&Resource) -> Result<R>,
    ) -> Result<R> {
        let table = self.table();
        f(table.get(handle)?)
    }
}

impl Default for Core {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CoreInner {
    fn drop(&mut self) {
        let remaining = self.table.get_mut().drain();
        if !remaining.is_empty() {
            trace!("core dropped with {} live handles", remaining.len());
        }
    }
}
