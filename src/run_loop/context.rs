//! Thread-scoped registry of the current run loop.
//!
//! At most one run loop is current per thread. [`RunLoop::create_default`]
//! refuses to create a second one until the first is destroyed.
//!
//! [`RunLoop::create_default`]: crate::RunLoop::create_default

use crate::error::{Error, Result};
use crate::run_loop::RunLoop;

use std::cell::RefCell;

thread_local! {
    /// The run loop created on this thread, if any.
    static CURRENT_RUN_LOOP: RefCell<Option<RunLoop>> = const { RefCell::new(None) };
}

pub(crate) fn install(make: impl FnOnce() -> RunLoop) -> Result<RunLoop> {
    CURRENT_RUN_LOOP.with(|current| {
        let mut current = current.borrow_mut();
        if current.is_some() {
            return Err(Error::FailedPrecondition);
        }

        let run_loop = make();
        *current = Some(run_loop.clone());

        Ok(run_loop)
    })
}

pub(crate) fn current() -> Option<RunLoop> {
    CURRENT_RUN_LOOP.with(|current| current.borrow().clone())
}

/// Clears the registry if it still points at `run_loop`.
pub(crate) fn uninstall(run_loop: &RunLoop) -> Option<RunLoop> {
    CURRENT_RUN_LOOP.with(|current| {
        let mut current = current.borrow_mut();
        match current.as_ref() {
            Some(installed) if installed.ptr_eq(run_loop) => current.take(),
            _ => None,
        }
    })
}
