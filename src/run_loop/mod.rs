//! Run loop subsystem.
//!
//! - [`core`]: the [`RunLoop`] dispatcher
//! - [`context`]: the per-thread "current run loop" registry
//! - [`queue`]: cross-thread inbox that resources post readiness into
//! - [`timer`]: delayed tasks

pub(crate) mod context;
mod core;
pub(crate) mod queue;
pub(crate) mod timer;

pub use self::core::RunLoop;
