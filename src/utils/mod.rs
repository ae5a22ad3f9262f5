//! Internal containers shared by the handle table and the run loop.

pub(crate) mod slab;
