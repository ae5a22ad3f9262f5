//! Mapping from handles to the resources they own.

use crate::error::{Error, Result};
use crate::handle::Handle;
use crate::handle::resource::Resource;
use crate::utils::slab::Slab;

const INITIAL_SLOTS: usize = 64;

pub(crate) struct HandleTable {
    entries: Slab<Resource>,
    max_size: usize,
}

impl HandleTable {
    pub(crate) fn new(max_size: usize) -> Self {
        Self {
            entries: Slab::new(INITIAL_SLOTS.min(max_size)),
            max_size,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn has_room_for(&self, count: usize) -> bool {
        self.entries.len().saturating_add(count) <= self.max_size
    }

    /// Inserts every resource or none of them.
    ///
    /// On failure the resources are handed back so the caller can decide
    /// where they are dropped.
    pub(crate) fn insert_all(
        &mut self,
        resources: Vec<Resource>,
    ) -> std::result::Result<Vec<Handle>, Vec<Resource>> {
        if !self.has_room_for(resources.len()) {
            return Err(resources);
        }

        Ok(resources
            .into_iter()
            .map(|resource| Handle::from_key(self.entries.insert(resource)))
            .collect())
    }

    pub(crate) fn get(&self, handle: Handle) -> Result<&Resource> {
        handle
            .key()
            .and_then(|key| self.entries.get(key))
            .ok_or(Error::InvalidHandle)
    }

    pub(crate) fn contains(&self, handle: Handle) -> bool {
        handle.key().is_some_and(|key| self.entries.contains(key))
    }

    pub(crate) fn remove(&mut self, handle: Handle) -> Result<Resource> {
        handle
            .key()
            .and_then(|key| self.entries.remove(key))
            .ok_or(Error::InvalidHandle)
    }

    pub(crate) fn drain(&mut self) -> Vec<Resource> {
        self.entries.drain()
    }
}
