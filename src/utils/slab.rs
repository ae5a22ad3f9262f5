//! Generation-checked slab used as the handle table's backing arena.
//!
//! Slots are recycled through a free list. Every removal bumps the slot's
//! generation, so a key minted before the removal no longer matches and
//! lookups through it fail instead of aliasing whatever reuses the slot.

/// Position plus generation of an occupied slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Key {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

struct Slot<T> {
    generation: u32,
    item: Option<T>,
}

pub(crate) struct Slab<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Slab<T> {
    pub(crate) fn new(size: usize) -> Self {
        let slots = (0..size)
            .map(|_| Slot {
                generation: 0,
                item: None,
            })
            .collect();
        // Pop order hands out low indices first.
        let free = (0..size as u32).rev().collect();

        Self {
            slots,
            free,
            len: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn insert(&mut self, item: T) -> Key {
        let index = match self.free.pop() {
            Some(i) => i,
            None => {
                let len = self.slots.len();
                let new_len = if len == 0 { 1 } else { 2 * len };

                self.slots.extend((len..new_len).map(|_| Slot {
                    generation: 0,
                    item: None,
                }));
                self.free.extend(((len + 1) as u32..new_len as u32).rev());

                len as u32
            }
        };

        let slot = &mut self.slots[index as usize];
        slot.item = Some(item);
        self.len += 1;

        Key {
            index,
            generation: slot.generation,
        }
    }

    pub(crate) fn get(&self, key: Key) -> Option<&T> {
        self.slots
            .get(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.item.as_ref())
    }

    pub(crate) fn contains(&self, key: Key) -> bool {
        self.get(key).is_some()
    }

    pub(crate) fn remove(&mut self, key: Key) -> Option<T> {
        let slot = self.slots.get_mut(key.index as usize)?;
        if slot.generation != key.generation {
            return None;
        }

        let item = slot.item.take()?;
        Self::retire_or_free(slot, key.index, &mut self.free);
        self.len -= 1;

        Some(item)
    }

    /// Bumps the generation of an emptied slot. A slot whose generation is
    /// exhausted is never handed out again.
    fn retire_or_free(slot: &mut Slot<T>, index: u32, free: &mut Vec<u32>) {
        if let Some(next) = slot.generation.checked_add(1) {
            slot.generation = next;
            free.push(index);
        }
    }

    /// Removes every occupied slot, handing the items back in index order.
    pub(crate) fn drain(&mut self) -> Vec<T> {
        let mut items = Vec::with_capacity(self.len);

        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(item) = slot.item.take() {
                Self::retire_or_free(slot, index as u32, &mut self.free);
                items.push(item);
            }
        }
        self.len = 0;

        items
    }
}
