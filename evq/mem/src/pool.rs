//! Fixed-capacity slot pool with generation counters

use evq_core::EventId;

use crate::PoolStats;

/// Reference to an occupied slot, valid until the slot is freed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotHandle {
    index: u16,
    generation: u16,
}

impl SlotHandle {
    /// Slot position in the pool
    pub const fn index(self) -> u16 {
        self.index
    }

    /// Generation of the slot when the handle was issued
    pub const fn generation(self) -> u16 {
        self.generation
    }

    /// Externally visible handle for this slot
    pub const fn id(self) -> EventId {
        EventId::from_parts(self.index, self.generation)
    }

    /// Recover the slot reference packed in an [`EventId`]
    pub const fn from_id(id: EventId) -> Self {
        Self {
            index: id.index(),
            generation: id.generation(),
        }
    }
}

struct Slot<T> {
    generation: u16,
    value: Option<T>,
}

/// A static pool of `N` slots holding values of type `T`
///
/// Slots are handed out from a free list first and from the never-used
/// tail of the array second. Freeing a slot bumps its generation, so a
/// [`SlotHandle`] issued before the free no longer resolves.
pub struct SlotPool<T, const N: usize> {
    slots: [Slot<T>; N],
    free: heapless::Vec<u16, N>,
    high_water: u16,
    stats: PoolStats,
}

impl<T, const N: usize> SlotPool<T, N> {
    const VACANT: Slot<T> = Slot {
        generation: 1,
        value: None,
    };

    const INDEX_FITS: () = assert!(N <= u16::MAX as usize, "slot pools hold at most 65535 slots");

    /// Create an empty pool
    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::INDEX_FITS;
        Self {
            slots: [Self::VACANT; N],
            free: heapless::Vec::new(),
            high_water: 0,
            stats: PoolStats::new(N),
        }
    }

    /// Store `value` in a free slot
    ///
    /// On exhaustion the value is handed back and the pool is left
    /// untouched.
    pub fn allocate(&mut self, value: T) -> Result<SlotHandle, T> {
        let index = match self.free.pop() {
            Some(index) => index,
            None if (self.high_water as usize) < N => {
                let index = self.high_water;
                self.high_water += 1;
                index
            }
            None => return Err(value),
        };

        let slot = &mut self.slots[index as usize];
        debug_assert!(slot.value.is_none());
        slot.value = Some(value);
        self.stats.on_alloc();

        Ok(SlotHandle {
            index,
            generation: slot.generation,
        })
    }

    /// Release the slot at `index` and return its value
    ///
    /// Freeing a vacant slot is a no-op returning `None`.
    pub fn free(&mut self, index: u16) -> Option<T> {
        let slot = self.slots.get_mut(index as usize)?;
        let value = slot.value.take()?;
        slot.generation = next_generation(slot.generation);

        // Cannot overflow: an index is pushed at most once per allocation
        let _ = self.free.push(index);
        self.stats.on_free();
        Some(value)
    }

    /// Value behind `handle`, if the slot was not freed since
    pub fn get(&self, handle: SlotHandle) -> Option<&T> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_ref()
    }

    /// Mutable value behind `handle`, if the slot was not freed since
    pub fn get_mut(&mut self, handle: SlotHandle) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_mut()
    }

    /// Value at `index` regardless of generation
    pub fn get_index(&self, index: u16) -> Option<&T> {
        self.slots.get(index as usize)?.value.as_ref()
    }

    /// Mutable value at `index` regardless of generation
    pub fn get_index_mut(&mut self, index: u16) -> Option<&mut T> {
        self.slots.get_mut(index as usize)?.value.as_mut()
    }

    /// Current handle for an occupied slot
    pub fn handle_at(&self, index: u16) -> Option<SlotHandle> {
        let slot = self.slots.get(index as usize)?;
        slot.value.as_ref().map(|_| SlotHandle {
            index,
            generation: slot.generation,
        })
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.stats.used_slots
    }

    /// Check if no slot is occupied
    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    /// Check if every slot is occupied
    pub fn is_full(&self) -> bool {
        self.stats.is_exhausted()
    }

    /// Get the maximum number of slots
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Allocation statistics
    pub fn stats(&self) -> PoolStats {
        self.stats
    }
}

impl<T, const N: usize> Default for SlotPool<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Generation 0 is reserved so that no live handle packs to a raw 0
fn next_generation(generation: u16) -> u16 {
    match generation.wrapping_add(1) {
        0 => 1,
        next => next,
    }
}
